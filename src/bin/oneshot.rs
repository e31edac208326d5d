// 该文件是 Daolu （道路） 项目的一部分。
// src/bin/oneshot.rs - 单张图像推理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use anyhow::Result;
use clap::Parser;
use url::Url;

use daolu::{
  FromUrl,
  fusion::Pipeline,
  input::InputWrapper,
  model::{load_detector, load_segmenter},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Daolu 单张图像推理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测模型
  #[arg(long, env = "DAOLU_DETECTOR", value_name = "MODEL")]
  pub detector: Url,
  /// 分割模型
  #[arg(long, env = "DAOLU_SEGMENTER", value_name = "MODEL")]
  pub segmenter: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let pipeline = Pipeline::new(
    load_detector(&args.detector)?,
    load_segmenter(&args.segmenter)?,
  );
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input, &pipeline, output)?;

  Ok(())
}
