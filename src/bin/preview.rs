// 该文件是 Daolu （道路） 项目的一部分。
// src/bin/preview.rs - 本地连续预览
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
  fusion::{Pipeline, PipelineConfig},
  input::InputWrapper,
  model::{load_detector, load_segmenter},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// Daolu 本地预览参数配置
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
  #[arg(long, value_name = "SOURCE", default_value = "v4l2:///dev/video0")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 处理指定帧数后退出
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 依次执行检测与分割，不使用并行
  #[arg(long, env = "DAOLU_SEQUENTIAL")]
  pub sequential: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.detector);
  info!("分割模型: {}", args.segmenter);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let detector = load_detector(&args.detector)?;
  let segmenter = load_segmenter(&args.segmenter)?;
  let pipeline = Pipeline::with_config(
    detector,
    segmenter,
    PipelineConfig {
      concurrent: !args.sequential,
    },
  );

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  info!("按 q 回车或 Ctrl-C 退出");
  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_quit_key(true)
    .run_task(input, &pipeline, output)?;

  Ok(())
}
