// 该文件是 Daolu （道路） 项目的一部分。
// src/bin/serve.rs - 感知 HTTP 服务入口
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

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use daolu::{
  fusion::PipelineConfig,
  model::{load_detector, load_segmenter},
  service::{ServiceState, serve},
};

/// Daolu 感知服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "DAOLU_BIND", default_value = "0.0.0.0:8000")]
  pub bind: SocketAddr,
  /// 检测模型，例如 yolov8:///models/yolov8n.onnx
  #[arg(long, env = "DAOLU_DETECTOR", value_name = "MODEL")]
  pub detector: Url,
  /// 分割模型，例如 deeplab:///models/deeplabv3.onnx
  #[arg(long, env = "DAOLU_SEGMENTER", value_name = "MODEL")]
  pub segmenter: Url,
  /// 依次执行检测与分割，不使用并行
  #[arg(long, env = "DAOLU_SEQUENTIAL")]
  pub sequential: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.detector);
  info!("分割模型: {}", args.segmenter);

  let (detector, segmenter) = tokio::task::spawn_blocking(move || {
    (
      load_detector(&args.detector),
      load_segmenter(&args.segmenter),
    )
  })
  .await?;

  let config = PipelineConfig {
    concurrent: !args.sequential,
  };
  let state = ServiceState::from_models(detector, segmenter, config);
  serve(args.bind, state).await?;

  Ok(())
}
