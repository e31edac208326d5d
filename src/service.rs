// 该文件是 Daolu （道路） 项目的一部分。
// src/service.rs - 感知 HTTP 服务
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

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, State},
  routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
  codec,
  fusion::{Pipeline, PipelineConfig, duration_ms, fps_from_latency},
  model::{Detector, ModelError, Segmenter},
};

pub mod error;
pub mod schema;

pub use self::error::ServiceError;
use self::schema::{
  BatchPerceptionRequest, BatchPerceptionResponse, ComponentStatus, HealthResponse, HealthStatus,
  PerceptionRequest, PerceptionResponse, ServicesStatus, round_to,
};

/// 服务使用的类型擦除流水线
pub type DynPipeline = Pipeline<Box<dyn Detector>, Box<dyn Segmenter>>;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
// base64 编码的整帧图像可能超过 axum 默认的 2 MB 限制
const REQUEST_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct ServiceState {
  inner: Arc<ServiceInner>,
}

struct ServiceInner {
  pipeline: Option<Arc<DynPipeline>>,
  detector_ready: bool,
  segmenter_ready: bool,
  started: Instant,
}

impl ServiceState {
  /// 两个模型都已就绪
  pub fn ready(pipeline: DynPipeline) -> Self {
    Self {
      inner: Arc::new(ServiceInner {
        pipeline: Some(Arc::new(pipeline)),
        detector_ready: true,
        segmenter_ready: true,
        started: Instant::now(),
      }),
    }
  }

  /// 根据模型加载结果构建状态，任一模型失败时服务降级
  pub fn from_models(
    detector: Result<Box<dyn Detector>, ModelError>,
    segmenter: Result<Box<dyn Segmenter>, ModelError>,
    config: PipelineConfig,
  ) -> Self {
    match (detector, segmenter) {
      (Ok(detector), Ok(segmenter)) => {
        info!("模型加载完成");
        Self::ready(Pipeline::with_config(detector, segmenter, config))
      }
      (detector, segmenter) => {
        if let Err(e) = &detector {
          error!("检测模型加载失败: {}", e);
        }
        if let Err(e) = &segmenter {
          error!("分割模型加载失败: {}", e);
        }
        warn!("服务以降级模式启动，分析请求将返回 503");
        Self {
          inner: Arc::new(ServiceInner {
            pipeline: None,
            detector_ready: detector.is_ok(),
            segmenter_ready: segmenter.is_ok(),
            started: Instant::now(),
          }),
        }
      }
    }
  }

  pub fn is_ready(&self) -> bool {
    self.inner.pipeline.is_some()
  }

  fn pipeline(&self) -> Result<Arc<DynPipeline>, ServiceError> {
    self
      .inner
      .pipeline
      .clone()
      .ok_or(ServiceError::ModelUnavailable)
  }

  fn health(&self) -> HealthResponse {
    HealthResponse {
      status: if self.is_ready() {
        HealthStatus::Healthy
      } else {
        HealthStatus::Degraded
      },
      version: SERVICE_VERSION.to_string(),
      uptime_seconds: round_to(self.inner.started.elapsed().as_secs_f64(), 2),
      services: ServicesStatus {
        object_detection: ComponentStatus::from(self.inner.detector_ready),
        lane_segmentation: ComponentStatus::from(self.inner.segmenter_ready),
      },
    }
  }
}

/// 解码、推理、编码单张图像，计时覆盖整个请求
pub fn analyze_image(
  pipeline: &DynPipeline,
  image_base64: &str,
  include_annotated: bool,
) -> Result<PerceptionResponse, ServiceError> {
  let now = Instant::now();

  let frame = codec::decode_base64_image(image_base64).map_err(ServiceError::DecodeError)?;
  let result = pipeline.process(&frame)?;

  let mask_png = codec::encode_gray_png(result.drivable_mask.as_gray_image())
    .map_err(ServiceError::EncodeFailure)?;
  let annotated_image_base64 = if include_annotated {
    let png = codec::encode_rgb_png(&result.annotated_frame).map_err(ServiceError::EncodeFailure)?;
    Some(codec::encode_base64(&png))
  } else {
    None
  };

  let elapsed = duration_ms(now.elapsed());
  Ok(PerceptionResponse {
    detections: result.detections,
    lane_mask_base64: codec::encode_base64(&mask_png),
    inference_time_ms: round_to(elapsed, 2),
    fps: round_to(fps_from_latency(elapsed), 1),
    annotated_image_base64,
  })
}

async fn health_handler(State(state): State<ServiceState>) -> Json<HealthResponse> {
  Json(state.health())
}

async fn analyze_handler(
  State(state): State<ServiceState>,
  Json(request): Json<PerceptionRequest>,
) -> Result<Json<PerceptionResponse>, ServiceError> {
  let pipeline = state.pipeline()?;
  let response = tokio::task::spawn_blocking(move || {
    analyze_image(&pipeline, &request.image_base64, request.include_annotated)
  })
  .await
  .map_err(|e| ServiceError::Internal(e.to_string()))??;

  info!(
    "分析完成: {} 个目标, {:.2}ms",
    response.detections.len(),
    response.inference_time_ms
  );
  Ok(Json(response))
}

async fn analyze_batch_handler(
  State(state): State<ServiceState>,
  Json(request): Json<BatchPerceptionRequest>,
) -> Result<Json<BatchPerceptionResponse>, ServiceError> {
  let pipeline = state.pipeline()?;
  let results = tokio::task::spawn_blocking(move || {
    request
      .images_base64
      .iter()
      .map(|image| analyze_image(&pipeline, image, request.include_annotated))
      .collect::<Result<Vec<_>, _>>()
  })
  .await
  .map_err(|e| ServiceError::Internal(e.to_string()))??;

  info!("批量分析完成: {} 张图像", results.len());
  Ok(Json(BatchPerceptionResponse { results }))
}

pub fn router(state: ServiceState) -> Router {
  Router::new()
    .route("/health", get(health_handler))
    .route("/perception/analyze", post(analyze_handler))
    .route("/perception/analyze/batch", post(analyze_batch_handler))
    .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ServiceState) -> std::io::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("感知服务监听于 http://{}", listener.local_addr()?);
  axum::serve(listener, router(state)).await
}
