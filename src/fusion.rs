// 该文件是 Daolu （道路） 项目的一部分。
// src/fusion.rs - 检测与分割融合流水线
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

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{Frame, SegmentationMask},
  model::{Detection, Detector, ModelError, Segmenter},
  output::draw::Draw,
};

pub mod overlay;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("目标检测失败: {0}")]
  DetectionFailed(#[source] ModelError),
  #[error("可行驶区域分割失败: {0}")]
  SegmentationFailed(#[source] ModelError),
  #[error("分割线程异常退出")]
  WorkerPanicked,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// 检测与分割是否并行执行
  pub concurrent: bool,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self { concurrent: true }
  }
}

/// 单帧融合结果
#[derive(Debug, Clone)]
pub struct FusionResult {
  pub annotated_frame: Frame,
  pub detections: Vec<Detection>,
  /// 缩放到帧尺寸后的可行驶区域掩码
  pub drivable_mask: SegmentationMask,
  pub latency_ms: f64,
  pub fps: f64,
}

/// 由延迟计算帧率，延迟为 0 时帧率为 0
pub fn fps_from_latency(latency_ms: f64) -> f64 {
  if latency_ms > 0.0 { 1000.0 / latency_ms } else { 0.0 }
}

pub fn duration_ms(duration: Duration) -> f64 {
  duration.as_secs_f64() * 1000.0
}

pub struct Pipeline<D, S> {
  detector: D,
  segmenter: S,
  draw: Draw,
  config: PipelineConfig,
}

impl<D: Detector, S: Segmenter> Pipeline<D, S> {
  pub fn new(detector: D, segmenter: S) -> Self {
    Self::with_config(detector, segmenter, PipelineConfig::default())
  }

  pub fn with_config(detector: D, segmenter: S, config: PipelineConfig) -> Self {
    Self {
      detector,
      segmenter,
      draw: Draw::default(),
      config,
    }
  }

  pub fn draw(&self) -> &Draw {
    &self.draw
  }

  fn infer(&self, frame: &Frame) -> Result<(Vec<Detection>, SegmentationMask), PipelineError> {
    if !self.config.concurrent {
      let detections = self
        .detector
        .detect(frame)
        .map_err(PipelineError::DetectionFailed)?;
      let mask = self
        .segmenter
        .segment(frame)
        .map_err(PipelineError::SegmentationFailed)?;
      return Ok((detections, mask));
    }

    let segmenter = &self.segmenter;
    std::thread::scope(|scope| {
      let segmentation = scope.spawn(move || segmenter.segment(frame));
      let detections = self.detector.detect(frame);
      let mask = segmentation
        .join()
        .map_err(|_| PipelineError::WorkerPanicked)?;

      let detections = detections.map_err(PipelineError::DetectionFailed)?;
      let mask = mask.map_err(PipelineError::SegmentationFailed)?;
      Ok((detections, mask))
    })
  }

  /// 将检测结果与掩码合成到帧的副本上
  pub fn fuse(
    &self,
    frame: &Frame,
    detections: &[Detection],
    mask: &SegmentationMask,
  ) -> (Frame, SegmentationMask) {
    let mut annotated = frame.clone();
    let fitted = overlay::fit_mask(mask, frame);
    let blended = overlay::blend_mask(&mut annotated, &fitted, overlay::DRIVABLE_COLOR);
    debug!("叠加可行驶区域像素: {}", blended);

    self.draw.draw_detections(&mut annotated, detections);
    (annotated, fitted)
  }

  /// 处理单帧：检测、分割、融合并统计耗时
  pub fn process(&self, frame: &Frame) -> Result<FusionResult, PipelineError> {
    let now = Instant::now();

    let (detections, mask) = self.infer(frame)?;
    let (annotated_frame, drivable_mask) = self.fuse(frame, &detections, &mask);

    let latency_ms = duration_ms(now.elapsed());
    let fps = fps_from_latency(latency_ms);
    debug!(
      "融合完成: {} 个目标, 耗时 {:.2}ms, {:.1} FPS",
      detections.len(),
      latency_ms,
      fps
    );

    Ok(FusionResult {
      annotated_frame,
      detections,
      drivable_mask,
      latency_ms,
      fps,
    })
  }
}
