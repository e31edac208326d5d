// 该文件是 Daolu （道路） 项目的一部分。
// tests/common/mod.rs - 集成测试共用的桩模型与帧
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

#![allow(dead_code)]

use daolu::{
  codec,
  frame::{Frame, SegmentationMask},
  fusion::Pipeline,
  model::{Detection, Detector, ModelError, Segmenter},
};
use image::Rgb;

pub const GRAY: u8 = 128;

/// 返回固定检测结果
pub struct StubDetector(pub Vec<Detection>);

impl Detector for StubDetector {
  fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    Ok(self.0.clone())
  }
}

pub struct FailingDetector;

impl Detector for FailingDetector {
  fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    Err(ModelError::InferenceError("检测桩故障".to_string()))
  }
}

/// 以固定分辨率输出掩码，`on` 决定是否全部为可行驶区域
pub struct StubSegmenter {
  pub size: (u32, u32),
  pub on: bool,
}

impl StubSegmenter {
  pub fn empty() -> Self {
    Self {
      size: (32, 32),
      on: false,
    }
  }

  pub fn full() -> Self {
    Self {
      size: (32, 32),
      on: true,
    }
  }
}

impl Segmenter for StubSegmenter {
  fn segment(&self, _frame: &Frame) -> Result<SegmentationMask, ModelError> {
    let on = self.on;
    Ok(SegmentationMask::from_fn(self.size.0, self.size.1, |_, _| on))
  }
}

/// 左半边为可行驶区域
pub struct LeftHalfSegmenter;

impl Segmenter for LeftHalfSegmenter {
  fn segment(&self, _frame: &Frame) -> Result<SegmentationMask, ModelError> {
    Ok(SegmentationMask::from_fn(16, 16, |x, _| x < 8))
  }
}

pub struct FailingSegmenter;

impl Segmenter for FailingSegmenter {
  fn segment(&self, _frame: &Frame) -> Result<SegmentationMask, ModelError> {
    Err(ModelError::InferenceError("分割桩故障".to_string()))
  }
}

pub fn detection(label: &str, class_id: u32, bbox: [f32; 4], confidence: f32) -> Detection {
  Detection {
    bbox,
    confidence,
    label: label.to_string(),
    class_id,
  }
}

pub fn car() -> Detection {
  detection("car", 2, [10.0, 10.0, 50.0, 50.0], 0.9)
}

pub fn gray_frame(width: u32, height: u32) -> Frame {
  Frame::from_pixel(width, height, Rgb([GRAY, GRAY, GRAY]))
}

pub fn gray_frame_base64(width: u32, height: u32) -> String {
  let png = codec::encode_rgb_png(&gray_frame(width, height)).unwrap();
  codec::encode_base64(&png)
}

pub fn boxed_pipeline(
  detector: impl Detector + 'static,
  segmenter: impl Segmenter + 'static,
) -> Pipeline<Box<dyn Detector>, Box<dyn Segmenter>> {
  Pipeline::new(Box::new(detector), Box::new(segmenter))
}
