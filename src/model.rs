// 该文件是 Daolu （道路） 项目的一部分。
// src/model.rs - 模型
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

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::frame::{Frame, SegmentationMask};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 驾驶场景关心的类别：行人、轿车、卡车、红绿灯、停车标志
pub const DRIVING_CLASSES: [u32; 5] = [0, 2, 7, 9, 11];

pub fn is_driving_class(class_id: u32) -> bool {
  DRIVING_CLASSES.contains(&class_id)
}

pub fn coco_label(class_id: u32) -> Option<&'static str> {
  COCO_CLASSES.get(class_id as usize).copied()
}

/// 检测结果，坐标为原始帧像素坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
  pub confidence: f32,
  pub label: String,
  pub class_id: u32,
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[cfg(feature = "onnx")]
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
}

/// 目标检测能力
pub trait Detector: Send + Sync {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError>;
}

/// 可行驶区域分割能力
pub trait Segmenter: Send + Sync {
  fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError>;
}

impl<T: Detector + ?Sized> Detector for Box<T> {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    (**self).detect(frame)
  }
}

impl<T: Detector + ?Sized> Detector for Arc<T> {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    (**self).detect(frame)
  }
}

impl<T: Segmenter + ?Sized> Segmenter for Box<T> {
  fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError> {
    (**self).segment(frame)
  }
}

impl<T: Segmenter + ?Sized> Segmenter for Arc<T> {
  fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError> {
    (**self).segment(frame)
  }
}

#[cfg(feature = "onnx")]
mod deeplab;
#[cfg(feature = "onnx")]
mod yolov8;
#[cfg(feature = "onnx")]
pub use self::deeplab::{DeepLabV3, DeepLabV3Builder};
#[cfg(feature = "onnx")]
pub use self::yolov8::{YoloV8, YoloV8Builder};

/// 按 URL 方案加载检测模型
pub fn load_detector(url: &Url) -> Result<Box<dyn Detector>, ModelError> {
  #[cfg(feature = "onnx")]
  {
    use crate::{FromUrl, FromUrlWithScheme};

    if url.scheme() == YoloV8Builder::SCHEME {
      let detector = YoloV8Builder::from_url(url)?.build()?;
      return Ok(Box::new(detector));
    }
  }
  Err(ModelError::ModelPathError(format!(
    "不支持的检测模型方案: {}",
    url.scheme()
  )))
}

/// 按 URL 方案加载分割模型
pub fn load_segmenter(url: &Url) -> Result<Box<dyn Segmenter>, ModelError> {
  #[cfg(feature = "onnx")]
  {
    use crate::{FromUrl, FromUrlWithScheme};

    if url.scheme() == DeepLabV3Builder::SCHEME {
      let segmenter = DeepLabV3Builder::from_url(url)?.build()?;
      return Ok(Box::new(segmenter));
    }
  }
  Err(ModelError::ModelPathError(format!(
    "不支持的分割模型方案: {}",
    url.scheme()
  )))
}
