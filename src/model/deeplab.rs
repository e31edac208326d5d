// 该文件是 Daolu （道路） 项目的一部分。
// src/model/deeplab.rs - DeepLabV3 语义分割模型
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

use std::sync::Mutex;

use image::imageops::FilterType;
use ort::{session::Session, value::Tensor};
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, SegmentationMask, rgb_to_nchw_f32},
  model::{ModelError, Segmenter},
  url_file_path, url_query,
};

const DEEPLAB_INPUT_SIZE: u32 = 520;
const DEEPLAB_DRIVABLE_CLASS: usize = 15;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct DeepLabV3 {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  input_size: u32,
  drivable_class: usize,
}

pub struct DeepLabV3Builder {
  model_path: String,
  input_size: u32,
  drivable_class: usize,
}

impl FromUrlWithScheme for DeepLabV3Builder {
  const SCHEME: &'static str = "deeplab";
}

impl FromUrl for DeepLabV3Builder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let input_size = url_query(url, "size").unwrap_or(DEEPLAB_INPUT_SIZE);
    if input_size == 0 {
      return Err(ModelError::ModelPathError("模型输入尺寸必须大于 0".to_string()));
    }

    Ok(DeepLabV3Builder {
      model_path: url_file_path(url),
      input_size,
      drivable_class: url_query(url, "class").unwrap_or(DEEPLAB_DRIVABLE_CLASS),
    })
  }
}

impl DeepLabV3Builder {
  pub fn build(self) -> Result<DeepLabV3, ModelError> {
    info!("加载分割模型文件: {}", self.model_path);
    let size = std::fs::metadata(&self.model_path)?.len();
    debug!("模型文件大小: {:.2} MB", size as f64 / (1024.0 * 1024.0));

    let session = Session::builder()?.commit_from_file(&self.model_path)?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .ok_or_else(|| ModelError::ModelInvalid("分割模型没有输入".to_string()))?;
    // torchvision 导出的模型第一个输出是 "out"，其余为辅助头
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or_else(|| ModelError::ModelInvalid("分割模型没有输出".to_string()))?;
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
    info!("分割模型加载完成");

    Ok(DeepLabV3 {
      session: Mutex::new(session),
      input_name,
      output_name,
      input_size: self.input_size,
      drivable_class: self.drivable_class,
    })
  }
}

/// 对 `[C, H, W]` 的逐像素得分取 arg-max，命中指定类别的像素置为可行驶
fn argmax_mask(
  scores: &[f32],
  classes: usize,
  width: u32,
  height: u32,
  target: usize,
) -> SegmentationMask {
  let plane = (width * height) as usize;
  SegmentationMask::from_fn(width, height, |x, y| {
    let idx = (y * width + x) as usize;
    let mut best = f32::MIN;
    let mut best_class = 0usize;
    for c in 0..classes {
      let s = scores[c * plane + idx];
      if s > best {
        best = s;
        best_class = c;
      }
    }
    best_class == target
  })
}

impl Segmenter for DeepLabV3 {
  fn segment(&self, frame: &Frame) -> Result<SegmentationMask, ModelError> {
    let size = self.input_size;
    let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
    let data = rgb_to_nchw_f32(&resized, |c, v| (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]);
    let input_shape = [1usize, 3, size as usize, size as usize];
    let input = Tensor::from_array((input_shape, data.into_boxed_slice()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::InferenceError("分割会话锁已损坏".to_string()))?;

    debug!("执行分割模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
    let (shape, scores) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let (classes, height, width) = match dims.as_slice() {
      [1, c, h, w] if *c > self.drivable_class && scores.len() == c * h * w => (*c, *h, *w),
      _ => {
        return Err(ModelError::ModelInvalid(format!(
          "分割模型输出形状异常: {:?}",
          dims
        )));
      }
    };

    let mask = argmax_mask(
      scores,
      classes,
      width as u32,
      height as u32,
      self.drivable_class,
    );
    debug!("可行驶像素数量: {}", mask.count_on());
    Ok(mask)
  }
}
