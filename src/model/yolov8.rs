// 该文件是 Daolu （道路） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 目标检测模型
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

use image::{Rgb, RgbImage, imageops::FilterType};
use ort::{session::Session, value::Tensor};
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, rgb_to_nchw_f32},
  model::{Detection, Detector, ModelError, coco_label, is_driving_class},
  url_file_path, url_query,
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_CONF_THRESH: f32 = 0.25;
const YOLOV8_IOU_THRESH: f32 = 0.7;
const YOLOV8_MAX_DET: usize = 300;
const YOLOV8_PAD_VALUE: u8 = 114;

pub struct YoloV8 {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  params: DecodeParams,
  input_size: u32,
}

pub struct YoloV8Builder {
  model_path: String,
  input_size: u32,
  params: DecodeParams,
}

#[derive(Debug, Clone, Copy)]
struct DecodeParams {
  conf_threshold: f32,
  iou_threshold: f32,
  max_detections: usize,
}

impl FromUrlWithScheme for YoloV8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for YoloV8Builder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let input_size = url_query(url, "size").unwrap_or(YOLOV8_INPUT_SIZE);
    if input_size == 0 {
      return Err(ModelError::ModelPathError("模型输入尺寸必须大于 0".to_string()));
    }

    Ok(YoloV8Builder {
      model_path: url_file_path(url),
      input_size,
      params: DecodeParams {
        conf_threshold: url_query(url, "conf").unwrap_or(YOLOV8_CONF_THRESH),
        iou_threshold: url_query(url, "iou").unwrap_or(YOLOV8_IOU_THRESH),
        max_detections: url_query(url, "max_det").unwrap_or(YOLOV8_MAX_DET),
      },
    })
  }
}

impl YoloV8Builder {
  pub fn build(self) -> Result<YoloV8, ModelError> {
    info!("加载检测模型文件: {}", self.model_path);
    let size = std::fs::metadata(&self.model_path)?.len();
    debug!("模型文件大小: {:.2} MB", size as f64 / (1024.0 * 1024.0));

    let session = Session::builder()?.commit_from_file(&self.model_path)?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .ok_or_else(|| ModelError::ModelInvalid("检测模型没有输入".to_string()))?;
    let output_name = session
      .outputs
      .first()
      .map(|o| o.name.clone())
      .ok_or_else(|| ModelError::ModelInvalid("检测模型没有输出".to_string()))?;
    debug!("模型输入: {}, 模型输出: {}", input_name, output_name);
    info!("检测模型加载完成");

    Ok(YoloV8 {
      session: Mutex::new(session),
      input_name,
      output_name,
      params: self.params,
      input_size: self.input_size,
    })
  }
}

/// 等比缩放并居中填充的几何参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  ratio: f32,
  pad_x: f32,
  pad_y: f32,
}

fn letterbox(frame: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
  let (w0, h0) = frame.dimensions();
  let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
  let new_w = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
  let new_h = ((h0 as f32 * ratio).round() as u32).clamp(1, size);
  let resized = image::imageops::resize(frame, new_w, new_h, FilterType::Triangle);

  let pad_x = (size - new_w) / 2;
  let pad_y = (size - new_h) / 2;
  let mut canvas = RgbImage::from_pixel(size, size, Rgb([YOLOV8_PAD_VALUE; 3]));
  image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

  (
    canvas,
    Letterbox {
      ratio,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
    },
  )
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = ix * iy;
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 按类别做非极大值抑制，结果按置信度降序
fn non_max_suppression(
  mut items: Vec<Detection>,
  iou_threshold: f32,
  max_det: usize,
) -> Vec<Detection> {
  items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<Detection> = Vec::with_capacity(items.len().min(max_det));
  for item in items {
    if kept.len() >= max_det {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == item.class_id && iou(&k.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}

/// 解码 `[1, 4 + nc, N]` 输出
fn decode_output(
  data: &[f32],
  rows: usize,
  anchors: usize,
  letterbox: Letterbox,
  frame_size: (u32, u32),
  params: DecodeParams,
) -> Vec<Detection> {
  let num_classes = rows - 4;
  let (fw, fh) = (frame_size.0 as f32, frame_size.1 as f32);
  let mut candidates = Vec::new();

  for i in 0..anchors {
    let (score, class_id) = {
      let mut best = f32::MIN;
      let mut cls_idx = 0usize;
      for c in 0..num_classes {
        let s = data[(4 + c) * anchors + i];
        if s > best {
          best = s;
          cls_idx = c;
        }
      }
      (best, cls_idx as u32)
    };

    if score < params.conf_threshold || !is_driving_class(class_id) {
      continue;
    }

    let cx = data[i];
    let cy = data[anchors + i];
    let w = data[2 * anchors + i];
    let h = data[3 * anchors + i];

    let x1 = ((cx - w / 2.0 - letterbox.pad_x) / letterbox.ratio).clamp(0.0, fw);
    let y1 = ((cy - h / 2.0 - letterbox.pad_y) / letterbox.ratio).clamp(0.0, fh);
    let x2 = ((cx + w / 2.0 - letterbox.pad_x) / letterbox.ratio).clamp(0.0, fw);
    let y2 = ((cy + h / 2.0 - letterbox.pad_y) / letterbox.ratio).clamp(0.0, fh);

    candidates.push(Detection {
      bbox: [x1, y1, x2, y2],
      confidence: score,
      label: coco_label(class_id).unwrap_or("unknown").to_string(),
      class_id,
    });
  }

  debug!("候选框数量: {}", candidates.len());
  non_max_suppression(candidates, params.iou_threshold, params.max_detections)
}

impl Detector for YoloV8 {
  fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ModelError> {
    let size = self.input_size;
    let (canvas, geometry) = letterbox(frame, size);
    let data = rgb_to_nchw_f32(&canvas, |_, v| v);
    let input_shape = [1usize, 3, size as usize, size as usize];
    let input = Tensor::from_array((input_shape, data.into_boxed_slice()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::InferenceError("检测会话锁已损坏".to_string()))?;

    debug!("执行检测模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
    let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;

    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let (rows, anchors) = match dims.as_slice() {
      [1, rows, anchors] if *rows > 4 && rows < anchors && data.len() == rows * anchors => {
        (*rows, *anchors)
      }
      _ => {
        return Err(ModelError::ModelInvalid(format!(
          "检测模型输出形状异常: {:?}",
          dims
        )));
      }
    };

    let detections = decode_output(data, rows, anchors, geometry, frame.dimensions(), self.params);
    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }
}
