// 该文件是 Daolu （道路） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::model::Detection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: i32 = 18;
const METRICS_FONT_SIZE: f32 = 24.0;
const METRICS_ORIGIN: (i32, i32) = (20, 20);
const METRICS_COLOR: [u8; 3] = [255, 255, 255];

/// 未知标签使用的颜色（绿色）
pub const DEFAULT_BOX_COLOR: [u8; 3] = [0, 255, 0];

/// 已知标签的颜色表（RGB）
const LABEL_PALETTE: [(&str, [u8; 3]); 5] = [
  ("person", [255, 0, 0]),        // 红色
  ("car", [0, 0, 255]),           // 蓝色
  ("truck", [255, 165, 0]),       // 橙色
  ("traffic light", [255, 255, 0]),
  ("stop sign", [255, 128, 0]),
];

/// 按标签查找边框颜色，未知标签回退到 [`DEFAULT_BOX_COLOR`]
pub fn label_color(label: &str) -> [u8; 3] {
  LABEL_PALETTE
    .iter()
    .find(|(name, _)| *name == label)
    .map(|(_, color)| *color)
    .unwrap_or(DEFAULT_BOX_COLOR)
}

/// 检测框格式化后的标签文字
pub fn label_text(detection: &Detection) -> String {
  format!("{} {:.2}", detection.label, detection.confidence)
}

pub struct Draw {
  font: FontArc,
  label_scale: PxScale,
  metrics_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      label_scale: PxScale::from(LABEL_FONT_SIZE),
      metrics_scale: PxScale::from(METRICS_FONT_SIZE),
    }
  }
}

impl Draw {
  /// 绘制单个检测框与标签，坐标按整数截断
  pub fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let color = Rgb(label_color(&detection.label));

    let x_min = detection.bbox[0] as i32;
    let y_min = detection.bbox[1] as i32;
    let x_max = detection.bbox[2] as i32;
    let y_max = detection.bbox[3] as i32;

    if x_max < x_min || y_max < y_min {
      return;
    }

    let width = (x_max - x_min + 1) as u32;
    let height = (y_max - y_min + 1) as u32;

    // 绘制边框（加粗为2像素）
    draw_hollow_rect_mut(image, Rect::at(x_min, y_min).of_size(width, height), color);
    if width > 2 && height > 2 {
      let inner = Rect::at(x_min + 1, y_min + 1).of_size(width - 2, height - 2);
      draw_hollow_rect_mut(image, inner, color);
    }

    // 标签放在边框上方
    let text_y = (y_min - LABEL_TEXT_HEIGHT).max(0);
    draw_text_mut(
      image,
      color,
      x_min.max(0),
      text_y,
      self.label_scale,
      &self.font,
      &label_text(detection),
    );
  }

  /// 按接收顺序绘制所有检测框
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_detection(image, detection);
    }
  }

  /// 在左上角绘制帧率与延迟
  pub fn draw_metrics(&self, image: &mut RgbImage, fps: f64, latency_ms: f64) {
    let text = format!("FPS: {:.1} | Latency: {:.1}ms", fps, latency_ms);
    draw_text_mut(
      image,
      Rgb(METRICS_COLOR),
      METRICS_ORIGIN.0,
      METRICS_ORIGIN.1,
      self.metrics_scale,
      &self.font,
      &text,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(label: &str, bbox: [f32; 4]) -> Detection {
    Detection {
      bbox,
      confidence: 0.87,
      label: label.to_string(),
      class_id: 0,
    }
  }

  #[test]
  fn known_labels_use_palette() {
    assert_eq!(label_color("person"), [255, 0, 0]);
    assert_eq!(label_color("car"), [0, 0, 255]);
    assert_eq!(label_color("stop sign"), [255, 128, 0]);
  }

  #[test]
  fn unknown_labels_fall_back_to_default() {
    assert_eq!(label_color("zebra"), DEFAULT_BOX_COLOR);
    assert_eq!(label_color(""), DEFAULT_BOX_COLOR);
  }

  #[test]
  fn label_text_uses_two_decimals() {
    assert_eq!(label_text(&detection("car", [0.0; 4])), "car 0.87");
  }

  #[test]
  fn box_edges_are_two_pixels_thick() {
    let mut image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
    let thing = detection("unknown-thing", [20.0, 30.0, 40.0, 50.0]);
    Draw::default().draw_detection(&mut image, &thing);

    let green = Rgb(DEFAULT_BOX_COLOR);
    assert_eq!(*image.get_pixel(20, 40), green);
    assert_eq!(*image.get_pixel(21, 40), green);
    assert_eq!(*image.get_pixel(22, 40), Rgb([0, 0, 0]));
    assert_eq!(*image.get_pixel(40, 50), green);
    assert_eq!(*image.get_pixel(30, 45), Rgb([0, 0, 0]));
  }

  #[test]
  fn out_of_frame_boxes_are_clipped() {
    let mut image = RgbImage::new(32, 32);
    let draw = Draw::default();
    draw.draw_detection(&mut image, &detection("car", [-10.0, -10.0, 100.0, 100.0]));
    draw.draw_detection(&mut image, &detection("car", [20.0, 20.0, 10.0, 10.0]));
    assert_eq!(image.dimensions(), (32, 32));
  }
}
