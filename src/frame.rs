// 该文件是 Daolu （道路） 项目的一部分。
// src/frame.rs - 帧与掩码定义
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

use image::{GrayImage, Luma, RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

/// 可行驶区域像素的标记值
pub const MASK_ON: u8 = 255;

/// 输入帧，通道顺序固定为 RGB
pub type Frame = RgbImage;

/// 可行驶区域二值掩码
///
/// 每个像素为 0 或 [`MASK_ON`]。分辨率由分割模型决定，与输入帧无关。
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMask {
  data: GrayImage,
}

impl SegmentationMask {
  /// 全零掩码
  pub fn empty(width: u32, height: u32) -> Self {
    Self {
      data: GrayImage::new(width, height),
    }
  }

  /// 按像素谓词生成掩码
  pub fn from_fn(width: u32, height: u32, mut on: impl FnMut(u32, u32) -> bool) -> Self {
    let data = GrayImage::from_fn(width, height, |x, y| {
      if on(x, y) { Luma([MASK_ON]) } else { Luma([0]) }
    });
    Self { data }
  }

  pub fn width(&self) -> u32 {
    self.data.width()
  }

  pub fn height(&self) -> u32 {
    self.data.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.data.dimensions()
  }

  pub fn is_on(&self, x: u32, y: u32) -> bool {
    self.data.get_pixel(x, y)[0] > 0
  }

  /// 标记像素数量
  pub fn count_on(&self) -> usize {
    self.data.pixels().filter(|p| p[0] > 0).count()
  }

  /// 最近邻缩放，结果仍为二值
  pub fn resize_nearest(&self, width: u32, height: u32) -> Self {
    if self.dimensions() == (width, height) {
      return self.clone();
    }
    let data = image::imageops::resize(&self.data, width, height, FilterType::Nearest);
    Self { data }
  }

  pub fn as_gray_image(&self) -> &GrayImage {
    &self.data
  }

}

impl From<GrayImage> for SegmentationMask {
  /// 任何非零值都视为可行驶区域
  fn from(mut image: GrayImage) -> Self {
    for p in image.pixels_mut() {
      if p[0] > 0 {
        p[0] = MASK_ON;
      }
    }
    Self { data: image }
  }
}

/// 将 RGB 图像转为 NCHW 浮点张量数据
///
/// `normalize` 接收通道序号与 `[0, 1]` 范围内的像素值。
pub fn rgb_to_nchw_f32(image: &RgbImage, normalize: impl Fn(usize, f32) -> f32) -> Vec<f32> {
  let (width, height) = image.dimensions();
  let plane_size = (width * height) as usize;
  let mut data = vec![0f32; plane_size * RGB_CHANNELS];

  for (x, y, pixel) in image.enumerate_pixels() {
    let idx = (y * width + x) as usize;
    for c in 0..RGB_CHANNELS {
      data[c * plane_size + idx] = normalize(c, pixel[c] as f32 / 255.0);
    }
  }

  data
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn gray_image_is_binarized() {
    let mut gray = GrayImage::new(2, 1);
    gray.put_pixel(1, 0, Luma([17]));
    let mask = SegmentationMask::from(gray);
    assert!(!mask.is_on(0, 0));
    assert_eq!(mask.as_gray_image().get_pixel(1, 0)[0], MASK_ON);
  }

  #[test]
  fn nearest_resize_keeps_binary_values() {
    let mask = SegmentationMask::from_fn(4, 4, |x, _| x >= 2);
    let resized = mask.resize_nearest(13, 7);
    assert_eq!(resized.dimensions(), (13, 7));
    assert!(
      resized
        .as_gray_image()
        .pixels()
        .all(|p| p[0] == 0 || p[0] == MASK_ON)
    );
    assert!(!resized.is_on(0, 3));
    assert!(resized.is_on(12, 3));
  }

  #[test]
  fn nchw_layout_is_planar() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 0]));
    image.put_pixel(1, 0, Rgb([0, 0, 255]));
    let data = rgb_to_nchw_f32(&image, |_, v| v);
    assert_eq!(data, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
  }
}
