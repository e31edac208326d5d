// 该文件是 Daolu （道路） 项目的一部分。
// src/fusion/overlay.rs - 可行驶区域叠加
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

use image::RgbImage;

use crate::frame::SegmentationMask;

/// 叠加层权重
pub const OVERLAY_ALPHA: f32 = 0.3;
/// 原始帧权重
pub const FRAME_BETA: f32 = 0.7;
/// 可行驶区域颜色（绿色）
pub const DRIVABLE_COLOR: [u8; 3] = [0, 255, 0];

/// 单通道线性混合
pub fn blend_channel(overlay: u8, base: u8) -> u8 {
  (OVERLAY_ALPHA * overlay as f32 + FRAME_BETA * base as f32)
    .round()
    .clamp(0.0, 255.0) as u8
}

/// 将掩码缩放到帧尺寸
pub fn fit_mask(mask: &SegmentationMask, image: &RgbImage) -> SegmentationMask {
  let (width, height) = image.dimensions();
  mask.resize_nearest(width, height)
}

/// 在掩码覆盖的像素上混合 `color`，返回混合的像素数
///
/// 掩码外的像素叠加层与原图相同，混合结果不变，因此直接跳过。
pub fn blend_mask(image: &mut RgbImage, mask: &SegmentationMask, color: [u8; 3]) -> usize {
  debug_assert_eq!(image.dimensions(), mask.dimensions());

  let mut blended = 0;
  for (x, y, pixel) in image.enumerate_pixels_mut() {
    if x >= mask.width() || y >= mask.height() || !mask.is_on(x, y) {
      continue;
    }
    for c in 0..3 {
      pixel[c] = blend_channel(color[c], pixel[c]);
    }
    blended += 1;
  }
  blended
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn blend_is_linear_and_rounded() {
    assert_eq!(blend_channel(0, 128), 90); // 89.6
    assert_eq!(blend_channel(255, 128), 166); // 166.1
    assert_eq!(blend_channel(255, 255), 255);
    assert_eq!(blend_channel(0, 0), 0);
  }

  #[test]
  fn only_masked_pixels_change() {
    let mut image = RgbImage::from_pixel(4, 2, Rgb([128, 128, 128]));
    let mask = SegmentationMask::from_fn(4, 2, |x, _| x < 2);
    let count = blend_mask(&mut image, &mask, DRIVABLE_COLOR);

    assert_eq!(count, 4);
    assert_eq!(*image.get_pixel(0, 0), Rgb([90, 166, 90]));
    assert_eq!(*image.get_pixel(3, 1), Rgb([128, 128, 128]));
  }

  #[test]
  fn mask_is_fitted_to_frame() {
    let image = RgbImage::new(100, 60);
    let mask = SegmentationMask::from_fn(10, 10, |_, y| y >= 5);
    let fitted = fit_mask(&mask, &image);
    assert_eq!(fitted.dimensions(), (100, 60));
    assert!(!fitted.is_on(50, 0));
    assert!(fitted.is_on(50, 59));
  }
}
