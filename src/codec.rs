// 该文件是 Daolu （道路） 项目的一部分。
// src/codec.rs - base64 与图像编解码
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

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ExtendedColorType, GrayImage, ImageEncoder, RgbImage, codecs::png::PngEncoder};
use thiserror::Error;

const DATA_URI_MARKER: &str = "base64,";

#[derive(Error, Debug)]
pub enum CodecError {
  #[error("base64 解码失败: {0}")]
  InvalidBase64(#[from] base64::DecodeError),
  #[error("图像解码失败: {0}")]
  InvalidImage(#[source] image::ImageError),
  #[error("PNG 编码失败: {0}")]
  EncodeFailed(#[source] image::ImageError),
}

/// 去掉 `data:image/xxx;base64,` 前缀
pub fn strip_data_uri(payload: &str) -> &str {
  let payload = payload.trim();
  match payload.find(DATA_URI_MARKER) {
    Some(idx) => &payload[idx + DATA_URI_MARKER.len()..],
    None => payload,
  }
}

/// 解码 base64 图像为 RGB 帧，忽略换行等空白字符
pub fn decode_base64_image(payload: &str) -> Result<RgbImage, CodecError> {
  let compact: String = strip_data_uri(payload)
    .split_ascii_whitespace()
    .collect();
  let bytes = STANDARD.decode(compact)?;
  let image = image::load_from_memory(&bytes).map_err(CodecError::InvalidImage)?;
  Ok(image.to_rgb8())
}

pub fn encode_rgb_png(image: &RgbImage) -> Result<Vec<u8>, CodecError> {
  let mut buffer = Vec::new();
  PngEncoder::new(&mut buffer)
    .write_image(
      image.as_raw(),
      image.width(),
      image.height(),
      ExtendedColorType::Rgb8,
    )
    .map_err(CodecError::EncodeFailed)?;
  Ok(buffer)
}

pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, CodecError> {
  let mut buffer = Vec::new();
  PngEncoder::new(&mut buffer)
    .write_image(
      image.as_raw(),
      image.width(),
      image.height(),
      ExtendedColorType::L8,
    )
    .map_err(CodecError::EncodeFailed)?;
  Ok(buffer)
}

pub fn encode_base64(bytes: &[u8]) -> String {
  STANDARD.encode(bytes)
}
