// 该文件是 Daolu （道路） 项目的一部分。
// src/input/v4l2_source.rs - V4L2 摄像头输入源
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

use std::pin::Pin;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_file_path, url_query};

const V4L2_DEFAULT_WIDTH: u32 = 640;
const V4L2_DEFAULT_HEIGHT: u32 = 480;
const V4L2_BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4l2SourceError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无法打开设备 {0}: {1}")]
  OpenFailed(String, #[source] std::io::Error),
  #[error("设备格式错误: {0}")]
  FormatError(#[source] std::io::Error),
  #[error("设备不支持 YUYV 格式，实际为 {0}")]
  UnsupportedFormat(String),
  #[error("无法捕获帧: {0}")]
  CaptureFailed(#[source] std::io::Error),
  #[error("帧数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  FrameSizeMismatch { expected: usize, actual: usize },
}

/// V4L2 摄像头输入源
///
/// 由于 v4l 库的 Stream 需要引用 Device，我们使用 Pin<Box<Device>> 来保证
/// Device 的内存地址稳定，从而可以安全地创建引用它的 Stream。
pub struct V4l2Source {
  device: Pin<Box<Device>>,
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  width: u32,
  height: u32,
  frame_index: u64,
}

impl FromUrlWithScheme for V4l2Source {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Source {
  type Error = V4l2SourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(V4l2SourceError::SchemeMismatch);
    }

    let width = url_query(url, "width").unwrap_or(V4L2_DEFAULT_WIDTH);
    let height = url_query(url, "height").unwrap_or(V4L2_DEFAULT_HEIGHT);
    Self::open(&url_file_path(url), width, height)
  }
}

impl V4l2Source {
  pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, V4l2SourceError> {
    let device = Box::pin(
      Device::with_path(device_path)
        .map_err(|e| V4l2SourceError::OpenFailed(device_path.to_string(), e))?,
    );

    let mut format = device.format().map_err(V4l2SourceError::FormatError)?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device
      .set_format(&format)
      .map_err(V4l2SourceError::FormatError)?;

    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(V4l2SourceError::UnsupportedFormat(format.fourcc.to_string()));
    }
    info!(
      "摄像头已打开: {} {}x{}",
      device_path, format.width, format.height
    );

    let mut source = Self {
      device,
      stream: None,
      width: format.width,
      height: format.height,
      frame_index: 0,
    };

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动；
    // stream 在 Drop 中先于 device 释放
    let device_ref: &Device = &source.device;
    let stream = unsafe {
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(V4l2SourceError::CaptureFailed)?
    };

    source.stream = Some(stream);
    Ok(source)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

impl Drop for V4l2Source {
  fn drop(&mut self) {
    // 确保 stream 在 device 之前被 drop
    self.stream.take();
  }
}

impl Iterator for V4l2Source {
  type Item = Result<Frame, V4l2SourceError>;

  fn next(&mut self) -> Option<Self::Item> {
    let stream = self.stream.as_mut()?;

    let rgb = match stream.next() {
      Ok((buffer, _meta)) => yuyv_to_rgb(buffer, self.width, self.height),
      Err(e) => return Some(Err(V4l2SourceError::CaptureFailed(e))),
    };

    let expected = (self.width * self.height * 3) as usize;
    let actual = rgb.len();
    let frame = match Frame::from_raw(self.width, self.height, rgb) {
      Some(frame) => frame,
      None => return Some(Err(V4l2SourceError::FrameSizeMismatch { expected, actual })),
    };

    self.frame_index += 1;
    debug!("捕获第 {} 帧", self.frame_index);
    Some(Ok(frame))
  }
}
