// 该文件是 Daolu （道路） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, frame::Frame, fusion::FusionResult, output::Render, url_file_path,
};

/// 将标注后的帧写入固定路径，连续模式下每帧覆盖一次
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(url_file_path(uri)),
    })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn save_image(&self, image: &Frame) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<FusionResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, _frame: &Frame, result: &FusionResult) -> Result<(), Self::Error> {
    self.save_image(&result.annotated_frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::SegmentationMask;

  #[test]
  fn writes_annotated_frame_and_creates_parents() {
    let dir = std::env::temp_dir().join(format!("daolu-save-{}", std::process::id()));
    let path = dir.join("nested").join("out.png");
    let output = SaveImageFileOutput::new(&path);

    let frame = Frame::from_pixel(8, 6, image::Rgb([10, 20, 30]));
    let annotated = Frame::from_pixel(8, 6, image::Rgb([200, 100, 50]));
    let result = FusionResult {
      annotated_frame: annotated.clone(),
      detections: Vec::new(),
      drivable_mask: SegmentationMask::empty(8, 6),
      latency_ms: 10.0,
      fps: 100.0,
    };

    output.render_result(&frame, &result).unwrap();
    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved, annotated);

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn url_path_is_decoded() {
    let url = Url::parse("image:///tmp/with%20space/out.png").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new("/tmp/with space/out.png"));
  }
}
