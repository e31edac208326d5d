// 该文件是 Daolu （道路） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, frame::Frame, fusion::FusionResult, model::Detection,
  output::Render, url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 记录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
  /// 保存标注后的帧
  Annotated,
  /// 保存原始帧，并在同名 `.json` 文件中写入检测结果
  Raw,
}

/// 按日期分目录保存每一帧
///
/// 路径形如 `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`，`XXXX` 为十六进制帧计数。
/// 默认只保存有检测结果的帧，`?always` 时保存所有帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mode = if uri.query_pairs().any(|(k, _)| k == "record") {
      RecordMode::Raw
    } else {
      RecordMode::Annotated
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(url_file_path(uri), mode, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, mode: RecordMode, always: bool) -> Self {
    Self {
      directory: directory.into(),
      mode,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  pub fn mode(&self) -> RecordMode {
    self.mode
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(path: &Path, detections: &[Detection]) -> Result<(), DirectoryRecordOutputError> {
    let file = std::fs::File::create(path.with_extension("json"))?;
    serde_json::to_writer_pretty(file, detections)?;
    Ok(())
  }
}

impl Render<FusionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &FusionResult) -> Result<(), Self::Error> {
    if !self.always && result.detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    match self.mode {
      RecordMode::Annotated => result.annotated_frame.save(&path)?,
      RecordMode::Raw => {
        frame.save(&path)?;
        Self::write_record(&path, &result.detections)?;
      }
    }
    debug!("记录帧: {}", path.display());

    Ok(())
  }
}
