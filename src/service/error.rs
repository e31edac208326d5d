// 该文件是 Daolu （道路） 项目的一部分。
// src/service/error.rs - 服务错误与 HTTP 状态映射
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

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{codec::CodecError, fusion::PipelineError, service::schema::ErrorResponse};

#[derive(Error, Debug)]
pub enum ServiceError {
  #[error("无法解码图像: {0}")]
  DecodeError(#[source] CodecError),
  #[error("模型尚未初始化")]
  ModelUnavailable,
  #[error("推理失败: {0}")]
  InferenceFailure(#[from] PipelineError),
  #[error("结果编码失败: {0}")]
  EncodeFailure(#[source] CodecError),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl ServiceError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      ServiceError::DecodeError(_) => StatusCode::BAD_REQUEST,
      ServiceError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      ServiceError::InferenceFailure(_)
      | ServiceError::EncodeFailure(_)
      | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let status = self.status_code();
    if status.is_server_error() {
      error!("请求处理失败: {}", self);
    } else {
      warn!("请求被拒绝: {}", self);
    }

    let body = ErrorResponse {
      detail: self.to_string(),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ModelError;

  #[test]
  fn errors_map_to_expected_status() {
    let decode =
      ServiceError::DecodeError(CodecError::InvalidBase64(base64::DecodeError::InvalidPadding));
    assert_eq!(decode.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
      ServiceError::ModelUnavailable.status_code(),
      StatusCode::SERVICE_UNAVAILABLE
    );
    let inference = ServiceError::from(PipelineError::DetectionFailed(ModelError::InferenceError(
      "boom".to_string(),
    )));
    assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(inference.to_string().contains("boom"));
  }
}
