// 该文件是 Daolu （道路） 项目的一部分。
// src/service/schema.rs - 服务请求与响应结构
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

use serde::{Deserialize, Serialize};

use crate::model::Detection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionRequest {
  /// base64 图像，可带 data URI 前缀
  pub image_base64: String,
  /// 是否附带标注后的图像
  #[serde(default)]
  pub include_annotated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPerceptionRequest {
  pub images_base64: Vec<String>,
  #[serde(default)]
  pub include_annotated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionResponse {
  pub detections: Vec<Detection>,
  /// 缩放到原图尺寸的可行驶区域掩码（PNG）
  pub lane_mask_base64: String,
  pub inference_time_ms: f64,
  pub fps: f64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub annotated_image_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPerceptionResponse {
  pub results: Vec<PerceptionResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
  Healthy,
  Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
  Ready,
  Error,
}

impl From<bool> for ComponentStatus {
  fn from(ready: bool) -> Self {
    if ready {
      ComponentStatus::Ready
    } else {
      ComponentStatus::Error
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesStatus {
  pub object_detection: ComponentStatus,
  pub lane_segmentation: ComponentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
  pub status: HealthStatus,
  pub version: String,
  pub uptime_seconds: f64,
  pub services: ServicesStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
  pub detail: String,
}

/// 四舍五入到指定小数位
pub fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounding_matches_response_precision() {
    assert_eq!(round_to(12.3456, 2), 12.35);
    assert_eq!(round_to(81.04, 1), 81.0);
    assert_eq!(round_to(0.0, 1), 0.0);
  }

  #[test]
  fn health_serializes_lowercase() {
    let health = HealthResponse {
      status: HealthStatus::Degraded,
      version: "0.1.0".to_string(),
      uptime_seconds: 1.5,
      services: ServicesStatus {
        object_detection: ComponentStatus::from(true),
        lane_segmentation: ComponentStatus::from(false),
      },
    };
    let value = serde_json::to_value(&health).unwrap();
    assert_eq!(value["status"], "degraded");
    assert_eq!(value["services"]["object_detection"], "ready");
    assert_eq!(value["services"]["lane_segmentation"], "error");
  }

  #[test]
  fn annotated_image_is_omitted_when_absent() {
    let response = PerceptionResponse {
      detections: vec![],
      lane_mask_base64: String::new(),
      inference_time_ms: 1.0,
      fps: 1000.0,
      annotated_image_base64: None,
    };
    let value = serde_json::to_value(&response).unwrap();
    assert!(value.get("annotated_image_base64").is_none());

    let request: PerceptionRequest = serde_json::from_str(r#"{"image_base64":"AAAA"}"#).unwrap();
    assert!(!request.include_annotated);
  }
}
