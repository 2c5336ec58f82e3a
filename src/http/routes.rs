// 该文件是 LogoLens 项目的一部分。
// src/http/routes.rs - HTTP 接口
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
  body::Bytes,
  extract::{
    Multipart, Query, State,
    multipart::MultipartError,
    rejection::QueryRejection,
  },
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use super::AppState;
use crate::{service::DetectError, summary::LabelSummary, webhook::SIGNATURE_HEADER};

pub const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct SizeQuery {
  pub size: Option<u32>,
}

/// `/getLabel` 应答体
#[derive(Serialize)]
struct LabelResponse {
  label: LabelSummary,
}

impl SizeQuery {
  fn resolve(&self, state: &AppState) -> u32 {
    self.size.unwrap_or(state.inference_size)
  }
}

/// 取出名为 `file` 的字段内容，其余字段跳过
async fn read_file_field(mut multipart: Multipart) -> Result<Option<Bytes>, MultipartError> {
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some(FILE_FIELD) {
      let data = field.bytes().await?;
      debug!("收到上传文件: {} 字节", data.len());
      return Ok(Some(data));
    }
  }
  Ok(None)
}

fn text(status: StatusCode, body: String) -> Response {
  (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn json_error(status: StatusCode, message: String) -> Response {
  (status, Json(json!({ "error": message }))).into_response()
}

/// POST /detectImage：返回绘制了检测框的 JPEG
pub async fn detect_image(
  State(state): State<AppState>,
  query: Result<Query<SizeQuery>, QueryRejection>,
  multipart: Multipart,
) -> Response {
  let query = match query {
    Ok(Query(query)) => query,
    Err(e) => return text(e.status(), e.body_text()),
  };
  let data = match read_file_field(multipart).await {
    Ok(Some(data)) => data,
    Ok(None) => return text(StatusCode::BAD_REQUEST, "缺少 file 字段".to_string()),
    Err(e) => return text(e.status(), e.body_text()),
  };

  match state.service.render_bytes(data, query.resolve(&state)).await {
    Ok(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
    Err(e @ DetectError::InvalidSize(_)) => {
      warn!("/detectImage 参数无效: {}", e);
      text(StatusCode::BAD_REQUEST, e.to_string())
    }
    Err(e) => {
      error!("/detectImage 处理失败: {}", e);
      text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
  }
}

/// POST /getLabel：返回 `{"label": [[name, conf], ...]}`
pub async fn get_label(
  State(state): State<AppState>,
  query: Result<Query<SizeQuery>, QueryRejection>,
  multipart: Multipart,
) -> Response {
  let query = match query {
    Ok(Query(query)) => query,
    Err(e) => return json_error(e.status(), e.body_text()),
  };
  let data = match read_file_field(multipart).await {
    Ok(Some(data)) => data,
    Ok(None) => return json_error(StatusCode::BAD_REQUEST, "缺少 file 字段".to_string()),
    Err(e) => return json_error(e.status(), e.body_text()),
  };

  match state.service.summarize_bytes(data, query.resolve(&state)).await {
    Ok(summary) => Json(LabelResponse { label: summary }).into_response(),
    Err(e) if e.is_client_error() => {
      warn!("/getLabel 输入无效: {}", e);
      json_error(StatusCode::BAD_REQUEST, e.to_string())
    }
    Err(e) => {
      error!("/getLabel 处理失败: {}", e);
      json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
  }
}

/// POST /callback：LINE 回调入口，签名通过后立即应答
pub async fn callback(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
  let Some(dispatcher) = state.dispatcher.as_ref() else {
    return StatusCode::NOT_FOUND.into_response();
  };
  let signature = headers
    .get(SIGNATURE_HEADER)
    .and_then(|value| value.to_str().ok());

  match dispatcher.accept(signature, &body) {
    Ok(_) => {
      debug!("回调已受理");
      text(StatusCode::OK, "OK".to_string())
    }
    Err(e) if e.is_rejection() => {
      warn!("拒绝回调请求: {}", e);
      text(StatusCode::BAD_REQUEST, e.to_string())
    }
    Err(e) => {
      error!("回调处理失败: {}", e);
      text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
  }
}
