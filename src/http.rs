// 该文件是 LogoLens 项目的一部分。
// src/http.rs - HTTP 服务
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

use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, routing::post};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod routes;
pub mod state;

pub use self::state::AppState;

/// 请求大小和超时限制
#[derive(Debug, Clone)]
pub struct HttpLimits {
  pub max_upload_bytes: usize,
  pub request_timeout: Option<Duration>,
}

impl Default for HttpLimits {
  fn default() -> Self {
    Self {
      max_upload_bytes: 10 * 1024 * 1024,
      request_timeout: Some(Duration::from_secs(60)),
    }
  }
}

/// `/callback` 只在配置了 LINE 凭据时挂载
pub fn router(state: AppState, limits: &HttpLimits) -> Router {
  let mut app = Router::new()
    .route("/detectImage", post(routes::detect_image))
    .route("/getLabel", post(routes::get_label));

  if state.dispatcher.is_some() {
    info!("已启用 LINE 回调: /callback");
    app = app.route("/callback", post(routes::callback));
  }

  let mut app = app
    .with_state(state)
    .layer(DefaultBodyLimit::max(limits.max_upload_bytes));
  if let Some(timeout) = limits.request_timeout {
    app = app.layer(TimeoutLayer::new(timeout));
  }
  app.layer(TraceLayer::new_for_http())
}
