// 该文件是 LogoLens 项目的一部分。
// src/main.rs - 服务主程序
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

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use logolens::{
  args::Args,
  http::{self, AppState, HttpLimits},
  model::load_detector,
  service::DetectionService,
  webhook::{Dispatcher, LineClient},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_target(false)
    .init();

  let args = Args::parse();

  info!("LogoLens 标志检测服务");
  info!("模型地址: {}", args.model.model);
  info!("置信度阈值: {}", args.model.confidence);
  info!("NMS 阈值: {}", args.model.nms_threshold);
  info!("推理尺寸: {}", args.model.inference_size);

  let detector = load_detector(&args.model).context("模型加载失败")?;
  let service = Arc::new(DetectionService::new(detector).with_jpeg_quality(args.model.jpeg_quality));

  let mut state = AppState::new(Arc::clone(&service), args.model.inference_size);
  match args.line_credentials() {
    Some((secret, token)) => {
      let client = LineClient::new(token).context("LINE 客户端创建失败")?;
      let dispatcher = Dispatcher::new(secret, Arc::new(client), service, args.model.inference_size);
      state = state.with_dispatcher(Arc::new(dispatcher));
    }
    None => warn!("未配置 LINE 凭据，回调接口不可用"),
  }

  let limits = HttpLimits {
    max_upload_bytes: args.max_upload_bytes,
    request_timeout: (args.request_timeout_secs > 0)
      .then(|| Duration::from_secs(args.request_timeout_secs)),
  };
  let app = http::router(state, &limits);

  let listener = tokio::net::TcpListener::bind(args.listen)
    .await
    .with_context(|| format!("无法监听 {}", args.listen))?;
  info!("服务已启动: http://{}", args.listen);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("无法监听退出信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到退出信号，正在关闭...");
}
