// 该文件是 LogoLens 项目的一部分。
// src/webhook.rs - LINE 回调处理
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

use thiserror::Error;

use crate::service::DetectError;

pub mod client;
pub mod dispatch;
pub mod event;
pub mod signature;

pub use self::client::{LineClient, Messenger};
pub use self::dispatch::{Dispatcher, compose_greeting};
pub use self::event::{CallbackBody, Event, Message, Source};

/// 签名头
pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Error, Debug)]
pub enum WebhookError {
  #[error("缺少回调签名")]
  MissingSignature,
  #[error("回调签名无效")]
  SignatureInvalid,
  #[error("回调内容无法解析: {0}")]
  Payload(#[from] serde_json::Error),
  #[error("消息接口请求失败: {0}")]
  Api(#[from] reqwest::Error),
  #[error("消息接口返回 {status}: {body}")]
  ApiStatus { status: u16, body: String },
  #[error(transparent)]
  Detect(#[from] DetectError),
}

impl WebhookError {
  /// 回调请求本身有误，应答 400
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      WebhookError::MissingSignature | WebhookError::SignatureInvalid | WebhookError::Payload(_)
    )
  }
}
