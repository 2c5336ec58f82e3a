// 该文件是 LogoLens 项目的一部分。
// src/webhook/event.rs - 回调事件结构
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

use serde::Deserialize;

use super::WebhookError;

/// 回调请求体。未用到的字段一律忽略。
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
  #[serde(default)]
  pub destination: Option<String>,
  #[serde(default)]
  pub events: Vec<Event>,
}

impl CallbackBody {
  pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
    Ok(serde_json::from_slice(body)?)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub reply_token: Option<String>,
  #[serde(default)]
  pub source: Option<Source>,
  #[serde(default)]
  pub message: Option<Message>,
}

impl Event {
  pub fn user_id(&self) -> Option<&str> {
    self.source.as_ref()?.user_id.as_deref()
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
  Text { id: String, text: String },
  Image { id: String },
  #[serde(other)]
  Other,
}
