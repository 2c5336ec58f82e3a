// 该文件是 LogoLens 项目的一部分。
// src/webhook/client.rs - LINE 消息接口客户端
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

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::WebhookError;

pub const API_BASE: &str = "https://api.line.me";
pub const DATA_API_BASE: &str = "https://api-data.line.me";

/// 聊天平台的消息接口
#[async_trait]
pub trait Messenger: Send + Sync {
  /// 查询用户显示名
  async fn display_name(&self, user_id: &str) -> Result<String, WebhookError>;

  /// 下载消息附带的二进制内容
  async fn message_content(&self, message_id: &str) -> Result<Bytes, WebhookError>;

  /// 以单条文本消息回复
  async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), WebhookError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
  display_name: String,
}

pub struct LineClient {
  http: reqwest::Client,
  access_token: String,
  api_base: String,
  data_api_base: String,
}

impl LineClient {
  pub fn new(access_token: impl Into<String>) -> Result<Self, WebhookError> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      http,
      access_token: access_token.into(),
      api_base: API_BASE.to_string(),
      data_api_base: DATA_API_BASE.to_string(),
    })
  }

  /// 替换接口地址，用于本地桩服务
  pub fn with_endpoints(mut self, api_base: impl Into<String>, data_api_base: impl Into<String>) -> Self {
    self.api_base = api_base.into();
    self.data_api_base = data_api_base.into();
    self
  }

  async fn checked(response: reqwest::Response) -> Result<reqwest::Response, WebhookError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(WebhookError::ApiStatus {
      status: status.as_u16(),
      body,
    })
  }
}

#[async_trait]
impl Messenger for LineClient {
  async fn display_name(&self, user_id: &str) -> Result<String, WebhookError> {
    let url = format!(
      "{}/v2/bot/profile/{}",
      self.api_base,
      urlencoding::encode(user_id)
    );
    debug!("查询用户资料: {}", user_id);
    let response = self
      .http
      .get(url)
      .bearer_auth(&self.access_token)
      .send()
      .await?;
    let profile: Profile = Self::checked(response).await?.json().await?;
    Ok(profile.display_name)
  }

  async fn message_content(&self, message_id: &str) -> Result<Bytes, WebhookError> {
    let url = format!(
      "{}/v2/bot/message/{}/content",
      self.data_api_base,
      urlencoding::encode(message_id)
    );
    let response = self
      .http
      .get(url)
      .bearer_auth(&self.access_token)
      .send()
      .await?;
    let content = Self::checked(response).await?.bytes().await?;
    debug!("下载消息内容 {}: {} 字节", message_id, content.len());
    Ok(content)
  }

  async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), WebhookError> {
    let url = format!("{}/v2/bot/message/reply", self.api_base);
    let payload = json!({
      "replyToken": reply_token,
      "messages": [{ "type": "text", "text": text }],
    });
    let response = self
      .http
      .post(url)
      .bearer_auth(&self.access_token)
      .json(&payload)
      .send()
      .await?;
    Self::checked(response).await?;
    Ok(())
  }
}
