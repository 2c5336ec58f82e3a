// 该文件是 LogoLens 项目的一部分。
// tests/common/mod.rs - 测试辅助
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

#![allow(dead_code)]

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicU32, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
  body::{Body, to_bytes},
  http::{Request, Response, header},
};
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};

use logolens::{
  model::{DetectItem, DetectResult, Detector, DetectorError, Rendered},
  webhook::{Messenger, WebhookError},
};

pub const BOUNDARY: &str = "logolens-test-boundary";

pub struct FakeDetector {
  pub items: Vec<DetectItem>,
  pub renders: bool,
  pub fails: bool,
  pub last_size: AtomicU32,
}

impl FakeDetector {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self {
      items,
      renders: true,
      fails: false,
      last_size: AtomicU32::new(0),
    }
  }

  pub fn without_render(mut self) -> Self {
    self.renders = false;
    self
  }

  pub fn failing(mut self) -> Self {
    self.fails = true;
    self
  }

  pub fn last_size(&self) -> u32 {
    self.last_size.load(Ordering::SeqCst)
  }
}

impl Detector for FakeDetector {
  fn infer(&self, _image: &RgbImage, size: u32) -> Result<DetectResult, DetectorError> {
    self.last_size.store(size, Ordering::SeqCst);
    if self.fails {
      return Err(DetectorError::Inference("模型输出损坏".to_string()));
    }
    Ok(DetectResult::new(self.items.clone()))
  }

  fn render(&self, image: &RgbImage, result: &mut DetectResult) -> Result<(), DetectorError> {
    if self.renders {
      result.rendered.push(Rendered::Single(image.clone()));
    }
    Ok(())
  }
}

pub fn item(name: &str, score: f32) -> DetectItem {
  DetectItem {
    class_id: 0,
    class_name: name.to_string(),
    score,
    bbox: [0.2, 0.2, 0.6, 0.6],
  }
}

/// BrandA 0.7 / 0.9 与 BrandB 0.6
pub fn brand_items() -> Vec<DetectItem> {
  vec![item("BrandA", 0.7), item("BrandA", 0.9), item("BrandB", 0.6)]
}

pub fn png_bytes() -> Vec<u8> {
  let image = RgbImage::from_pixel(64, 48, Rgb([200, 30, 30]));
  let mut buffer = std::io::Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png).unwrap();
  buffer.into_inner()
}

pub fn multipart_request(uri: &str, field: &str, content: &[u8]) -> Request<Body> {
  let mut body = Vec::new();
  body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
  body.extend_from_slice(
    format!(
      "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
      field
    )
    .as_bytes(),
  );
  body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
  body.extend_from_slice(content);
  body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

  Request::builder()
    .method("POST")
    .uri(uri)
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={}", BOUNDARY),
    )
    .body(Body::from(body))
    .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
  to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub fn content_type(response: &Response<Body>) -> String {
  response
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string()
}

/// 记录全部回复的消息接口替身
pub struct FakeMessenger {
  pub display_name: String,
  pub content: Option<Bytes>,
  pub stalled: bool,
  pub replies: Mutex<Vec<(String, String)>>,
}

impl FakeMessenger {
  pub fn new(display_name: &str, content: Option<Vec<u8>>) -> Arc<Self> {
    Arc::new(Self {
      display_name: display_name.to_string(),
      content: content.map(Bytes::from),
      stalled: false,
      replies: Mutex::new(Vec::new()),
    })
  }

  /// 下载内容永不返回，模拟缓慢的上游
  pub fn stalled(display_name: &str) -> Arc<Self> {
    Arc::new(Self {
      display_name: display_name.to_string(),
      content: None,
      stalled: true,
      replies: Mutex::new(Vec::new()),
    })
  }

  pub fn replies(&self) -> Vec<(String, String)> {
    self.replies.lock().unwrap().clone()
  }

  /// 等待后台任务写入至少 `count` 条回复
  pub async fn wait_for_replies(&self, count: usize) -> Vec<(String, String)> {
    for _ in 0..200 {
      let replies = self.replies();
      if replies.len() >= count {
        return replies;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.replies()
  }
}

#[async_trait]
impl Messenger for FakeMessenger {
  async fn display_name(&self, _user_id: &str) -> Result<String, WebhookError> {
    Ok(self.display_name.clone())
  }

  async fn message_content(&self, _message_id: &str) -> Result<Bytes, WebhookError> {
    if self.stalled {
      std::future::pending::<()>().await;
    }
    self.content.clone().ok_or(WebhookError::ApiStatus {
      status: 404,
      body: "not found".to_string(),
    })
  }

  async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), WebhookError> {
    self
      .replies
      .lock()
      .unwrap()
      .push((reply_token.to_string(), text.to_string()));
    Ok(())
  }
}
