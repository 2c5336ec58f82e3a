// 该文件是 LogoLens 项目的一部分。
// src/webhook/dispatch.rs - 回调事件分发
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

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
  Messenger, WebhookError,
  event::{CallbackBody, Event, Message},
  signature,
};
use crate::service::DetectionService;

pub const GREETINGS: [&str; 3] = ["Hello ", "สวัสดีครับท่าน ", "ยินดีต้อนรับครับ คุณ"];
pub const FOLLOW_UP: &str = " โหลดรูปที่มีแบรนด์สินค้าดังๆมาหน่อยสิ";
pub const RESULT_PREFIX: &str = "Object detection result:";

/// 随机问候语 + 显示名 + 引导语
pub fn compose_greeting<R: Rng + ?Sized>(rng: &mut R, display_name: &str) -> String {
  let greeting = GREETINGS[rng.gen_range(0..GREETINGS.len())];
  format!("{}{}{}", greeting, display_name, FOLLOW_UP)
}

pub struct Dispatcher {
  channel_secret: String,
  messenger: Arc<dyn Messenger>,
  service: Arc<DetectionService>,
  inference_size: u32,
}

impl Dispatcher {
  pub fn new(
    channel_secret: impl Into<String>,
    messenger: Arc<dyn Messenger>,
    service: Arc<DetectionService>,
    inference_size: u32,
  ) -> Self {
    Self {
      channel_secret: channel_secret.into(),
      messenger,
      service,
      inference_size,
    }
  }

  fn verify_and_parse(&self, signature: Option<&str>, body: &[u8]) -> Result<CallbackBody, WebhookError> {
    signature::verify(&self.channel_secret, body, signature)?;
    let callback = CallbackBody::parse(body)?;
    debug!("收到 {} 个回调事件", callback.events.len());
    Ok(callback)
  }

  /// 校验签名并在当前任务中处理全部事件，返回成功回复的事件数。
  ///
  /// 只有签名或请求体错误会返回 `Err`；单个事件的失败只记录日志，
  /// 不影响其余事件。
  pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<usize, WebhookError> {
    let callback = self.verify_and_parse(signature, body)?;
    Ok(self.process(&callback.events).await)
  }

  /// 校验签名后立即返回，事件在后台任务中处理。
  ///
  /// 下载与推理不阻塞对平台的应答。
  pub fn accept(self: &Arc<Self>, signature: Option<&str>, body: &[u8]) -> Result<JoinHandle<usize>, WebhookError> {
    let callback = self.verify_and_parse(signature, body)?;
    let dispatcher = Arc::clone(self);
    Ok(tokio::spawn(async move {
      let handled = dispatcher.process(&callback.events).await;
      debug!("后台回调处理完成，{} 个事件已回复", handled);
      handled
    }))
  }

  async fn process(&self, events: &[Event]) -> usize {
    let mut handled = 0;
    for event in events {
      match self.handle_event(event).await {
        Ok(true) => handled += 1,
        Ok(false) => {}
        Err(e) => warn!("回调事件处理失败 ({}): {}", event.kind, e),
      }
    }
    handled
  }

  async fn handle_event(&self, event: &Event) -> Result<bool, WebhookError> {
    let (Some(reply_token), Some(message)) = (event.reply_token.as_deref(), event.message.as_ref())
    else {
      debug!("忽略事件: {}", event.kind);
      return Ok(false);
    };

    match message {
      Message::Text { .. } => {
        self.reply_greeting(reply_token, event.user_id()).await?;
        Ok(true)
      }
      Message::Image { id } => {
        self.reply_detection(reply_token, id).await?;
        Ok(true)
      }
      Message::Other => {
        debug!("忽略不支持的消息类型");
        Ok(false)
      }
    }
  }

  async fn reply_greeting(&self, reply_token: &str, user_id: Option<&str>) -> Result<(), WebhookError> {
    let display_name = match user_id {
      Some(user_id) => self.messenger.display_name(user_id).await?,
      None => String::new(),
    };
    let text = {
      let mut rng = rand::thread_rng();
      compose_greeting(&mut rng, &display_name)
    };
    self.messenger.reply_text(reply_token, &text).await
  }

  async fn reply_detection(&self, reply_token: &str, message_id: &str) -> Result<(), WebhookError> {
    let content = self.messenger.message_content(message_id).await?;
    let summary = self
      .service
      .summarize_bytes(content, self.inference_size)
      .await?;
    info!("消息 {} 检测到 {} 个类别", message_id, summary.len());

    let text = format!("{}{}", RESULT_PREFIX, summary);
    self.messenger.reply_text(reply_token, &text).await
  }
}
