// 该文件是 LogoLens 项目的一部分。
// tests/webhook.rs - LINE 回调测试
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

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::*;
use logolens::{
  http::{AppState, HttpLimits, router},
  service::DetectionService,
  webhook::{
    Dispatcher, SIGNATURE_HEADER,
    dispatch::{FOLLOW_UP, GREETINGS, RESULT_PREFIX},
    signature,
  },
};

const SECRET: &str = "test-channel-secret";

fn dispatcher(messenger: Arc<FakeMessenger>) -> Arc<Dispatcher> {
  let service = Arc::new(DetectionService::new(Arc::new(FakeDetector::new(
    brand_items(),
  ))));
  Arc::new(Dispatcher::new(SECRET, messenger, service, 640))
}

fn app_with(dispatcher: Arc<Dispatcher>, limits: &HttpLimits) -> Router {
  let service = Arc::new(DetectionService::new(Arc::new(FakeDetector::new(
    brand_items(),
  ))));
  router(AppState::new(service, 640).with_dispatcher(dispatcher), limits)
}

fn app(messenger: Arc<FakeMessenger>) -> Router {
  app_with(dispatcher(messenger), &HttpLimits::default())
}

fn callback_request(body: &str, signature: Option<&str>) -> Request<Body> {
  let mut builder = Request::builder()
    .method("POST")
    .uri("/callback")
    .header("content-type", "application/json");
  if let Some(signature) = signature {
    builder = builder.header(SIGNATURE_HEADER, signature);
  }
  builder.body(Body::from(body.to_string())).unwrap()
}

fn sign(body: &str) -> String {
  signature::sign(SECRET, body.as_bytes()).unwrap()
}

fn signed_request(body: &str) -> Request<Body> {
  callback_request(body, Some(&sign(body)))
}

fn message_event(reply_token: &str, message: serde_json::Value) -> String {
  json!({
    "destination": "Ubot",
    "events": [{
      "type": "message",
      "replyToken": reply_token,
      "source": { "type": "user", "userId": "U123" },
      "timestamp": 1700000000000u64,
      "message": message,
    }]
  })
  .to_string()
}

#[tokio::test]
async fn text_message_gets_personal_greeting() {
  let messenger = FakeMessenger::new("Somchai", None);
  let body = message_event("reply-1", json!({ "type": "text", "id": "1", "text": "hello" }));

  let response = app(Arc::clone(&messenger))
    .oneshot(signed_request(&body))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(&body_bytes(response).await[..], b"OK");

  let replies = messenger.wait_for_replies(1).await;
  assert_eq!(replies.len(), 1);
  let (token, text) = &replies[0];
  assert_eq!(token, "reply-1");
  assert!(GREETINGS.iter().any(|g| *text == format!("{}Somchai{}", g, FOLLOW_UP)));
}

#[tokio::test]
async fn image_message_gets_detection_summary() {
  let messenger = FakeMessenger::new("Somchai", Some(png_bytes()));
  let body = message_event("reply-2", json!({ "type": "image", "id": "325708" }));

  let response = app(Arc::clone(&messenger))
    .oneshot(signed_request(&body))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  assert_eq!(
    messenger.wait_for_replies(1).await,
    vec![(
      "reply-2".to_string(),
      format!("{}[['BrandA', 0.9], ['BrandB', 0.6]]", RESULT_PREFIX)
    )]
  );
}

#[tokio::test]
async fn callback_acknowledges_before_slow_work_finishes() {
  let messenger = FakeMessenger::stalled("Somchai");
  let limits = HttpLimits {
    request_timeout: Some(Duration::from_millis(500)),
    ..HttpLimits::default()
  };
  let body = message_event("reply-6", json!({ "type": "image", "id": "slow" }));

  let response = app_with(dispatcher(Arc::clone(&messenger)), &limits)
    .oneshot(signed_request(&body))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
  assert_eq!(&body_bytes(response).await[..], b"OK");
  assert!(messenger.replies().is_empty());
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
  let messenger = FakeMessenger::new("Somchai", None);
  let body = message_event("reply-3", json!({ "type": "text", "id": "1", "text": "hi" }));
  let forged = signature::sign("some-other-secret", body.as_bytes()).unwrap();

  let response = app(Arc::clone(&messenger))
    .oneshot(callback_request(&body, Some(&forged)))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);

  let dispatcher = dispatcher(Arc::clone(&messenger));
  assert!(dispatcher.accept(Some(&forged), body.as_bytes()).is_err());
  assert!(messenger.replies().is_empty());
}

#[tokio::test]
async fn missing_signature_is_rejected() {
  let messenger = FakeMessenger::new("Somchai", None);
  let body = message_event("reply-4", json!({ "type": "text", "id": "1", "text": "hi" }));

  let response = app(Arc::clone(&messenger))
    .oneshot(callback_request(&body, None))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
  assert!(messenger.replies().is_empty());
}

#[tokio::test]
async fn signed_garbage_body_is_rejected() {
  let messenger = FakeMessenger::new("Somchai", None);
  let response = app(messenger)
    .oneshot(signed_request("{\"events\": ["))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_download_is_logged_not_replied() {
  let messenger = FakeMessenger::new("Somchai", None);
  let body = message_event("reply-5", json!({ "type": "image", "id": "404" }));

  let response = app(Arc::clone(&messenger))
    .oneshot(signed_request(&body))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let handled = dispatcher(Arc::clone(&messenger))
    .accept(Some(&sign(&body)), body.as_bytes())
    .unwrap()
    .await
    .unwrap();
  assert_eq!(handled, 0);
  assert!(messenger.replies().is_empty());
}

#[tokio::test]
async fn unsupported_events_are_ignored() {
  let messenger = FakeMessenger::new("Somchai", None);
  let body = json!({
    "destination": "Ubot",
    "events": [
      { "type": "follow", "replyToken": "r", "source": { "type": "user", "userId": "U1" } },
      {
        "type": "message",
        "replyToken": "s",
        "source": { "type": "user", "userId": "U1" },
        "message": { "type": "sticker", "id": "9", "packageId": "1", "stickerId": "2" }
      }
    ]
  })
  .to_string();

  let handled = dispatcher(Arc::clone(&messenger))
    .handle(Some(&sign(&body)), body.as_bytes())
    .await
    .unwrap();
  assert_eq!(handled, 0);
  assert!(messenger.replies().is_empty());
}

#[tokio::test]
async fn mixed_events_are_handled_in_one_callback() {
  let messenger = FakeMessenger::new("Nok", Some(png_bytes()));
  let body = json!({
    "destination": "Ubot",
    "events": [
      {
        "type": "message",
        "replyToken": "t",
        "source": { "type": "user", "userId": "U1" },
        "message": { "type": "text", "id": "1", "text": "hi" }
      },
      {
        "type": "message",
        "replyToken": "i",
        "source": { "type": "user", "userId": "U1" },
        "message": { "type": "image", "id": "2" }
      }
    ]
  })
  .to_string();

  let handled = dispatcher(Arc::clone(&messenger))
    .accept(Some(&sign(&body)), body.as_bytes())
    .unwrap()
    .await
    .unwrap();
  assert_eq!(handled, 2);

  let replies = messenger.replies();
  assert_eq!(replies[0].0, "t");
  assert!(replies[0].1.contains("Nok"));
  assert_eq!(replies[1].0, "i");
  assert!(replies[1].1.starts_with(RESULT_PREFIX));
}
