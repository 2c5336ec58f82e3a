// 该文件是 LogoLens 项目的一部分。
// src/webhook/signature.rs - 回调签名校验
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

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookError;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
  let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
    .map_err(|_| WebhookError::SignatureInvalid)?;
  mac.update(body);
  Ok(mac)
}

/// base64(HMAC-SHA256(secret, body))
pub fn sign(secret: &str, body: &[u8]) -> Result<String, WebhookError> {
  let mac = mac_for(secret, body)?;
  Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// 以常量时间比较签名
pub fn verify(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
  let signature = signature
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or(WebhookError::MissingSignature)?;
  let expected = STANDARD
    .decode(signature)
    .map_err(|_| WebhookError::SignatureInvalid)?;

  mac_for(secret, body)?
    .verify_slice(&expected)
    .map_err(|_| WebhookError::SignatureInvalid)
}
