// 该文件是 LogoLens 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser};
use url::Url;

use crate::{
  model::{DEFAULT_INFERENCE_SIZE, MAX_INFERENCE_SIZE},
  output::DEFAULT_JPEG_QUALITY,
};

/// 模型相关参数，服务与单次推理共用
#[derive(ClapArgs, Debug, Clone)]
pub struct ModelArgs {
  /// 模型地址，例如 onnx:///models/logo.onnx?labels=/models/labels.txt
  #[arg(long, env = "LOGOLENS_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 类别标签文件（每行一个类别名），优先于模型地址中的 labels 参数
  #[arg(long, env = "LOGOLENS_LABELS", value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)，进程生命周期内固定
  #[arg(long, env = "LOGOLENS_CONFIDENCE", default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, env = "LOGOLENS_NMS_THRESHOLD", default_value_t = 0.45, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 推理尺寸（像素，1 - 4096）
  #[arg(
    long,
    env = "LOGOLENS_INFERENCE_SIZE",
    default_value_t = DEFAULT_INFERENCE_SIZE,
    value_parser = clap::value_parser!(u32).range(1..=MAX_INFERENCE_SIZE as i64),
    value_name = "PIXELS"
  )]
  pub inference_size: u32,

  /// 标签字体文件（TTF/OTF），不提供时只绘制边框
  #[arg(long, env = "LOGOLENS_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 输出 JPEG 质量 (1 - 100)
  #[arg(long, env = "LOGOLENS_JPEG_QUALITY", default_value_t = DEFAULT_JPEG_QUALITY, value_name = "QUALITY")]
  pub jpeg_quality: u8,
}

/// LogoLens 服务参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub model: ModelArgs,

  /// 监听地址
  #[arg(long, env = "LOGOLENS_LISTEN", default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub listen: SocketAddr,

  /// LINE 频道密钥，用于校验回调签名
  #[arg(long, env = "LINE_CHANNEL_SECRET", hide_env_values = true)]
  pub channel_secret: Option<String>,

  /// LINE 频道访问令牌
  #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
  pub channel_access_token: Option<String>,

  /// 上传大小上限（字节）
  #[arg(long, env = "LOGOLENS_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024, value_name = "BYTES")]
  pub max_upload_bytes: usize,

  /// 单个请求超时（秒），0 表示不限制
  #[arg(long, env = "LOGOLENS_REQUEST_TIMEOUT_SECS", default_value_t = 60, value_name = "SECONDS")]
  pub request_timeout_secs: u64,
}

impl Args {
  /// 同时配置了密钥和令牌时才启用 LINE 回调
  pub fn line_credentials(&self) -> Option<(String, String)> {
    match (&self.channel_secret, &self.channel_access_token) {
      (Some(secret), Some(token)) if !secret.is_empty() && !token.is_empty() => {
        Some((secret.clone(), token.clone()))
      }
      _ => None,
    }
  }
}
