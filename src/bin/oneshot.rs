// 该文件是 LogoLens 项目的一部分。
// src/bin/oneshot.rs - 单张图片检测工具
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use logolens::{args::ModelArgs, model::load_detector, service::DetectionService};

/// 对单张图片运行检测，写出标注后的 JPEG 并打印标签汇总
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub model: ModelArgs,

  /// 输入图片路径
  #[arg(long, value_name = "IMAGE")]
  pub input: PathBuf,

  /// 输出 JPEG 路径
  #[arg(long, value_name = "OUTPUT", default_value = "result.jpg")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model.model);
  info!("输入图片: {}", args.input.display());
  info!("输出路径: {}", args.output.display());

  let detector = load_detector(&args.model).context("模型加载失败")?;
  let service = DetectionService::new(detector).with_jpeg_quality(args.model.jpeg_quality);

  let bytes = std::fs::read(&args.input)
    .with_context(|| format!("无法读取 {}", args.input.display()))?;
  let image = DetectionService::decode_image(&bytes)?;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let (jpeg, summary) = service.detect_full(&image, args.model.inference_size)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  std::fs::write(&args.output, jpeg)
    .with_context(|| format!("无法写入 {}", args.output.display()))?;
  info!("结果已保存到 {}", args.output.display());

  println!("{}", serde_json::to_string(&summary)?);
  Ok(())
}
