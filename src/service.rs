// 该文件是 LogoLens 项目的一部分。
// src/service.rs - 检测服务
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

use bytes::Bytes;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  model::{DetectResult, Detector, DetectorError, MAX_INFERENCE_SIZE},
  output::{self, RenderAccessor, default_accessors, extract_rendered},
  summary::LabelSummary,
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("图像解码失败: {0}")]
  Decode(#[source] image::ImageError),
  #[error("推理尺寸无效: {0}，允许范围为 1 - {max}", max = MAX_INFERENCE_SIZE)]
  InvalidSize(u32),
  #[error("检测失败: {0}")]
  Detection(#[from] DetectorError),
  #[error("模型输出中没有可用的渲染图像")]
  RenderUnavailable,
  #[error("JPEG 编码失败: {0}")]
  Encode(#[source] image::ImageError),
  #[error("检测任务异常退出: {0}")]
  Aborted(#[from] tokio::task::JoinError),
}

impl DetectError {
  /// 是否由请求内容本身导致
  pub fn is_client_error(&self) -> bool {
    matches!(self, DetectError::Decode(_) | DetectError::InvalidSize(_))
  }
}

/// 检测服务：包装共享的检测器，产出渲染图像或标签汇总
pub struct DetectionService {
  detector: Arc<dyn Detector>,
  accessors: Vec<Box<dyn RenderAccessor>>,
  jpeg_quality: u8,
}

impl DetectionService {
  pub fn new(detector: Arc<dyn Detector>) -> Self {
    Self {
      detector,
      accessors: default_accessors(),
      jpeg_quality: output::DEFAULT_JPEG_QUALITY,
    }
  }

  pub fn with_accessors(mut self, accessors: Vec<Box<dyn RenderAccessor>>) -> Self {
    self.accessors = accessors;
    self
  }

  pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
    self.jpeg_quality = quality;
    self
  }

  pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectError> {
    let image = image::load_from_memory(bytes).map_err(DetectError::Decode)?;
    debug!("图像解码完成: {}x{}", image.width(), image.height());
    Ok(image.into_rgb8())
  }

  /// 检测并返回绘制了检测框的 JPEG 图像
  pub fn detect_and_render(&self, image: &RgbImage, size: u32) -> Result<Vec<u8>, DetectError> {
    check_size(size)?;

    let now = std::time::Instant::now();
    let mut result = self.detector.infer(image, size)?;
    self.detector.render(image, &mut result)?;
    info!(
      "推理完成，检测到 {} 个对象，耗时: {:.2?}",
      result.items.len(),
      now.elapsed()
    );

    self.encode_rendered(&result)
  }

  /// 一次推理同时得到渲染图像和标签汇总
  pub fn detect_full(&self, image: &RgbImage, size: u32) -> Result<(Vec<u8>, LabelSummary), DetectError> {
    check_size(size)?;

    let mut result = self.detector.infer(image, size)?;
    self.detector.render(image, &mut result)?;
    let summary = LabelSummary::from_items(&result.items);
    Ok((self.encode_rendered(&result)?, summary))
  }

  fn encode_rendered(&self, result: &DetectResult) -> Result<Vec<u8>, DetectError> {
    let Some(rendered) = extract_rendered(result, &self.accessors) else {
      warn!("检测结果中没有可提取的渲染图像");
      return Err(DetectError::RenderUnavailable);
    };

    output::encode_jpeg(rendered, self.jpeg_quality).map_err(DetectError::Encode)
  }

  /// 检测并按类别汇总最高置信度
  pub fn detect_and_summarize(
    &self,
    image: &RgbImage,
    size: u32,
  ) -> Result<LabelSummary, DetectError> {
    check_size(size)?;

    let now = std::time::Instant::now();
    let result = self.detector.infer(image, size)?;
    let summary = LabelSummary::from_items(&result.items);
    info!(
      "推理完成，{} 个对象 / {} 个类别，耗时: {:.2?}",
      result.items.len(),
      summary.len(),
      now.elapsed()
    );

    Ok(summary)
  }

  /// 在阻塞线程池中解码并渲染
  pub async fn render_bytes(self: &Arc<Self>, bytes: Bytes, size: u32) -> Result<Vec<u8>, DetectError> {
    check_size(size)?;
    let service = Arc::clone(self);
    tokio::task::spawn_blocking(move || {
      let image = Self::decode_image(&bytes)?;
      service.detect_and_render(&image, size)
    })
    .await?
  }

  /// 在阻塞线程池中解码并汇总
  pub async fn summarize_bytes(
    self: &Arc<Self>,
    bytes: Bytes,
    size: u32,
  ) -> Result<LabelSummary, DetectError> {
    check_size(size)?;
    let service = Arc::clone(self);
    tokio::task::spawn_blocking(move || {
      let image = Self::decode_image(&bytes)?;
      service.detect_and_summarize(&image, size)
    })
    .await?
  }
}

fn check_size(size: u32) -> Result<(), DetectError> {
  if size == 0 || size > MAX_INFERENCE_SIZE {
    return Err(DetectError::InvalidSize(size));
  }
  Ok(())
}
