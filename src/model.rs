// 该文件是 LogoLens 项目的一部分。
// src/model.rs - 检测模型
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

use image::RgbImage;
use thiserror::Error;

use crate::args::ModelArgs;

/// 默认推理尺寸
pub const DEFAULT_INFERENCE_SIZE: u32 = 640;
/// 推理尺寸上限，超出时输入张量的内存占用不可接受
pub const MAX_INFERENCE_SIZE: u32 = 4096;

/// 目标检测器。
///
/// 进程启动时构建一次，之后所有请求共享同一个实例，因此实现必须可以被并发调用；
/// 底层推理引擎不支持并发时，实现内部需自行加锁。
pub trait Detector: Send + Sync {
  /// 以 `size` 为推理尺寸检测 `image`
  fn infer(&self, image: &RgbImage, size: u32) -> Result<DetectResult, DetectorError>;

  /// 将检测结果绘制到 `image` 的副本上，并写入 `result.rendered`
  fn render(&self, image: &RgbImage, result: &mut DetectResult) -> Result<(), DetectorError>;
}

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("推理尺寸无效: {0}")]
  InvalidSize(u32),
  #[error("推理失败: {0}")]
  Inference(String),
  #[error("渲染失败: {0}")]
  Render(String),
  #[error("检测器锁已损坏")]
  Poisoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4], // 归一化 [x_min, y_min, x_max, y_max]
}

/// 检测器可能给出的渲染图像形态
#[derive(Debug, Clone)]
pub enum Rendered {
  /// 单张渲染图像
  Single(RgbImage),
  /// 批量渲染图像，取第一张
  Batch(Vec<RgbImage>),
  /// 由具体实现命名的字段
  Field { name: String, image: RgbImage },
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  pub rendered: Vec<Rendered>,
}

impl DetectResult {
  pub fn new(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      rendered: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

#[cfg(feature = "model_onnx")]
pub mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxDetector, OnnxDetectorBuilder, OnnxError};

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("不支持的模型地址方案: {0}")]
  UnsupportedScheme(String),
  #[cfg(feature = "model_onnx")]
  #[error(transparent)]
  Onnx(#[from] OnnxError),
}

/// 按模型地址的方案选择后端并构建检测器
pub fn load_detector(args: &ModelArgs) -> Result<Arc<dyn Detector>, LoadError> {
  match args.model.scheme() {
    #[cfg(feature = "model_onnx")]
    scheme if scheme == <OnnxDetectorBuilder as crate::FromUrlWithScheme>::SCHEME => {
      use crate::FromUrl;
      let detector = OnnxDetectorBuilder::from_url(&args.model)?
        .labels(args.labels.clone())
        .confidence(args.confidence)
        .nms_threshold(args.nms_threshold)
        .font(args.font.clone())
        .build()?;
      Ok(Arc::new(detector))
    }
    other => Err(LoadError::UnsupportedScheme(other.to_string())),
  }
}
