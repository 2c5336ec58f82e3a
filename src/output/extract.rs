// 该文件是 LogoLens 项目的一部分。
// src/output/extract.rs - 渲染图像提取
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

use image::RgbImage;
use tracing::debug;

use crate::model::{DetectResult, Rendered};

/// 从检测结果中取出渲染图像的一种方式
pub trait RenderAccessor: Send + Sync {
  fn name(&self) -> &str;
  fn extract<'a>(&self, result: &'a DetectResult) -> Option<&'a RgbImage>;
}

pub struct SingleImage;

impl RenderAccessor for SingleImage {
  fn name(&self) -> &str {
    "single"
  }

  fn extract<'a>(&self, result: &'a DetectResult) -> Option<&'a RgbImage> {
    result.rendered.iter().find_map(|r| match r {
      Rendered::Single(image) => Some(image),
      _ => None,
    })
  }
}

pub struct FirstOfBatch;

impl RenderAccessor for FirstOfBatch {
  fn name(&self) -> &str {
    "batch"
  }

  fn extract<'a>(&self, result: &'a DetectResult) -> Option<&'a RgbImage> {
    result.rendered.iter().find_map(|r| match r {
      Rendered::Batch(images) => images.first(),
      _ => None,
    })
  }
}

pub struct NamedField(pub String);

impl RenderAccessor for NamedField {
  fn name(&self) -> &str {
    &self.0
  }

  fn extract<'a>(&self, result: &'a DetectResult) -> Option<&'a RgbImage> {
    result.rendered.iter().find_map(|r| match r {
      Rendered::Field { name, image } if *name == self.0 => Some(image),
      _ => None,
    })
  }
}

/// 默认的提取顺序：单图、批量首图、`imgs` 字段、`ims` 字段
pub fn default_accessors() -> Vec<Box<dyn RenderAccessor>> {
  vec![
    Box::new(SingleImage),
    Box::new(FirstOfBatch),
    Box::new(NamedField("imgs".to_string())),
    Box::new(NamedField("ims".to_string())),
  ]
}

/// 依次尝试 `accessors`，返回第一个命中的渲染图像
pub fn extract_rendered<'a>(
  result: &'a DetectResult,
  accessors: &[Box<dyn RenderAccessor>],
) -> Option<&'a RgbImage> {
  accessors.iter().find_map(|accessor| {
    let image = accessor.extract(result)?;
    debug!("渲染图像来自 {}", accessor.name());
    Some(image)
  })
}
