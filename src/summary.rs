// 该文件是 LogoLens 项目的一部分。
// src/summary.rs - 标签汇总
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

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::model::DetectItem;

/// 按类别名分组、每组保留最高置信度的检测汇总。
///
/// 条目按类别名升序排列，同一类别名只出现一次。
/// 序列化为 `[["name", 0.9], ...]`。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LabelSummary(Vec<(String, f32)>);

impl LabelSummary {
  pub fn from_items(items: &[DetectItem]) -> Self {
    let mut groups: BTreeMap<&str, f32> = BTreeMap::new();
    for item in items {
      groups
        .entry(item.class_name.as_str())
        .and_modify(|best| {
          if item.score > *best {
            *best = item.score;
          }
        })
        .or_insert(item.score);
    }

    Self(
      groups
        .into_iter()
        .map(|(name, score)| (name.to_string(), score))
        .collect(),
    )
  }

  pub fn entries(&self) -> &[(String, f32)] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn get(&self, class_name: &str) -> Option<f32> {
    self
      .0
      .iter()
      .find(|(name, _)| name == class_name)
      .map(|(_, score)| *score)
  }
}

/// 列表字面量形式，例如 `[['BrandA', 0.9], ['BrandB', 0.6]]`，用于聊天回复
impl fmt::Display for LabelSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, (name, score)) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "[{}, {}]", quote(name), score)?;
    }
    f.write_str("]")
  }
}

fn quote(name: &str) -> String {
  if name.contains('\'') && !name.contains('"') {
    format!("\"{}\"", name)
  } else {
    format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
  }
}
