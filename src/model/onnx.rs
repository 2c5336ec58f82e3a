// 该文件是 LogoLens 项目的一部分。
// src/model/onnx.rs - ONNX Runtime YOLO 检测器
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{Rgb, RgbImage, imageops::FilterType};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, Detector, DetectorError, MAX_INFERENCE_SIZE, Rendered},
  output::{Draw, RenderError},
};

const ONNX_STRIDE: u32 = 32;
const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const DEFAULT_MAX_DETECTIONS: usize = 1000;
const DEFAULT_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("不支持的模型输出形状: {0:?}")]
  UnsupportedOutput(Vec<usize>),
  #[error("标签数量 {labels} 与模型类别数 {classes} 不一致")]
  LabelMismatch { labels: usize, classes: usize },
  #[error("渲染器初始化失败: {0}")]
  RenderError(#[from] RenderError),
}

impl From<OnnxError> for DetectorError {
  fn from(err: OnnxError) -> Self {
    DetectorError::Inference(err.to_string())
  }
}

fn ort_error(err: impl std::fmt::Display) -> OnnxError {
  OnnxError::OrtError(err.to_string())
}

pub struct OnnxDetectorBuilder {
  model_path: PathBuf,
  labels_path: Option<PathBuf>,
  threads: usize,
  confidence: f32,
  nms_threshold: f32,
  max_detections: usize,
  font_path: Option<PathBuf>,
}

impl FromUrlWithScheme for OnnxDetectorBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxDetectorBuilder {
  type Error = OnnxError;

  /// `onnx:///models/logo.onnx?labels=/models/labels.txt&threads=4`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxError::ModelPathError(format!(
        "模型路径必须使用 {} 方案，实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| OnnxError::ModelPathError(e.to_string()))?
      .into_owned();
    if path.is_empty() || path == "/" {
      return Err(OnnxError::ModelPathError("模型路径为空".to_string()));
    }

    let mut builder = OnnxDetectorBuilder::new(path);
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "labels" => builder.labels_path = Some(PathBuf::from(value.as_ref())),
        "threads" => {
          builder.threads = value
            .parse()
            .map_err(|_| OnnxError::ModelPathError(format!("线程数无效: {}", value)))?;
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl OnnxDetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      labels_path: None,
      threads: DEFAULT_THREADS,
      confidence: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
      font_path: None,
    }
  }

  /// 命令行给出的标签文件优先于 URL 中的
  pub fn labels(mut self, path: Option<PathBuf>) -> Self {
    if path.is_some() {
      self.labels_path = path;
    }
    self
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn font(mut self, path: Option<PathBuf>) -> Self {
    self.font_path = path;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self) -> Result<OnnxDetector, OnnxError> {
    info!("加载模型文件: {}", self.model_path.display());
    if !self.model_path.exists() {
      return Err(OnnxError::ModelPathError(format!(
        "模型文件不存在: {}",
        self.model_path.display()
      )));
    }

    let session = Session::builder()
      .map_err(ort_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort_error)?
      .with_intra_threads(self.threads)
      .map_err(ort_error)?
      .commit_from_file(&self.model_path)
      .map_err(ort_error)?;
    info!("模型加载完成");

    let labels = match &self.labels_path {
      Some(path) => {
        let labels = parse_labels(&std::fs::read_to_string(path)?);
        info!("从 {} 读取 {} 个类别标签", path.display(), labels.len());
        labels
      }
      None => {
        warn!("未提供标签文件，类别名将使用 class<id>");
        Vec::new()
      }
    };

    let draw = match &self.font_path {
      Some(path) => Draw::with_font_file(path)?,
      None => Draw::default(),
    };

    debug!(
      "置信度阈值: {}, NMS 阈值: {}, 最大检测数: {}",
      self.confidence, self.nms_threshold, self.max_detections
    );

    Ok(OnnxDetector {
      session: Mutex::new(session),
      labels,
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
      max_detections: self.max_detections,
      draw,
    })
  }
}

/// 基于 ONNX Runtime 的 YOLO 检测器。
///
/// `Session::run` 需要独占访问，所有推理经由同一把互斥锁串行执行。
pub struct OnnxDetector {
  session: Mutex<Session>,
  labels: Vec<String>,
  confidence: f32,
  nms_threshold: f32,
  max_detections: usize,
  draw: Draw,
}

impl OnnxDetector {
  fn class_name(&self, class_id: u32) -> String {
    self
      .labels
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| format!("class{}", class_id))
  }

  fn run(&self, letterbox: Letterbox) -> Result<(Vec<usize>, Vec<f32>), DetectorError> {
    let side = letterbox.size as i64;
    let input = Tensor::from_array((vec![1i64, 3, side, side], letterbox.tensor))
      .map_err(|e| DetectorError::from(ort_error(e)))?;

    let mut session = self.session.lock().map_err(|_| DetectorError::Poisoned)?;
    let outputs = session
      .run(ort::inputs![input])
      .map_err(|e| DetectorError::from(ort_error(e)))?;
    let (shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(|e| DetectorError::from(ort_error(e)))?;

    let dims = shape.iter().map(|&d| d as usize).collect();
    Ok((dims, data.to_vec()))
  }
}

impl Detector for OnnxDetector {
  fn infer(&self, image: &RgbImage, size: u32) -> Result<DetectResult, DetectorError> {
    if size == 0 || size > MAX_INFERENCE_SIZE {
      return Err(DetectorError::InvalidSize(size));
    }

    let input = letterbox(image, size);
    let geometry = input.geometry();
    debug!(
      "输入 {}x{} -> {}x{}, 缩放 {:.3}",
      image.width(),
      image.height(),
      input.size,
      input.size,
      input.scale
    );

    let (dims, data) = self.run(input)?;
    debug!("模型输出形状: {:?}", dims);

    let head = HeadView::new(&dims, &data, self.labels.len())?;
    let candidates = head.decode(self.confidence);
    let kept = nms(candidates, self.nms_threshold, self.max_detections);

    let items = kept
      .into_iter()
      .map(|c| DetectItem {
        class_id: c.class_id,
        class_name: self.class_name(c.class_id),
        score: c.score,
        bbox: geometry.normalize(c.bbox),
      })
      .collect::<Vec<_>>();
    debug!("检测结果: {:?}", items);

    Ok(DetectResult::new(items))
  }

  fn render(&self, image: &RgbImage, result: &mut DetectResult) -> Result<(), DetectorError> {
    let canvas = self.draw.draw_detection(image, result);
    result.rendered.push(Rendered::Single(canvas));
    Ok(())
  }
}

pub fn parse_labels(text: &str) -> Vec<String> {
  text
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(str::to_string)
    .collect()
}

/// 向上取整到步长的倍数
fn stride_align(size: u32) -> u32 {
  size.div_ceil(ONNX_STRIDE).max(1) * ONNX_STRIDE
}

/// 灰边填充后的 CHW 输入
pub struct Letterbox {
  pub tensor: Vec<f32>,
  pub size: u32,
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub width: u32,
  pub height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Geometry {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  width: f32,
  height: f32,
}

impl Letterbox {
  pub fn geometry(&self) -> Geometry {
    Geometry {
      scale: self.scale,
      pad_x: self.pad_x,
      pad_y: self.pad_y,
      width: self.width as f32,
      height: self.height as f32,
    }
  }
}

impl Geometry {
  /// 将输入坐标系中的框映射回原图并归一化
  pub fn normalize(&self, bbox: [f32; 4]) -> [f32; 4] {
    let x = |v: f32| ((v - self.pad_x) / self.scale).clamp(0.0, self.width) / self.width;
    let y = |v: f32| ((v - self.pad_y) / self.scale).clamp(0.0, self.height) / self.height;
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

pub fn letterbox(image: &RgbImage, size: u32) -> Letterbox {
  let size = stride_align(size);
  let (width, height) = image.dimensions();
  let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
  let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
  let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
  let left = (size - new_w) / 2;
  let top = (size - new_h) / 2;

  let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
  let mut canvas = RgbImage::from_pixel(size, size, Rgb(LETTERBOX_FILL));
  image::imageops::overlay(&mut canvas, &resized, left as i64, top as i64);

  let plane = (size * size) as usize;
  let mut tensor = vec![0f32; 3 * plane];
  for (x, y, pixel) in canvas.enumerate_pixels() {
    let idx = (y * size + x) as usize;
    tensor[idx] = pixel[0] as f32 / 255.0;
    tensor[plane + idx] = pixel[1] as f32 / 255.0;
    tensor[2 * plane + idx] = pixel[2] as f32 / 255.0;
  }

  Letterbox {
    tensor,
    size,
    scale,
    pad_x: left as f32,
    pad_y: top as f32,
    width,
    height,
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // 输入坐标系 [x_min, y_min, x_max, y_max]
}

/// YOLO 检测头输出视图。
///
/// 支持 `[1, N, 5 + nc]`（带目标置信度）以及 `[1, 4 + nc, N]`（无目标置信度）两种布局。
pub struct HeadView<'a> {
  data: &'a [f32],
  anchors: usize,
  attrs: usize,
  channels_first: bool,
  objectness: bool,
}

impl<'a> HeadView<'a> {
  pub fn new(dims: &[usize], data: &'a [f32], num_labels: usize) -> Result<Self, OnnxError> {
    let unsupported = || OnnxError::UnsupportedOutput(dims.to_vec());
    let &[batch, a, b] = dims else {
      return Err(unsupported());
    };
    if batch != 1 || a * b != data.len() || a.max(b) < 5 {
      return Err(unsupported());
    }

    let view = |anchors, attrs, channels_first, objectness| HeadView {
      data,
      anchors,
      attrs,
      channels_first,
      objectness,
    };

    let head = if num_labels == 0 {
      if a < b && a > 4 {
        view(b, a, true, false)
      } else if b > 5 {
        view(a, b, false, true)
      } else {
        return Err(unsupported());
      }
    } else if b == num_labels + 5 {
      view(a, b, false, true)
    } else if a == num_labels + 4 {
      view(b, a, true, false)
    } else if b == num_labels + 4 {
      view(a, b, false, false)
    } else {
      let classes = if a < b {
        a.saturating_sub(4)
      } else {
        b.saturating_sub(5)
      };
      return Err(OnnxError::LabelMismatch {
        labels: num_labels,
        classes,
      });
    };

    Ok(head)
  }

  fn at(&self, anchor: usize, attr: usize) -> f32 {
    if self.channels_first {
      self.data[attr * self.anchors + anchor]
    } else {
      self.data[anchor * self.attrs + attr]
    }
  }

  pub fn decode(&self, confidence: f32) -> Vec<Candidate> {
    let class_offset = if self.objectness { 5 } else { 4 };
    let mut candidates = Vec::new();

    for anchor in 0..self.anchors {
      let objectness = if self.objectness {
        self.at(anchor, 4)
      } else {
        1.0
      };
      if objectness <= confidence {
        continue;
      }

      let mut best_class = 0usize;
      let mut best_score = f32::MIN;
      for attr in class_offset..self.attrs {
        let score = self.at(anchor, attr);
        if score > best_score {
          best_score = score;
          best_class = attr - class_offset;
        }
      }

      let score = (objectness * best_score).clamp(0.0, 1.0);
      if score <= confidence {
        continue;
      }

      let cx = self.at(anchor, 0);
      let cy = self.at(anchor, 1);
      let w = self.at(anchor, 2);
      let h = self.at(anchor, 3);

      candidates.push(Candidate {
        class_id: best_class as u32,
        score,
        bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
      });
    }

    candidates
  }
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let iw = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let ih = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = iw * ih;
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 按类别做非极大值抑制，结果按置信度降序
pub fn nms(mut candidates: Vec<Candidate>, threshold: f32, max_detections: usize) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_detections {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}
