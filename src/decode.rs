// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/decode.rs - 检测张量解码
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

//! 将模型输出的扁平检测张量解码为边界框序列。
//!
//! 张量按记录排列，每条记录 6 个浮点数：前 4 个为边界框（布局见 [`BoxLayout`]），
//! 之后是置信度和类别编号。解码只做阈值过滤和数量上限截断，
//! 不排序、不去重、不做非极大值抑制。

use thiserror::Error;
use tracing::debug;

/// 每条检测记录的字段数
pub const RECORD_STRIDE: usize = 6;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_CORNERS_MAX_OUTPUT: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("张量越界: 期望长度 {expected}, 实际长度 {actual}")]
  OutOfBounds { expected: usize, actual: usize },
}

/// 记录中前 4 个字段的含义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxLayout {
  /// (center_x, center_y, width, height)
  #[default]
  CenterSize,
  /// (x1, y1, x2, y2)
  Corners,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
  pub layout: BoxLayout,
  pub confidence_threshold: f32,
  /// `None` 表示不限制输出数量
  pub max_output: Option<usize>,
}

impl Default for DecoderConfig {
  fn default() -> Self {
    Self {
      layout: BoxLayout::CenterSize,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      max_output: None,
    }
  }
}

impl DecoderConfig {
  /// 角点布局，最多输出 5 个结果
  pub fn corners_capped() -> Self {
    Self {
      layout: BoxLayout::Corners,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      max_output: Some(DEFAULT_CORNERS_MAX_OUTPUT),
    }
  }

  pub fn with_layout(mut self, layout: BoxLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_max_output(mut self, max_output: Option<usize>) -> Self {
    self.max_output = max_output;
    self
  }
}

/// 与模型输入图像同一像素坐标系下的边界框。
///
/// 解码时不校正坐标顺序，模型输出的负宽高会原样保留。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
}

impl BoundingBox {
  pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn from_center_size(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self {
      left: cx - w / 2.0,
      top: cy - h / 2.0,
      right: cx + w / 2.0,
      bottom: cy + h / 2.0,
    }
  }

  pub fn is_ordered(&self) -> bool {
    self.left <= self.right && self.top <= self.bottom
  }

  /// 交换颠倒的坐标，使 `left <= right` 且 `top <= bottom`
  pub fn ordered(&self) -> Self {
    Self {
      left: self.left.min(self.right),
      top: self.top.min(self.bottom),
      right: self.left.max(self.right),
      bottom: self.top.max(self.bottom),
    }
  }

  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub confidence: f32,
  pub class_id: i32,
}

/// 单次推理的解码结果，顺序与张量中的记录顺序一致
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedResult {
  pub items: Box<[Detection]>,
}

impl DecodedResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl<'a> IntoIterator for &'a DecodedResult {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

/// 按给定记录数解码张量。
///
/// `tensor.len()` 必须恰好等于 `RECORD_STRIDE * record_count`，否则返回
/// [`DecodeError::OutOfBounds`]，不会读取任何记录。
pub fn decode(
  tensor: &[f32],
  record_count: usize,
  config: &DecoderConfig,
) -> Result<DecodedResult, DecodeError> {
  let expected = record_count
    .checked_mul(RECORD_STRIDE)
    .ok_or(DecodeError::OutOfBounds {
      expected: usize::MAX,
      actual: tensor.len(),
    })?;
  if tensor.len() != expected {
    return Err(DecodeError::OutOfBounds {
      expected,
      actual: tensor.len(),
    });
  }

  let cap = config.max_output.unwrap_or(usize::MAX);
  let mut items = Vec::new();

  for record in tensor.chunks_exact(RECORD_STRIDE) {
    if items.len() >= cap {
      break;
    }

    let confidence = record[4];
    // 与阈值相等的记录同样丢弃
    if confidence.is_nan() || confidence <= config.confidence_threshold {
      continue;
    }

    let bbox = match config.layout {
      BoxLayout::CenterSize => {
        BoundingBox::from_center_size(record[0], record[1], record[2], record[3])
      }
      BoxLayout::Corners => BoundingBox::new(record[0], record[1], record[2], record[3]),
    };

    items.push(Detection {
      bbox,
      confidence,
      class_id: record[5] as i32,
    });
  }

  debug!(
    "解码 {} 条记录，保留 {} 个检测结果",
    record_count,
    items.len()
  );

  Ok(DecodedResult {
    items: items.into_boxed_slice(),
  })
}

/// 由张量长度推出记录数后解码，长度不是 6 的整数倍时返回越界错误
pub fn decode_records(tensor: &[f32], config: &DecoderConfig) -> Result<DecodedResult, DecodeError> {
  let record_count = tensor.len() / RECORD_STRIDE;
  if tensor.len() % RECORD_STRIDE != 0 {
    return Err(DecodeError::OutOfBounds {
      expected: (record_count + 1) * RECORD_STRIDE,
      actual: tensor.len(),
    });
  }
  decode(tensor, record_count, config)
}
