// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  decode::{BoundingBox, DecodedResult},
  frame::RgbFrame,
};

const BOX_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_STROKE_WIDTH: u32 = 3;

pub struct Draw {
  color: [u8; 3],
  stroke_width: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      stroke_width: BOX_STROKE_WIDTH,
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawError {
  #[error("颜色格式错误，应为 rrggbb: {0}")]
  InvalidColor(String),
  #[error("线宽必须为正整数: {0}")]
  InvalidStroke(String),
}

/// 从输出 URL 的查询参数读取绘制样式，例如 `?stroke=2&color=00ff00`
impl FromUrl for Draw {
  type Error = DrawError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mut draw = Draw::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "stroke" => {
          let stroke = value
            .parse::<u32>()
            .ok()
            .filter(|&s| s > 0)
            .ok_or_else(|| DrawError::InvalidStroke(value.to_string()))?;
          draw = draw.with_stroke_width(stroke);
        }
        "color" => draw = draw.with_color(parse_color(&value)?),
        _ => {}
      }
    }
    Ok(draw)
  }
}

fn parse_color(value: &str) -> Result<[u8; 3], DrawError> {
  let hex = value.trim_start_matches('#');
  let invalid = || DrawError::InvalidColor(value.to_string());
  if hex.len() != 6 || !hex.is_ascii() {
    return Err(invalid());
  }
  let mut color = [0u8; 3];
  for (i, channel) in color.iter_mut().enumerate() {
    *channel = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).map_err(|_| invalid())?;
  }
  Ok(color)
}

impl Draw {
  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn with_stroke_width(mut self, stroke_width: u32) -> Self {
    self.stroke_width = stroke_width.max(1);
    self
  }

  /// 画出一个空心矩形，边框向内加粗，超出图像的部分被裁掉
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BoundingBox) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    if !(bbox.left.is_finite()
      && bbox.top.is_finite()
      && bbox.right.is_finite()
      && bbox.bottom.is_finite())
    {
      return;
    }
    let bbox = bbox.ordered();

    let x_min = (bbox.left.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.top.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.right.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.bottom.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.stroke_width as i32 {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DecodedResult) {
    for item in result.iter() {
      self.draw_bbox(image, &item.bbox);
    }
  }

  /// 在模型输入帧上画出检测框，框的坐标与该帧处于同一坐标系
  pub fn draw_detection<const W: u32, const H: u32>(
    &self,
    frame: &RgbFrame<W, H>,
    result: &DecodedResult,
  ) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}
