// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/output/media_library.rs - 图库保存
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

//! 以目录模拟用户可见的图库：原始照片存为 JPEG，按日期分目录。
//!
//! 每次拍摄生成 `YYYY/MM/DD/HH-MM-SS-XXXX.jpg`，检测成功时另存
//! `HH-MM-SS-XXXX-boxes.png`，开启 `record` 参数时再写一个同名 `.json`。

use std::{
  fs::File,
  io::{BufWriter, ErrorKind},
  path::{Path, PathBuf},
  sync::Mutex,
};

use chrono::{Datelike, Local};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::DecodedResult,
  frame::Capture,
  output::{
    Render,
    draw::{Draw, DrawError},
    record::Record,
  },
};

const JPEG_QUALITY: u8 = 100;

#[derive(Error, Debug)]
pub enum MediaLibraryError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧计数器锁已损坏")]
  CounterPoisoned,
  #[error("绘制参数错误: {0}")]
  DrawError(#[from] DrawError),
}

pub struct MediaLibraryOutput<const W: u32, const H: u32> {
  directory: PathBuf,
  draw: Draw,
  record: Option<Record>,
  frame_counter: Mutex<u16>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for MediaLibraryOutput<W, H> {
  const SCHEME: &'static str = "library";
}

impl<const W: u32, const H: u32> FromUrl for MediaLibraryOutput<W, H> {
  type Error = MediaLibraryError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(MediaLibraryError::SchemeMismatch);
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record {
        label_with_name: v != "id",
      });

    Ok(Self::new(uri.path(), record).with_draw(Draw::from_url(uri)?))
  }
}

impl<const W: u32, const H: u32> MediaLibraryOutput<W, H> {
  pub fn new(directory: impl AsRef<Path>, record: Option<Record>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      draw: Draw::default(),
      record,
      frame_counter: Mutex::new(0),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  fn frame_id(&self) -> Result<u16, MediaLibraryError> {
    let mut counter = self
      .frame_counter
      .lock()
      .map_err(|_| MediaLibraryError::CounterPoisoned)?;
    *counter = counter.wrapping_add(1);
    Ok(*counter)
  }

  /// 本次拍摄的文件路径（不含扩展名）
  fn capture_stem(&self) -> Result<PathBuf, MediaLibraryError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.frame_id()?
    )))
  }

  /// 保存原始照片并返回本次拍摄的文件路径（不含扩展名）。
  ///
  /// 不覆盖已有文件，同名时换下一个帧号。
  fn save_original(&self, image: &RgbImage) -> Result<PathBuf, MediaLibraryError> {
    let mut attempts = 0u32;
    let (stem, file) = loop {
      let stem = self.capture_stem()?;
      let path = stem.with_extension("jpg");
      match File::create_new(&path) {
        Ok(file) => break (stem, file),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < u16::MAX as u32 => {
          debug!("文件已存在，换下一个帧号: {}", path.display());
          attempts += 1;
        }
        Err(e) => return Err(e.into()),
      }
    };

    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(image)?;
    info!("保存原始照片: {}", stem.with_extension("jpg").display());
    Ok(stem)
  }
}

impl<const W: u32, const H: u32> Render<Capture<W, H>, DecodedResult> for MediaLibraryOutput<W, H> {
  type Error = MediaLibraryError;

  fn render_result(
    &self,
    capture: &Capture<W, H>,
    result: &DecodedResult,
  ) -> Result<(), Self::Error> {
    let stem = self.save_original(&capture.original)?;

    let mut boxes = stem.clone().into_os_string();
    boxes.push("-boxes.png");
    self.draw.draw_detection(&capture.frame, result).save(&boxes)?;

    if let Some(record) = &self.record {
      record.record(result, &stem)?;
    }
    Ok(())
  }

  /// 检测失败时仍保存原始照片
  fn render_failure(&self, capture: &Capture<W, H>) -> Result<(), Self::Error> {
    self.save_original(&capture.original).map(|_| ())
  }
}
