// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Capture};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

pub(crate) fn load_rgb_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.to_rgb8())
}

/// 单张图像作为一次拍摄
pub struct ImageFileInput<const W: u32, const H: u32> {
  image: Option<RgbImage>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for ImageFileInput<W, H> {
  const SCHEME: &'static str = "image";
}

impl<const W: u32, const H: u32> FromUrl for ImageFileInput<W, H> {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    Self::open(url.path())
  }
}

impl<const W: u32, const H: u32> ImageFileInput<W, H> {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let image = load_rgb_image(path.as_ref())?;
    Ok(Self { image: Some(image) })
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self { image: Some(image) }
  }
}

impl<const W: u32, const H: u32> Iterator for ImageFileInput<W, H> {
  type Item = Capture<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(Capture::from)
  }
}

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 目录中的每张图像依次作为一次拍摄，按文件名排序，读取失败的文件会被跳过
pub struct FolderInput<const W: u32, const H: u32> {
  files: std::vec::IntoIter<PathBuf>,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for FolderInput<W, H> {
  const SCHEME: &'static str = "folder";
}

impl<const W: u32, const H: u32> FromUrl for FolderInput<W, H> {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FolderInputError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl<const W: u32, const H: u32> FolderInput<W, H> {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, FolderInputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory.as_ref())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();
    debug!(
      "目录 {} 中找到 {} 张图像",
      directory.as_ref().display(),
      files.len()
    );

    Ok(Self {
      files: files.into_iter(),
    })
  }
}

impl<const W: u32, const H: u32> Iterator for FolderInput<W, H> {
  type Item = Capture<W, H>;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match load_rgb_image(&path) {
        Ok(image) => return Some(Capture::from(image)),
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}
