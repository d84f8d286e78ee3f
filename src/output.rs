// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(any(feature = "save_image_file", feature = "media_library"))]
use crate::FromUrlWithScheme;
use crate::decode::DecodedResult;
use crate::frame::Capture;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;

  /// 本帧检测失败、没有可绘制的结果时调用
  fn render_failure(&self, _frame: &Frame) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// 依次渲染到多个输出，遇到第一个错误即返回
impl<F, D, R: Render<F, D>> Render<F, D> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error> {
    for output in self {
      output.render_result(frame, result)?;
    }
    Ok(())
  }

  fn render_failure(&self, frame: &F) -> Result<(), Self::Error> {
    for output in self {
      output.render_failure(frame)?;
    }
    Ok(())
  }
}

#[cfg(any(feature = "save_image_file", feature = "media_library"))]
pub mod draw;
pub mod record;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "media_library")]
mod media_library;
#[cfg(feature = "media_library")]
pub use self::media_library::{MediaLibraryError, MediaLibraryOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "media_library")]
  #[error("图库保存错误: {0}")]
  MediaLibraryError(#[from] MediaLibraryError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper<const W: u32, const H: u32> {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput<W, H>),
  #[cfg(feature = "media_library")]
  MediaLibraryOutput(MediaLibraryOutput<W, H>),
}

impl<const W: u32, const H: u32> FromUrl for OutputWrapper<W, H> {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::<W, H>::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "media_library")]
      MediaLibraryOutput::<W, H>::SCHEME => {
        let output = MediaLibraryOutput::from_url(url)?;
        Ok(OutputWrapper::MediaLibraryOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl<const W: u32, const H: u32> Render<Capture<W, H>, DecodedResult> for OutputWrapper<W, H> {
  type Error = OutputError;

  fn render_result(
    &self,
    capture: &Capture<W, H>,
    result: &DecodedResult,
  ) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(capture, result)
        .map_err(OutputError::from),
      #[cfg(feature = "media_library")]
      OutputWrapper::MediaLibraryOutput(output) => output
        .render_result(capture, result)
        .map_err(OutputError::from),
    }
  }

  fn render_failure(&self, capture: &Capture<W, H>) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        output.render_failure(capture).map_err(OutputError::from)
      }
      #[cfg(feature = "media_library")]
      OutputWrapper::MediaLibraryOutput(output) => {
        output.render_failure(capture).map_err(OutputError::from)
      }
    }
  }
}
