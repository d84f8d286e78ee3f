// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/frame.rs - 模型输入帧定义
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

use image::{ImageBuffer, Rgb, RgbImage, imageops::FilterType};
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 默认模型输入边长
pub const MODEL_INPUT_SIZE: u32 = 640;

pub const TORCHVISION_NORM_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
pub const TORCHVISION_NORM_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 固定尺寸的 RGB 帧，按 NHWC 排列
#[derive(Debug, Clone)]
pub struct RgbFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> RgbFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 双线性缩放到 W x H，不保持宽高比
  pub fn resize_from(image: &RgbImage) -> Self {
    let resized = if image.dimensions() == (W, H) {
      image.clone()
    } else {
      image::imageops::resize(image, W, H, FilterType::Triangle)
    };
    Self {
      data: resized.into_raw().into_boxed_slice(),
    }
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(W, H, |x, y| {
      let idx = (y as usize * W as usize + x as usize) * RGB_CHANNELS;
      Rgb([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    })
  }

  /// 转为 NCHW 浮点张量，每个通道按 `(v / 255 - mean) / std` 归一化
  pub fn to_nchw_normalized(&self, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let plane = W as usize * H as usize;
    let mut tensor = vec![0f32; plane * RGB_CHANNELS];

    for (idx, pixel) in self.data.chunks_exact(RGB_CHANNELS).enumerate() {
      for c in 0..RGB_CHANNELS {
        let value = pixel[c] as f32 / 255.0;
        tensor[c * plane + idx] = (value - mean[c]) / std[c];
      }
    }
    tensor
  }
}

impl<const W: u32, const H: u32> AsRef<[u8]> for RgbFrame<W, H> {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

/// 一次拍摄：原始图像与缩放后的模型输入
#[derive(Debug, Clone)]
pub struct Capture<const W: u32, const H: u32> {
  pub original: RgbImage,
  pub frame: RgbFrame<W, H>,
}

impl<const W: u32, const H: u32> From<RgbImage> for Capture<W, H> {
  fn from(original: RgbImage) -> Self {
    let frame = RgbFrame::resize_from(&original);
    Self { original, frame }
  }
}

impl<const W: u32, const H: u32> AsRef<RgbFrame<W, H>> for Capture<W, H> {
  fn as_ref(&self) -> &RgbFrame<W, H> {
    &self.frame
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = RgbFrame::<2, 2>::try_from(vec![0u8; 11]).unwrap_err();
    assert!(matches!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    ));
  }

  #[test]
  fn resize_produces_model_shape() {
    let image = RgbImage::from_pixel(37, 21, Rgb([10, 20, 30]));
    let frame = RgbFrame::<8, 8>::resize_from(&image);
    assert_eq!(frame.as_nhwc().len(), 8 * 8 * 3);
    assert_eq!(&frame.as_nhwc()[..3], &[10, 20, 30]);
  }

  #[test]
  fn rgb_image_round_trip_keeps_pixels() {
    let data: Vec<u8> = (0..12).collect();
    let frame = RgbFrame::<2, 2>::try_from(data).unwrap();
    let image = frame.to_rgb_image();
    assert_eq!(image.get_pixel(1, 0), &Rgb([3, 4, 5]));
    assert_eq!(image.get_pixel(0, 1), &Rgb([6, 7, 8]));
  }

  #[test]
  fn nchw_tensor_is_planar_and_normalized() {
    let frame = RgbFrame::<2, 1>::try_from(vec![255, 0, 0, 0, 255, 0]).unwrap();
    let tensor = frame.to_nchw_normalized([0.0; 3], [1.0; 3]);
    assert_eq!(tensor, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    let tensor = frame.to_nchw_normalized(TORCHVISION_NORM_MEAN_RGB, TORCHVISION_NORM_STD_RGB);
    let expected = (1.0 - 0.485) / 0.229;
    assert!((tensor[0] - expected).abs() < 1e-6);
  }

  #[test]
  fn capture_keeps_original_dimensions() {
    let capture = Capture::<4, 4>::from(RgbImage::new(10, 6));
    assert_eq!(capture.original.dimensions(), (10, 6));
    assert_eq!(capture.frame.width(), 4);
  }
}
