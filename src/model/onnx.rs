// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理
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

use std::sync::Mutex;

use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::RECORD_STRIDE,
  frame::{RgbFrame, TORCHVISION_NORM_MEAN_RGB, TORCHVISION_NORM_STD_RGB},
  model::{DetectionTensor, InferenceAdapter},
};

const ONNX_DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(ort::Error),
  #[error("推理错误: {0}")]
  InferenceError(ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

pub struct OnnxModelBuilder {
  model_path: String,
  intra_threads: usize,
}

impl FromUrlWithScheme for OnnxModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModelBuilder {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let intra_threads = url
      .query_pairs()
      .find(|(k, _)| k == "threads")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(ONNX_DEFAULT_INTRA_THREADS);

    Ok(OnnxModelBuilder {
      model_path: url.path().to_string(),
      intra_threads,
    })
  }
}

impl OnnxModelBuilder {
  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build<const W: u32, const H: u32>(self) -> Result<OnnxModel<W, H>, OnnxModelError> {
    info!("加载模型文件: {}", self.model_path);
    if !std::path::Path::new(&self.model_path).is_file() {
      return Err(OnnxModelError::ModelNotFound(self.model_path));
    }

    let session = Session::builder()
      .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
      .and_then(|b| b.with_intra_threads(self.intra_threads))
      .and_then(|b| b.commit_from_file(&self.model_path))
      .map_err(OnnxModelError::ModelLoadError)?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or_else(|| OnnxModelError::ModelInvalid("模型没有输入".to_string()))?;
    if session.outputs.is_empty() {
      return Err(OnnxModelError::ModelInvalid("模型没有输出".to_string()));
    }

    debug!("模型输入名称: {}", input_name);
    debug!("模型输出数量: {}", session.outputs.len());
    info!("模型加载完成");

    Ok(OnnxModel {
      session: Mutex::new(session),
      input_name,
    })
  }
}

/// 输入 `[1, 3, H, W]` 归一化浮点张量，取第一个输出
pub struct OnnxModel<const W: u32, const H: u32> {
  session: Mutex<Session>,
  input_name: String,
}

impl<const W: u32, const H: u32> InferenceAdapter for OnnxModel<W, H> {
  type Input = RgbFrame<W, H>;
  type Error = OnnxModelError;

  fn infer(&self, input: &Self::Input) -> Result<DetectionTensor, Self::Error> {
    debug!("设置模型输入");
    let data = input.to_nchw_normalized(TORCHVISION_NORM_MEAN_RGB, TORCHVISION_NORM_STD_RGB);
    let input_tensor = Tensor::from_array(([1usize, 3, H as usize, W as usize], data))
      .map_err(OnnxModelError::InferenceError)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxModelError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => input_tensor])
      .map_err(OnnxModelError::InferenceError)?;

    let (shape, data) = outputs[0]
      .try_extract_tensor::<f32>()
      .map_err(OnnxModelError::InferenceError)?;
    debug!("模型输出形状: {:?}", shape);

    // [1, N, 6] 时直接使用 N 作为记录数
    let records = match &shape[..] {
      [1, n, stride] if *stride as usize == RECORD_STRIDE => Some(*n as usize),
      _ => None,
    };

    Ok(DetectionTensor::new(data.to_vec(), records))
  }
}
