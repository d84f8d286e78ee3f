// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/model/replay.rs - 检测张量回放
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

//! 把事先导出的模型输出当作推理结果返回，不依赖推理运行时。
//!
//! 文件为 JSON，可以是扁平数组 `[cx, cy, w, h, conf, cls, ...]`，
//! 也可以带形状 `{"shape": [1, N, 6], "data": [...]}`。

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::RECORD_STRIDE,
  model::{DetectionTensor, InferenceAdapter},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

pub struct ReplayModelBuilder {
  tensor_path: String,
}

impl FromUrlWithScheme for ReplayModelBuilder {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for ReplayModelBuilder {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(ReplayModelBuilder {
      tensor_path: url.path().to_string(),
    })
  }
}

impl ReplayModelBuilder {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      tensor_path: path.as_ref().to_string_lossy().into_owned(),
    }
  }

  pub fn build<Frame>(self) -> Result<ReplayModel<Frame>, ReplayModelError> {
    info!("加载张量文件: {}", self.tensor_path);
    let content = std::fs::read_to_string(&self.tensor_path)?;
    let tensor = parse_tensor(&serde_json::from_str(&content)?)?;
    debug!(
      "张量长度: {}, 记录数: {:?}",
      tensor.values.len(),
      tensor.records
    );

    Ok(ReplayModel {
      tensor,
      _phantom: std::marker::PhantomData,
    })
  }
}

/// 解析张量 JSON。带形状时记录数取除最后一维外各维之积，最后一维必须为 6
pub fn parse_tensor(json: &Value) -> Result<DetectionTensor, ReplayModelError> {
  match json {
    Value::Array(_) => Ok(DetectionTensor::new(parse_values(json)?, None)),
    Value::Object(map) => {
      let data = map
        .get("data")
        .ok_or_else(|| ReplayModelError::ModelInvalid("缺少 data 字段".to_string()))?;
      let values = parse_values(data)?;

      let records = match map.get("shape") {
        None | Some(Value::Null) => None,
        Some(shape) => Some(records_from_shape(shape)?),
      };

      Ok(DetectionTensor::new(values, records))
    }
    _ => Err(ReplayModelError::ModelInvalid(
      "张量必须是数组或对象".to_string(),
    )),
  }
}

fn parse_values(json: &Value) -> Result<Vec<f32>, ReplayModelError> {
  let array = json
    .as_array()
    .ok_or_else(|| ReplayModelError::ModelInvalid("data 必须是数组".to_string()))?;
  array
    .iter()
    .map(|v| {
      v.as_f64()
        .map(|f| f as f32)
        .ok_or_else(|| ReplayModelError::ModelInvalid(format!("非数值元素: {}", v)))
    })
    .collect()
}

fn records_from_shape(shape: &Value) -> Result<usize, ReplayModelError> {
  let dims = shape
    .as_array()
    .ok_or_else(|| ReplayModelError::ModelInvalid("shape 必须是数组".to_string()))?
    .iter()
    .map(|d| {
      d.as_u64()
        .and_then(|d| usize::try_from(d).ok())
        .ok_or_else(|| ReplayModelError::ModelInvalid(format!("非法维度: {}", d)))
    })
    .collect::<Result<Vec<_>, _>>()?;

  match dims.split_last() {
    Some((&last, rest)) if last == RECORD_STRIDE => rest
      .iter()
      .try_fold(1usize, |acc, &d| acc.checked_mul(d))
      .ok_or_else(|| ReplayModelError::ModelInvalid(format!("张量形状 {:?} 的记录数溢出", dims))),
    _ => {
      error!("张量形状 {:?} 的最后一维不是 {}", dims, RECORD_STRIDE);
      Err(ReplayModelError::ModelInvalid(format!(
        "张量形状 {:?} 的最后一维必须为 {}",
        dims, RECORD_STRIDE
      )))
    }
  }
}

/// 对任意输入帧都返回同一个张量
#[derive(Debug)]
pub struct ReplayModel<Frame> {
  tensor: DetectionTensor,
  _phantom: std::marker::PhantomData<Frame>,
}

impl<Frame> ReplayModel<Frame> {
  pub fn from_tensor(tensor: DetectionTensor) -> Self {
    Self {
      tensor,
      _phantom: std::marker::PhantomData,
    }
  }
}

impl<Frame> InferenceAdapter for ReplayModel<Frame> {
  type Input = Frame;
  type Error = ReplayModelError;

  fn infer(&self, _input: &Self::Input) -> Result<DetectionTensor, Self::Error> {
    Ok(self.tensor.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn flat_array_has_no_record_count() {
    let tensor = parse_tensor(&json!([10, 10, 4, 4, 0.9, 0])).unwrap();
    assert_eq!(tensor.records, None);
    assert_eq!(tensor.values.len(), 6);
  }

  #[test]
  fn shape_sets_record_count() {
    let tensor = parse_tensor(&json!({
      "shape": [1, 2, 6],
      "data": [0, 0, 1, 1, 0.9, 0, 0, 0, 1, 1, 0.9, 0]
    }))
    .unwrap();
    assert_eq!(tensor.records, Some(2));
  }

  #[test]
  fn shape_with_wrong_stride_is_invalid() {
    let err = parse_tensor(&json!({ "shape": [1, 6, 2], "data": [] })).unwrap_err();
    assert!(matches!(err, ReplayModelError::ModelInvalid(_)));
  }

  #[test]
  fn oversized_shape_is_invalid() {
    let err = parse_tensor(&json!({
      "shape": [4294967296u64, 4294967296u64, 6],
      "data": []
    }))
    .unwrap_err();
    assert!(matches!(err, ReplayModelError::ModelInvalid(_)));

    let err = parse_tensor(&json!({ "shape": [-1, 6], "data": [] })).unwrap_err();
    assert!(matches!(err, ReplayModelError::ModelInvalid(_)));
  }

  #[test]
  fn non_numeric_data_is_invalid() {
    assert!(parse_tensor(&json!(["a", 1])).is_err());
    assert!(parse_tensor(&json!("tensor")).is_err());
  }

  #[test]
  fn missing_file_is_load_error() {
    let err = ReplayModelBuilder::new("/nonexistent/paizhao/tensor.json")
      .build::<()>()
      .unwrap_err();
    assert!(matches!(err, ReplayModelError::ModelLoadError(_)));
  }

  #[test]
  fn scheme_must_be_tensor() {
    let url = Url::parse("onnx:///model.onnx").unwrap();
    assert!(ReplayModelBuilder::from_url(&url).is_err());
  }

  #[test]
  fn replays_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tensor.json");
    std::fs::write(&path, "[2, 3, 20, 30, 0.6, 1]").unwrap();

    let model = ReplayModelBuilder::new(&path).build::<()>().unwrap();
    let tensor = model.infer(&()).unwrap();
    assert_eq!(&*tensor.values, &[2.0, 3.0, 20.0, 30.0, 0.6, 1.0]);
  }
}
