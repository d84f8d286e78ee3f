// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/model.rs - 模型
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  decode::{BoxLayout, DecodeError, DecodedResult, DecoderConfig, decode, decode_records},
  frame::RgbFrame,
};

pub mod labels;

mod replay;
pub use self::replay::{ReplayModel, ReplayModelBuilder, ReplayModelError};

#[cfg(feature = "onnx_model")]
mod onnx;
#[cfg(feature = "onnx_model")]
pub use self::onnx::{OnnxModel, OnnxModelBuilder, OnnxModelError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理运行时的边界：输入一帧，输出扁平检测张量
pub trait InferenceAdapter {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<DetectionTensor, Self::Error>;
}

/// 模型输出的扁平张量。
///
/// `records` 来自运行时报告的输出形状；为 `None` 时由解码器按长度推算。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionTensor {
  pub values: Box<[f32]>,
  pub records: Option<usize>,
}

impl DetectionTensor {
  pub fn new(values: impl Into<Box<[f32]>>, records: Option<usize>) -> Self {
    Self {
      values: values.into(),
      records,
    }
  }

  pub fn decode(&self, config: &DecoderConfig) -> Result<DecodedResult, DecodeError> {
    match self.records {
      Some(records) => decode(&self.values, records, config),
      None => decode_records(&self.values, config),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("未知的边界框布局: {0}")]
  InvalidLayout(String),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidValue { key: &'static str, value: String },
}

/// 解析置信度阈值，只接受有限值
pub fn parse_threshold(value: &str) -> Result<f32, ConfigError> {
  value
    .parse::<f32>()
    .ok()
    .filter(|t| t.is_finite())
    .ok_or_else(|| ConfigError::InvalidValue {
      key: "threshold",
      value: value.to_string(),
    })
}

/// 从模型 URL 的查询参数读取解码配置，例如 `?layout=corners&threshold=0.5&max=5`
impl FromUrl for DecoderConfig {
  type Error = ConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mut config = DecoderConfig::default();

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "layout" => {
          config.layout = match value.as_ref() {
            "center" | "center_size" => BoxLayout::CenterSize,
            "corners" => BoxLayout::Corners,
            other => return Err(ConfigError::InvalidLayout(other.to_string())),
          };
        }
        "threshold" => {
          config.confidence_threshold = parse_threshold(&value)?;
        }
        "max" => {
          config.max_output = if value == "none" {
            None
          } else {
            Some(value.parse().map_err(|_| ConfigError::InvalidValue {
              key: "max",
              value: value.to_string(),
            })?)
          };
        }
        other => debug!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(config)
  }
}

#[derive(Error, Debug)]
pub enum DetectorError<E: std::error::Error + 'static> {
  #[error("推理错误: {0}")]
  Inference(#[source] E),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
}

/// 推理适配器加上解码器，输出可绘制的检测结果
pub struct Detector<A> {
  adapter: A,
  config: DecoderConfig,
}

impl<A> Detector<A> {
  pub fn new(adapter: A, config: DecoderConfig) -> Self {
    Self { adapter, config }
  }

  pub fn config(&self) -> &DecoderConfig {
    &self.config
  }

  pub fn adapter(&self) -> &A {
    &self.adapter
  }
}

impl<A> Model for Detector<A>
where
  A: InferenceAdapter,
  A::Error: std::error::Error + 'static,
{
  type Input = A::Input;
  type Output = DecodedResult;
  type Error = DetectorError<A::Error>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.adapter.infer(input).map_err(DetectorError::Inference)?;
    debug!(
      "模型输出 {} 个数值, 记录数: {:?}",
      tensor.values.len(),
      tensor.records
    );
    Ok(tensor.decode(&self.config)?)
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("张量回放模型错误: {0}")]
  ReplayModelError(#[from] ReplayModelError),
  #[cfg(feature = "onnx_model")]
  #[error("ONNX 模型错误: {0}")]
  OnnxModelError(#[from] OnnxModelError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum ModelWrapper<const W: u32, const H: u32> {
  Replay(ReplayModel<RgbFrame<W, H>>),
  #[cfg(feature = "onnx_model")]
  Onnx(OnnxModel<W, H>),
}

impl<const W: u32, const H: u32> FromUrl for ModelWrapper<W, H> {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ReplayModelBuilder::SCHEME => {
        let model = ReplayModelBuilder::from_url(url)?.build()?;
        Ok(ModelWrapper::Replay(model))
      }
      #[cfg(feature = "onnx_model")]
      OnnxModelBuilder::SCHEME => {
        let model = OnnxModelBuilder::from_url(url)?.build()?;
        Ok(ModelWrapper::Onnx(model))
      }
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl<const W: u32, const H: u32> InferenceAdapter for ModelWrapper<W, H> {
  type Input = RgbFrame<W, H>;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<DetectionTensor, Self::Error> {
    match self {
      ModelWrapper::Replay(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "onnx_model")]
      ModelWrapper::Onnx(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}

/// 模型句柄在启动时创建一次，之后每次拍摄复用
impl<const W: u32, const H: u32> FromUrl for Detector<ModelWrapper<W, H>> {
  type Error = DetectorError<ModelError>;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let config = DecoderConfig::from_url(url)?;
    info!(
      "解码配置: 布局 {:?}, 阈值 {}, 最大输出 {:?}",
      config.layout, config.confidence_threshold, config.max_output
    );
    let adapter = ModelWrapper::<W, H>::from_url(url).map_err(DetectorError::Inference)?;
    Ok(Detector::new(adapter, config))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::BoundingBox;

  struct FixedAdapter(DetectionTensor);

  #[derive(Error, Debug)]
  #[error("adapter failed")]
  struct AdapterFailed;

  impl InferenceAdapter for FixedAdapter {
    type Input = ();
    type Error = AdapterFailed;

    fn infer(&self, _input: &()) -> Result<DetectionTensor, AdapterFailed> {
      Ok(self.0.clone())
    }
  }

  struct FailingAdapter;

  impl InferenceAdapter for FailingAdapter {
    type Input = ();
    type Error = AdapterFailed;

    fn infer(&self, _input: &()) -> Result<DetectionTensor, AdapterFailed> {
      Err(AdapterFailed)
    }
  }

  #[test]
  fn decoder_config_reads_query_pairs() {
    let url = Url::parse("tensor:///tmp/t.json?layout=corners&threshold=0.25&max=5").unwrap();
    let config = DecoderConfig::from_url(&url).unwrap();
    assert_eq!(config, DecoderConfig::corners_capped().with_confidence_threshold(0.25));
  }

  #[test]
  fn decoder_config_defaults_without_query() {
    let url = Url::parse("tensor:///tmp/t.json").unwrap();
    assert_eq!(DecoderConfig::from_url(&url).unwrap(), DecoderConfig::default());
  }

  #[test]
  fn decoder_config_rejects_bad_values() {
    let url = Url::parse("tensor:///t.json?layout=diagonal").unwrap();
    assert_eq!(
      DecoderConfig::from_url(&url).unwrap_err(),
      ConfigError::InvalidLayout("diagonal".to_string())
    );

    let url = Url::parse("tensor:///t.json?threshold=NaN").unwrap();
    assert!(DecoderConfig::from_url(&url).is_err());

    let url = Url::parse("tensor:///t.json?max=-1").unwrap();
    assert!(DecoderConfig::from_url(&url).is_err());
  }

  #[test]
  fn threshold_must_be_finite() {
    assert_eq!(parse_threshold("0.25"), Ok(0.25));
    for bad in ["NaN", "nan", "inf", "-inf", "half"] {
      assert_eq!(
        parse_threshold(bad),
        Err(ConfigError::InvalidValue {
          key: "threshold",
          value: bad.to_string()
        })
      );
    }
  }

  #[test]
  fn detector_uses_shape_record_count() {
    let tensor = DetectionTensor::new(vec![2.0, 3.0, 20.0, 30.0, 0.6, 1.0], Some(1));
    let detector = Detector::new(FixedAdapter(tensor), DecoderConfig::corners_capped());
    let result = detector.infer(&()).unwrap();
    assert_eq!(result.items[0].bbox, BoundingBox::new(2.0, 3.0, 20.0, 30.0));
  }

  #[test]
  fn detector_reports_shape_mismatch() {
    let tensor = DetectionTensor::new(vec![0.0; 10], Some(2));
    let detector = Detector::new(FixedAdapter(tensor), DecoderConfig::default());
    assert!(matches!(
      detector.infer(&()),
      Err(DetectorError::Decode(DecodeError::OutOfBounds {
        expected: 12,
        actual: 10
      }))
    ));
  }

  #[test]
  fn detector_propagates_adapter_failure() {
    let detector = Detector::new(FailingAdapter, DecoderConfig::default());
    assert!(matches!(
      detector.infer(&()),
      Err(DetectorError::Inference(AdapterFailed))
    ));
  }

  #[test]
  fn unknown_model_scheme_is_rejected() {
    let url = Url::parse("pytorch:///model.pt").unwrap();
    assert!(matches!(
      ModelWrapper::<640, 640>::from_url(&url),
      Err(ModelError::SchemeMismatch(_))
    ));
  }
}
