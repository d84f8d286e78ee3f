// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/bin/decode_tensor.rs - 解码检测张量文件
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

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use paizhao::{
  decode::{BoxLayout, DecoderConfig},
  model::{DetectionTensor, InferenceAdapter, ReplayModelBuilder, parse_threshold},
  output::record::Record,
};
use tracing::info;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Layout {
  /// (center_x, center_y, width, height)
  Center,
  /// (x1, y1, x2, y2)
  Corners,
}

impl From<Layout> for BoxLayout {
  fn from(layout: Layout) -> Self {
    match layout {
      Layout::Center => BoxLayout::CenterSize,
      Layout::Corners => BoxLayout::Corners,
    }
  }
}

/// 解码导出的检测张量，以 JSON 输出检测结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 张量 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub tensor: PathBuf,
  /// 边界框布局
  #[arg(long, value_enum, default_value = "center")]
  pub layout: Layout,
  /// 置信度阈值，必须严格大于该值
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD", value_parser = parse_threshold)]
  pub threshold: f32,
  /// 最大输出数量，不指定则不限制
  #[arg(long, value_name = "COUNT")]
  pub max: Option<usize>,
  /// 记录数，不指定则使用文件中的形状或按长度推算
  #[arg(long, value_name = "COUNT")]
  pub records: Option<usize>,
  /// 输出中包含类别名称
  #[arg(long)]
  pub labels: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt().with_writer(std::io::stderr).init();

  let args = Args::parse();
  info!("张量文件: {}", args.tensor.display());

  let model = ReplayModelBuilder::new(&args.tensor).build::<()>()?;
  let DetectionTensor { values, records } = model.infer(&())?;
  let tensor = DetectionTensor::new(values, args.records.or(records));

  let config = DecoderConfig::default()
    .with_layout(args.layout.into())
    .with_confidence_threshold(args.threshold)
    .with_max_output(args.max);
  let result = tensor.decode(&config)?;
  info!("检测到 {} 个物体", result.len());

  let record = Record {
    label_with_name: args.labels,
  };
  println!("{}", serde_json::to_string_pretty(&record.to_json(&result))?);

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_finite_threshold() {
    let parsed = Args::try_parse_from(["decode-tensor", "--tensor", "t.json", "--threshold", "NaN"]);
    assert!(parsed.is_err());

    let args =
      Args::try_parse_from(["decode-tensor", "--tensor", "t.json", "--threshold", "0.3"]).unwrap();
    assert_eq!(args.threshold, 0.3);
  }
}
