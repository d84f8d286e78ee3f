// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/bin/snapshot.rs - 单次拍摄识别
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use paizhao::{
  FromUrl,
  frame::MODEL_INPUT_SIZE,
  input::InputWrapper,
  model::{Detector, ModelWrapper},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

const S: u32 = MODEL_INPUT_SIZE;

/// 拍一张照片，识别并画出检测框
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型路径，例如 onnx:///models/yolov9.onnx?layout=center&threshold=0.5
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 拍摄来源，例如 image:///photos/capture.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，可重复，例如 image:///tmp/boxes.png 与 library:///photos?record
  #[arg(long, value_name = "OUTPUT", required = true)]
  pub output: Vec<Url>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("拍摄来源: {}", args.input);

  let input = InputWrapper::<S, S>::from_url(&args.input)?;
  let model = Detector::<ModelWrapper<S, S>>::from_url(&args.model)?;
  let output = args
    .output
    .iter()
    .map(|url| {
      info!("输出路径: {}", url);
      OutputWrapper::<S, S>::from_url(url)
    })
    .collect::<Result<Vec<_>, _>>()?;

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
