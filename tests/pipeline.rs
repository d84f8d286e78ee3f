// 该文件是 Paizhao （拍照识物） 项目的一部分。
// tests/pipeline.rs - 拍摄到渲染的完整流程测试
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

use image::{Rgb, RgbImage};
use url::Url;

use paizhao::{
  FromUrl,
  decode::{BoundingBox, DecodeError},
  input::InputWrapper,
  model::{Detector, DetectorError, Model, ModelWrapper},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

const S: u32 = 64;

fn url(scheme: &str, path: &Path, query: &str) -> Url {
  Url::parse(&format!("{}://{}{}", scheme, path.display(), query)).unwrap()
}

fn write_photo(path: &Path, width: u32, height: u32) {
  RgbImage::from_pixel(width, height, Rgb([20, 20, 20]))
    .save(path)
    .unwrap();
}

fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
  let mut found = Vec::new();
  let mut pending = vec![dir.to_path_buf()];
  while let Some(dir) = pending.pop() {
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        pending.push(path);
      } else if path.extension().is_some_and(|e| e == ext) {
        found.push(path);
      }
    }
  }
  found
}

#[test]
fn snapshot_draws_capped_corner_boxes() {
  let dir = tempfile::tempdir().unwrap();
  let photo = dir.path().join("capture.png");
  write_photo(&photo, 200, 100);

  // 8 条记录都通过阈值，上限 5
  let records: Vec<String> = (0..8)
    .map(|i| format!("{}, {}, {}, {}, 0.9, {}", 2 + i, 2 + i, 30 + i, 30 + i, i))
    .collect();
  let tensor = dir.path().join("tensor.json");
  std::fs::write(&tensor, format!("[{}]", records.join(", "))).unwrap();

  let model_url = url("tensor", &tensor, "?layout=corners&max=5");
  let model = Detector::<ModelWrapper<S, S>>::from_url(&model_url).unwrap();

  let capture = InputWrapper::<S, S>::from_url(&url("image", &photo, ""))
    .unwrap()
    .next()
    .unwrap();
  let result = model.infer(capture.as_ref()).unwrap();
  assert_eq!(result.len(), 5);
  assert_eq!(result.items[0].bbox, BoundingBox::new(2.0, 2.0, 30.0, 30.0));
  assert_eq!(result.items[4].class_id, 4);

  let out = dir.path().join("out/boxes.png");
  let library = dir.path().join("library");
  let outputs = vec![
    OutputWrapper::<S, S>::from_url(&url("image", &out, "")).unwrap(),
    OutputWrapper::<S, S>::from_url(&url("library", &library, "?record")).unwrap(),
  ];
  let input = InputWrapper::<S, S>::from_url(&url("image", &photo, "")).unwrap();
  OneShotTask.run_task(input, model, outputs).unwrap();

  let annotated = image::open(&out).unwrap().to_rgb8();
  assert_eq!(annotated.dimensions(), (S, S));
  assert_eq!(annotated.get_pixel(2, 2), &Rgb([255, 0, 0]));
  assert_ne!(annotated.get_pixel(60, 60), &Rgb([255, 0, 0]));

  let originals = files_with_extension(&library, "jpg");
  assert_eq!(originals.len(), 1);
  let original = image::open(&originals[0]).unwrap();
  assert_eq!((original.width(), original.height()), (200, 100));

  let records = files_with_extension(&library, "json");
  let value: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&records[0]).unwrap()).unwrap();
  assert_eq!(value["detections"].as_array().unwrap().len(), 5);
}

#[test]
fn snapshot_fails_on_short_tensor_but_keeps_original() {
  let dir = tempfile::tempdir().unwrap();
  let photo = dir.path().join("capture.png");
  write_photo(&photo, 32, 32);

  let tensor = dir.path().join("tensor.json");
  std::fs::write(
    &tensor,
    r#"{"shape": [1, 2, 6], "data": [1, 1, 2, 2, 0.9, 0, 1, 1, 2, 2]}"#,
  )
  .unwrap();

  let model = Detector::<ModelWrapper<S, S>>::from_url(&url("tensor", &tensor, "")).unwrap();
  let capture = InputWrapper::<S, S>::from_url(&url("image", &photo, ""))
    .unwrap()
    .next()
    .unwrap();
  assert!(matches!(
    model.infer(capture.as_ref()),
    Err(DetectorError::Decode(DecodeError::OutOfBounds {
      expected: 12,
      actual: 10
    }))
  ));

  let library = dir.path().join("library");
  let output = OutputWrapper::<S, S>::from_url(&url("library", &library, "")).unwrap();
  let input = InputWrapper::<S, S>::from_url(&url("image", &photo, "")).unwrap();
  assert!(OneShotTask.run_task(input, model, output).is_err());

  assert_eq!(files_with_extension(&library, "jpg").len(), 1);
  assert!(files_with_extension(&library, "png").is_empty());
}

#[test]
fn batch_processes_every_photo_in_folder() {
  let dir = tempfile::tempdir().unwrap();
  let inbox = dir.path().join("inbox");
  std::fs::create_dir_all(&inbox).unwrap();
  for name in ["a.png", "b.png", "c.png"] {
    write_photo(&inbox.join(name), 48, 48);
  }

  let tensor = dir.path().join("tensor.json");
  std::fs::write(&tensor, "[32, 32, 16, 16, 0.8, 0, 10, 10, 4, 4, 0.5, 1]").unwrap();

  let model = Detector::<ModelWrapper<S, S>>::from_url(&url("tensor", &tensor, "")).unwrap();
  let input = InputWrapper::<S, S>::from_url(&url("folder", &inbox, "")).unwrap();
  let library = dir.path().join("library");
  let output = OutputWrapper::<S, S>::from_url(&url("library", &library, "?record=id")).unwrap();

  ContinuousTask::default()
    .run_task(input, model, vec![output])
    .unwrap();

  assert_eq!(files_with_extension(&library, "jpg").len(), 3);
  assert_eq!(files_with_extension(&library, "png").len(), 3);

  for record in files_with_extension(&library, "json") {
    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(record).unwrap()).unwrap();
    // 置信度 0.5 的记录不通过
    let detections = value["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["box"]["left"], 24.0);
    assert!(detections[0].get("label").is_none());
  }
}

#[test]
fn unknown_schemes_are_rejected() {
  let bogus = Url::parse("camera:///dev/video0").unwrap();
  assert!(InputWrapper::<S, S>::from_url(&bogus).is_err());
  assert!(OutputWrapper::<S, S>::from_url(&bogus).is_err());
  assert!(Detector::<ModelWrapper<S, S>>::from_url(&bogus).is_err());
}
