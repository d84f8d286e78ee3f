// 该文件是 Paizhao （拍照识物） 项目的一部分。
// src/output/record.rs - 检测结果记录
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

use std::path::Path;

use serde_json::{Value, json};

use crate::{decode::DecodedResult, model::labels::label_name};

/// 检测结果的 JSON 记录
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn to_json(&self, result: &DecodedResult) -> Value {
    let items: Vec<Value> = result
      .iter()
      .map(|item| {
        let mut record = json!({
          "class_id": item.class_id,
          "confidence": item.confidence,
          "box": {
            "left": item.bbox.left,
            "top": item.bbox.top,
            "right": item.bbox.right,
            "bottom": item.bbox.bottom,
          },
        });
        if self.label_with_name {
          record["label"] = json!(label_name(item.class_id));
        }
        record
      })
      .collect();
    json!({ "detections": items })
  }

  pub fn record(&self, result: &DecodedResult, path: &Path) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(&self.to_json(result))?;
    std::fs::write(path.with_extension("json"), content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::{BoundingBox, Detection};

  #[test]
  fn record_contains_labels_when_requested() {
    let result = DecodedResult {
      items: vec![Detection {
        bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
        confidence: 0.9,
        class_id: 0,
      }]
      .into_boxed_slice(),
    };
    let value = Record {
      label_with_name: true,
    }
    .to_json(&result);
    assert_eq!(value["detections"][0]["label"], "person");
    assert_eq!(value["detections"][0]["box"]["bottom"], 4.0);

    let value = Record {
      label_with_name: false,
    }
    .to_json(&result);
    assert!(value["detections"][0].get("label").is_none());
  }

  #[test]
  fn empty_result_has_empty_list() {
    let value = Record {
      label_with_name: true,
    }
    .to_json(&DecodedResult::default());
    assert_eq!(value, json!({ "detections": [] }));
  }
}
