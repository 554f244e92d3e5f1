// 该文件是 Shanan （山南西风） 项目的一部分。
// src/annotation/schema.rs - 边界框字段结构识别
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

use serde_json::Value;

use super::{AnnotationError, BOUNDING_BOX};

/// 边界框 [x_min, y_min, x_max, y_max]，像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
  pub x1: f64,
  pub y1: f64,
  pub x2: f64,
  pub y2: f64,
}

impl BBox {
  pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 仅当值是 4 个数字组成的列表时识别为边界框
  pub fn from_value(value: &Value) -> Option<Self> {
    let items = value.as_array()?;
    if items.len() != 4 {
      return None;
    }
    let mut coords = [0.0; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
      *slot = item.as_f64()?;
    }
    Some(Self::new(coords[0], coords[1], coords[2], coords[3]))
  }

  pub fn width(&self) -> f64 {
    (self.x2 - self.x1).abs()
  }

  pub fn height(&self) -> f64 {
    (self.y2 - self.y1).abs()
  }
}

/// `bounding_box` 列表中的单个元素
#[derive(Debug, Clone, PartialEq)]
pub enum BoxSlot {
  /// `{ "label": ..., "box": [x1, y1, x2, y2] }`
  Labeled { label: Option<String>, bbox: BBox },
  /// 裸的 `[x1, y1, x2, y2]`
  Plain(BBox),
  /// 无法识别，不可编辑也不绘制
  Unrecognized(Value),
}

impl BoxSlot {
  fn classify(value: &Value) -> Self {
    if let Some(bbox) = BBox::from_value(value) {
      return BoxSlot::Plain(bbox);
    }

    if let Some(bbox) = value.get("box").and_then(BBox::from_value) {
      let label = value
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string);
      return BoxSlot::Labeled { label, bbox };
    }

    BoxSlot::Unrecognized(value.clone())
  }

  pub fn bbox(&self) -> Option<BBox> {
    match self {
      BoxSlot::Labeled { bbox, .. } | BoxSlot::Plain(bbox) => Some(*bbox),
      BoxSlot::Unrecognized(_) => None,
    }
  }
}

/// `bounding_box` 字段的三种合法形态
///
/// 单框与列表只按结构区分：4 个数字即单框，其它列表逐项识别，允许混合。
#[derive(Debug, Clone, PartialEq)]
pub enum BoxLayout {
  Scalar(BBox),
  List(Vec<BoxSlot>),
}

impl BoxLayout {
  pub fn classify(value: &Value) -> Result<Self, AnnotationError> {
    if let Some(bbox) = BBox::from_value(value) {
      return Ok(BoxLayout::Scalar(bbox));
    }

    match value.as_array() {
      Some(items) => Ok(BoxLayout::List(items.iter().map(BoxSlot::classify).collect())),
      None => Err(AnnotationError::UnrecognizedBox {
        field: BOUNDING_BOX,
        value: value.clone(),
      }),
    }
  }

  /// 可绘制的框及其默认标签，标签规则为 `Object i`（从 1 开始）
  pub fn labeled_boxes(&self) -> Vec<(String, BBox)> {
    match self {
      BoxLayout::Scalar(bbox) => vec![("Object 1".to_string(), *bbox)],
      BoxLayout::List(slots) => slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| match slot {
          BoxSlot::Labeled { label, bbox } => Some((
            label.clone().unwrap_or_else(|| format!("Object {}", i + 1)),
            *bbox,
          )),
          BoxSlot::Plain(bbox) => Some((format!("Object {}", i + 1), *bbox)),
          BoxSlot::Unrecognized(_) => None,
        })
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn four_numbers_are_a_single_box() {
    let layout = BoxLayout::classify(&json!([1, 2.5, 3, 4])).unwrap();
    assert_eq!(layout, BoxLayout::Scalar(BBox::new(1.0, 2.5, 3.0, 4.0)));
  }

  #[test]
  fn four_boxes_are_not_mistaken_for_a_single_box() {
    let value = json!([[0, 0, 1, 1], [0, 0, 2, 2], [0, 0, 3, 3], [0, 0, 4, 4]]);
    match BoxLayout::classify(&value).unwrap() {
      BoxLayout::List(slots) => {
        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|s| matches!(s, BoxSlot::Plain(_))));
      }
      other => panic!("unexpected layout: {:?}", other),
    }
  }

  #[test]
  fn mixed_lists_are_classified_per_element() {
    let value = json!([
      {"label": "player", "box": [0, 0, 10, 10]},
      [5, 5, 20, 20],
      "garbage",
      {"box": [1, 1, 2]},
    ]);
    let BoxLayout::List(slots) = BoxLayout::classify(&value).unwrap() else {
      panic!("expected list layout");
    };
    assert_eq!(
      slots[0],
      BoxSlot::Labeled {
        label: Some("player".into()),
        bbox: BBox::new(0.0, 0.0, 10.0, 10.0)
      }
    );
    assert_eq!(slots[1], BoxSlot::Plain(BBox::new(5.0, 5.0, 20.0, 20.0)));
    assert!(matches!(slots[2], BoxSlot::Unrecognized(_)));
    assert!(matches!(slots[3], BoxSlot::Unrecognized(_)));
  }

  #[test]
  fn non_list_values_are_schema_errors() {
    let err = BoxLayout::classify(&json!({"box": [0, 0, 1, 1]})).unwrap_err();
    assert!(matches!(err, AnnotationError::UnrecognizedBox { .. }));
  }

  #[test]
  fn default_labels_follow_list_position() {
    let value = json!([[0, 0, 1, 1], {"box": [0, 0, 2, 2]}, {"label": "ball", "box": [0, 0, 3, 3]}]);
    let labels: Vec<String> = BoxLayout::classify(&value)
      .unwrap()
      .labeled_boxes()
      .into_iter()
      .map(|(label, _)| label)
      .collect();
    assert_eq!(labels, vec!["Object 1", "Object 2", "ball"]);
  }
}
