// 该文件是 Shanan （山南西风） 项目的一部分。
// src/annotation.rs - 标注记录定义
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

//! # 标注记录
//!
//! 一条标注是一个字段名到任意 JSON 值的映射。审查流程只关心其中少数字段：
//! 任务类别、审核状态、边界框以及时间窗口。其余字段原样保留，保存时写回。

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

mod schema;
mod window;

pub use self::schema::{BBox, BoxLayout, BoxSlot};
pub use self::window::{AnswerWindow, QuestionWindow};

pub const TASK_L1: &str = "task_L1";
pub const TASK_L2: &str = "task_L2";
pub const REVIEWED: &str = "reviewed";
pub const RETRACK: &str = "retrack";
pub const ANNOTATION_ID: &str = "annotation_id";
pub const QUESTION: &str = "question";
pub const QUERY: &str = "query";
pub const ANSWER: &str = "answer";
pub const FIRST_BOUNDING_BOX: &str = "first_bounding_box";
pub const BOUNDING_BOX: &str = "bounding_box";
pub const Q_WINDOW_FRAME: &str = "Q_window_frame";
pub const A_WINDOW_FRAME: &str = "A_window_frame";
pub const TRACKING_BBOXES: &str = "tracking_bboxes";
pub const MOT_FILE: &str = "mot_file";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
  #[error("标注记录不是 JSON 对象")]
  NotAnObject,
  #[error("字段 `{field}` 的边界框格式无法识别: {value}")]
  UnrecognizedBox { field: &'static str, value: Value },
  #[error("字段 `{field}` 的窗口帧格式无法识别: {value}")]
  MalformedWindow { field: &'static str, value: Value },
}

/// 单条标注
///
/// `Clone` 为深拷贝，撤销操作依赖这一点按值恢复。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotation(Map<String, Value>);

impl TryFrom<Value> for Annotation {
  type Error = AnnotationError;

  fn try_from(value: Value) -> Result<Self, Self::Error> {
    match value {
      Value::Object(fields) => Ok(Annotation(fields)),
      _ => Err(AnnotationError::NotAnObject),
    }
  }
}

impl From<Annotation> for Value {
  fn from(annotation: Annotation) -> Self {
    Value::Object(annotation.0)
  }
}

impl From<Map<String, Value>> for Annotation {
  fn from(fields: Map<String, Value>) -> Self {
    Annotation(fields)
  }
}

impl Annotation {
  pub fn fields(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
    &mut self.0
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.0.contains_key(key)
  }

  pub fn set(&mut self, key: &str, value: Value) {
    self.0.insert(key.to_string(), value);
  }

  pub fn annotation_id(&self) -> Option<&Value> {
    self.get(ANNOTATION_ID).filter(|v| !v.is_null())
  }

  pub fn task_l1(&self) -> Option<&str> {
    self.get(TASK_L1).and_then(Value::as_str)
  }

  pub fn task_l2(&self) -> Option<&str> {
    self.get(TASK_L2).and_then(Value::as_str)
  }

  /// 问题文本，没有 `question` 时退回到 `query`
  pub fn question(&self) -> Option<&str> {
    self
      .get(QUESTION)
      .or_else(|| self.get(QUERY))
      .and_then(Value::as_str)
  }

  /// 答案的展示文本，列表答案以逗号连接
  pub fn answer_text(&self) -> Option<String> {
    match self.get(ANSWER)? {
      Value::Null => None,
      Value::String(s) => Some(s.clone()),
      Value::Array(items) => Some(
        items
          .iter()
          .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
          })
          .collect::<Vec<_>>()
          .join(", "),
      ),
      other => Some(other.to_string()),
    }
  }

  pub fn is_reviewed(&self) -> bool {
    self.get(REVIEWED).and_then(Value::as_bool).unwrap_or(false)
  }

  pub fn set_reviewed(&mut self, reviewed: bool) {
    self.set(REVIEWED, Value::Bool(reviewed));
  }

  pub fn needs_retrack(&self) -> bool {
    self.get(RETRACK).and_then(Value::as_bool).unwrap_or(false)
  }

  /// 标记需要重新跟踪，只有手动改框会走到这里，从不自动清除
  pub fn mark_retrack(&mut self) {
    self.set(RETRACK, Value::Bool(true));
  }

  pub fn has_first_bounding_box(&self) -> bool {
    self.contains(FIRST_BOUNDING_BOX)
  }

  pub fn first_bounding_box(&self) -> Result<Option<BBox>, AnnotationError> {
    match self.get(FIRST_BOUNDING_BOX) {
      None => Ok(None),
      Some(value) => BBox::from_value(value)
        .map(Some)
        .ok_or_else(|| AnnotationError::UnrecognizedBox {
          field: FIRST_BOUNDING_BOX,
          value: value.clone(),
        }),
    }
  }

  /// 按结构解析 `bounding_box` 字段
  pub fn bounding_boxes(&self) -> Result<Option<BoxLayout>, AnnotationError> {
    self.get(BOUNDING_BOX).map(BoxLayout::classify).transpose()
  }

  pub fn question_window(&self) -> Result<Option<QuestionWindow>, AnnotationError> {
    self
      .get(Q_WINDOW_FRAME)
      .map(QuestionWindow::from_value)
      .transpose()
  }

  /// 答案窗口列表，元素附带其在原列表中的序号（从 1 开始）
  ///
  /// 无法解析的元素会被跳过并记录日志，序号保持原位置不变。
  pub fn answer_windows(&self) -> Vec<(usize, AnswerWindow)> {
    let Some(value) = self.get(A_WINDOW_FRAME) else {
      return Vec::new();
    };
    let Some(items) = value.as_array() else {
      warn!("A_window_frame 不是列表, 已忽略: {}", value);
      return Vec::new();
    };

    items
      .iter()
      .enumerate()
      .filter_map(|(i, item)| match AnswerWindow::from_value(item) {
        Ok(window) => Some((i + 1, window)),
        Err(e) => {
          warn!("跳过无法解析的答案窗口 #{}: {}", i + 1, e);
          None
        }
      })
      .collect()
  }

  /// 外部 MOT 跟踪文件路径
  pub fn mot_file(&self) -> Option<&str> {
    self
      .get(TRACKING_BBOXES)
      .and_then(|t| t.get(MOT_FILE))
      .and_then(Value::as_str)
  }

  /// 调试信息中记录的原始帧路径
  pub fn debug_frame_path(&self) -> Option<&str> {
    self
      .get("_debug")
      .and_then(|d| d.get("frame_path"))
      .and_then(Value::as_str)
  }

  /// `first_bounding_box` 生效的帧：优先问题窗口起点，其次首个答案窗口起点，否则为 0
  pub fn anchor_frame(&self) -> u64 {
    match self.question_window() {
      Ok(Some(q)) => return q.start,
      Ok(None) => {}
      Err(e) => warn!("问题窗口无法解析: {}", e),
    }

    // 仅看列表中的第一个元素，与逐项跳过的 answer_windows 不同
    self
      .get(A_WINDOW_FRAME)
      .and_then(Value::as_array)
      .and_then(|items| items.first())
      .and_then(|first| AnswerWindow::from_value(first).ok())
      .map(|w| w.start())
      .unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn annotation(value: Value) -> Annotation {
    Annotation::try_from(value).unwrap()
  }

  #[test]
  fn rejects_non_object_records() {
    assert_eq!(
      Annotation::try_from(json!([1, 2])),
      Err(AnnotationError::NotAnObject)
    );
  }

  #[test]
  fn reviewed_and_retrack_default_to_false() {
    let mut ann = annotation(json!({"task_L2": "Counting"}));
    assert!(!ann.is_reviewed());
    assert!(!ann.needs_retrack());

    ann.set_reviewed(true);
    ann.mark_retrack();
    assert!(ann.is_reviewed());
    assert!(ann.needs_retrack());
  }

  #[test]
  fn anchor_frame_prefers_question_window() {
    let ann = annotation(json!({
      "Q_window_frame": [12, 40],
      "A_window_frame": ["5-9"],
    }));
    assert_eq!(ann.anchor_frame(), 12);
  }

  #[test]
  fn anchor_frame_falls_back_to_first_answer_window() {
    let ranged = annotation(json!({"A_window_frame": ["30-45", 50]}));
    assert_eq!(ranged.anchor_frame(), 30);

    let point = annotation(json!({"A_window_frame": [17]}));
    assert_eq!(point.anchor_frame(), 17);

    let empty = annotation(json!({}));
    assert_eq!(empty.anchor_frame(), 0);
  }

  #[test]
  fn answer_windows_keep_list_position_when_skipping() {
    let ann = annotation(json!({"A_window_frame": ["1-4", "oops", 9]}));
    let windows = ann.answer_windows();
    assert_eq!(
      windows,
      vec![(1, AnswerWindow::Range(1, 4)), (3, AnswerWindow::Point(9))]
    );
  }

  #[test]
  fn mot_file_is_read_from_tracking_bboxes() {
    let ann = annotation(json!({"tracking_bboxes": {"mot_file": "track/1.txt"}}));
    assert_eq!(ann.mot_file(), Some("track/1.txt"));
  }

  #[test]
  fn answer_text_joins_lists() {
    let ann = annotation(json!({"answer": ["left", "right"]}));
    assert_eq!(ann.answer_text().as_deref(), Some("left, right"));
  }
}
