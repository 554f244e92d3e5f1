// 该文件是 Shanan （山南西风） 项目的一部分。
// src/edit.rs - 边界框编辑状态机
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

//! # 边界框编辑
//!
//! 编辑会话在 `INACTIVE` 与 `ACTIVE(target)` 之间切换：
//!
//! - 进入时按标注当前内容枚举可编辑目标，选中第一个；
//! - 每次切换目标前进一个，越过最后一个后自动退出；
//! - 拖拽结束时把矩形写入当前目标对应的字段，并置 `retrack = true`；
//! - 当前标注发生变化时会话被静默关闭，避免改错记录。

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::annotation::{Annotation, BBox, BOUNDING_BOX, BoxLayout, BoxSlot, FIRST_BOUNDING_BOX};
use crate::review::AnnotationKey;

/// 小于该尺寸（像素）的拖拽视为误触
pub const MIN_EDIT_SIZE: i64 = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
  #[error("当前标注没有可编辑的边界框")]
  NoEditableTargets,
  #[error("未处于编辑模式")]
  NotActive,
  #[error("编辑目标 {0} 已失效")]
  StaleTarget(String),
}

/// 视频坐标系中的点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
  pub x: i64,
  pub y: i64,
}

impl Point {
  pub fn new(x: i64, y: i64) -> Self {
    Self { x, y }
  }
}

/// 轴对齐矩形 [x1, y1, x2, y2]，保证 x1 <= x2、y1 <= y2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
  pub x1: i64,
  pub y1: i64,
  pub x2: i64,
  pub y2: i64,
}

impl Rect {
  pub fn from_corners(a: Point, b: Point) -> Self {
    Self {
      x1: a.x.min(b.x),
      y1: a.y.min(b.y),
      x2: a.x.max(b.x),
      y2: a.y.max(b.y),
    }
  }

  pub fn width(&self) -> i64 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> i64 {
    self.y2 - self.y1
  }

  pub fn is_too_small(&self) -> bool {
    self.width() < MIN_EDIT_SIZE || self.height() < MIN_EDIT_SIZE
  }

  pub fn to_value(&self) -> Value {
    json!([self.x1, self.y1, self.x2, self.y2])
  }
}

impl From<Rect> for BBox {
  fn from(rect: Rect) -> Self {
    BBox::new(rect.x1 as f64, rect.y1 as f64, rect.x2 as f64, rect.y2 as f64)
  }
}

/// 编辑目标指向的字段位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSlot {
  /// `first_bounding_box`
  First,
  /// 单框形态的 `bounding_box`
  Scalar,
  /// `bounding_box[i].box`
  Labeled(usize),
  /// `bounding_box[i]`
  Plain(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditTarget {
  pub slot: TargetSlot,
  pub label: String,
}

impl EditTarget {
  fn new(slot: TargetSlot) -> Self {
    let label = match slot {
      TargetSlot::First => FIRST_BOUNDING_BOX.to_string(),
      TargetSlot::Scalar => BOUNDING_BOX.to_string(),
      TargetSlot::Labeled(i) | TargetSlot::Plain(i) => format!("{}[{}]", BOUNDING_BOX, i),
    };
    Self { slot, label }
  }

  pub fn index(&self) -> Option<usize> {
    match self.slot {
      TargetSlot::Labeled(i) | TargetSlot::Plain(i) => Some(i),
      TargetSlot::First | TargetSlot::Scalar => None,
    }
  }
}

/// 按标注当前内容枚举可编辑目标：先 `first_bounding_box`，再 `bounding_box` 各项
pub fn editable_targets(annotation: &Annotation) -> Vec<EditTarget> {
  let mut targets = Vec::new();

  match annotation.first_bounding_box() {
    Ok(Some(_)) => targets.push(EditTarget::new(TargetSlot::First)),
    Ok(None) => {}
    Err(e) => warn!("不可编辑: {}", e),
  }

  match annotation.bounding_boxes() {
    Ok(Some(BoxLayout::Scalar(_))) => targets.push(EditTarget::new(TargetSlot::Scalar)),
    Ok(Some(BoxLayout::List(slots))) => {
      for (i, slot) in slots.iter().enumerate() {
        match slot {
          BoxSlot::Labeled { .. } => targets.push(EditTarget::new(TargetSlot::Labeled(i))),
          BoxSlot::Plain(_) => targets.push(EditTarget::new(TargetSlot::Plain(i))),
          BoxSlot::Unrecognized(value) => warn!("bounding_box[{}] 不可编辑: {}", i, value),
        }
      }
    }
    Ok(None) => {}
    Err(e) => warn!("不可编辑: {}", e),
  }

  targets
}

/// 把矩形写入目标字段并置 `retrack`，返回被修改字段的标签
///
/// 没有选中目标时依次退回到 `first_bounding_box`、`bounding_box` 的第一项，
/// 两者都没有则新建 `first_bounding_box`。
pub fn apply_rect(
  annotation: &mut Annotation,
  target: Option<&EditTarget>,
  rect: Rect,
) -> Result<String, EditError> {
  let target = match target {
    Some(target) => target.clone(),
    None => fallback_target(annotation),
  };

  let value = rect.to_value();
  match target.slot {
    TargetSlot::First => annotation.set(FIRST_BOUNDING_BOX, value),
    TargetSlot::Scalar => annotation.set(BOUNDING_BOX, value),
    TargetSlot::Labeled(i) => {
      let entry = annotation
        .fields_mut()
        .get_mut(BOUNDING_BOX)
        .and_then(|boxes| boxes.get_mut(i))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| EditError::StaleTarget(target.label.clone()))?;
      entry.insert("box".to_string(), value);
    }
    TargetSlot::Plain(i) => {
      let entry = annotation
        .fields_mut()
        .get_mut(BOUNDING_BOX)
        .and_then(|boxes| boxes.get_mut(i))
        .ok_or_else(|| EditError::StaleTarget(target.label.clone()))?;
      *entry = value;
    }
  }

  annotation.mark_retrack();
  Ok(target.label)
}

fn fallback_target(annotation: &Annotation) -> EditTarget {
  if annotation.has_first_bounding_box() {
    return EditTarget::new(TargetSlot::First);
  }
  let slot = match annotation.bounding_boxes() {
    Ok(Some(BoxLayout::Scalar(_))) => Some(TargetSlot::Scalar),
    Ok(Some(BoxLayout::List(slots))) => slots.iter().enumerate().find_map(|(i, slot)| match slot {
      BoxSlot::Labeled { .. } => Some(TargetSlot::Labeled(i)),
      BoxSlot::Plain(_) => Some(TargetSlot::Plain(i)),
      BoxSlot::Unrecognized(_) => None,
    }),
    Ok(None) | Err(_) => None,
  };
  EditTarget::new(slot.unwrap_or(TargetSlot::First))
}

/// 拖拽结束的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
  /// 不在编辑模式或没有起点
  Ignored,
  /// 矩形过小，已丢弃
  Discarded,
  Committed { label: String, rect: Rect },
}

#[derive(Debug, Clone)]
struct ActiveEdit {
  key: AnnotationKey,
  targets: Vec<EditTarget>,
  current: usize,
}

/// 编辑会话
#[derive(Debug, Clone, Default)]
pub struct EditSession {
  active: Option<ActiveEdit>,
  anchor: Option<Point>,
  preview: Option<Rect>,
}

impl EditSession {
  pub fn is_active(&self) -> bool {
    self.active.is_some()
  }

  pub fn is_active_for(&self, key: &AnnotationKey) -> bool {
    self.active.as_ref().is_some_and(|a| &a.key == key)
  }

  pub fn active_target(&self) -> Option<&EditTarget> {
    self.active.as_ref().map(|a| &a.targets[a.current])
  }

  pub fn targets(&self) -> &[EditTarget] {
    self.active.as_ref().map(|a| a.targets.as_slice()).unwrap_or(&[])
  }

  /// 拖拽中的预览矩形，仅供绘制
  pub fn preview(&self) -> Option<Rect> {
    self.preview
  }

  /// 进入编辑模式并选中第一个目标，调用方负责先停止播放
  pub fn enter(
    &mut self,
    key: AnnotationKey,
    annotation: &Annotation,
  ) -> Result<&EditTarget, EditError> {
    let targets = editable_targets(annotation);
    if targets.is_empty() {
      return Err(EditError::NoEditableTargets);
    }

    info!("进入边界框编辑模式, 共 {} 个目标", targets.len());
    self.clear_drag();
    let active = self.active.insert(ActiveEdit {
      key,
      targets,
      current: 0,
    });
    Ok(&active.targets[0])
  }

  /// 切换到下一个目标，越过最后一个时退出并返回 `None`
  pub fn advance_target(&mut self) -> Result<Option<&EditTarget>, EditError> {
    let active = self.active.as_mut().ok_or(EditError::NotActive)?;
    active.current += 1;
    if active.current >= active.targets.len() {
      self.exit();
      info!("退出边界框编辑模式");
      return Ok(None);
    }

    self.preview = None;
    Ok(self.active_target())
  }

  pub fn exit(&mut self) {
    self.active = None;
    self.clear_drag();
  }

  /// 当前标注变化时调用，会话不属于 `key` 则静默退出，返回是否发生了退出
  pub fn sync_to(&mut self, key: &AnnotationKey) -> bool {
    if self.active.is_some() && !self.is_active_for(key) {
      self.exit();
      return true;
    }
    false
  }

  fn clear_drag(&mut self) {
    self.anchor = None;
    self.preview = None;
  }

  pub fn begin_drag(&mut self, point: Point) -> bool {
    if !self.is_active() {
      return false;
    }
    self.anchor = Some(point);
    self.preview = None;
    true
  }

  pub fn update_drag(&mut self, point: Point) -> Option<Rect> {
    let anchor = self.anchor.filter(|_| self.is_active())?;
    let rect = Rect::from_corners(anchor, point);
    self.preview = Some(rect);
    Some(rect)
  }

  pub fn end_drag(
    &mut self,
    point: Point,
    annotation: &mut Annotation,
  ) -> Result<DragOutcome, EditError> {
    let Some(anchor) = self.anchor.filter(|_| self.is_active()) else {
      return Ok(DragOutcome::Ignored);
    };
    self.clear_drag();

    let rect = Rect::from_corners(anchor, point);
    if rect.is_too_small() {
      info!("边界框过小 ({}x{}), 已忽略", rect.width(), rect.height());
      return Ok(DragOutcome::Discarded);
    }

    let label = apply_rect(annotation, self.active_target(), rect)?;
    info!("已更新 {}: {:?}", label, rect);
    Ok(DragOutcome::Committed { label, rect })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_matches::assert_matches;
  use serde_json::json;
  use std::path::PathBuf;

  fn annotation(value: Value) -> Annotation {
    Annotation::try_from(value).unwrap()
  }

  fn key(index: usize) -> AnnotationKey {
    AnnotationKey::new(PathBuf::from("soccer/goal/clips/1.json"), index)
  }

  fn drag(session: &mut EditSession, ann: &mut Annotation, from: (i64, i64), to: (i64, i64)) -> DragOutcome {
    session.begin_drag(Point::new(from.0, from.1));
    session.update_drag(Point::new(to.0, to.1));
    session.end_drag(Point::new(to.0, to.1), ann).unwrap()
  }

  #[test]
  fn enumerates_first_box_then_labeled_entries() {
    let ann = annotation(json!({
      "first_bounding_box": [0, 0, 10, 10],
      "bounding_box": [{"label": "a", "box": [1, 1, 20, 20]}],
    }));
    let targets = editable_targets(&ann);
    assert_eq!(
      targets.iter().map(|t| t.slot).collect::<Vec<_>>(),
      vec![TargetSlot::First, TargetSlot::Labeled(0)]
    );
    assert_eq!(targets[1].label, "bounding_box[0]");
  }

  #[test]
  fn unrecognized_entries_are_not_editable() {
    let ann = annotation(json!({
      "first_bounding_box": "bad",
      "bounding_box": [[0, 0, 1, 1], "bad", {"label": "x"}],
    }));
    let targets = editable_targets(&ann);
    assert_eq!(targets, vec![EditTarget::new(TargetSlot::Plain(0))]);
  }

  #[test]
  fn entering_without_targets_fails_without_state_change() {
    let mut session = EditSession::default();
    let ann = annotation(json!({"question": "who?"}));
    assert_eq!(session.enter(key(0), &ann).unwrap_err(), EditError::NoEditableTargets);
    assert!(!session.is_active());
  }

  #[test]
  fn cycles_through_targets_then_exits() {
    let mut session = EditSession::default();
    let ann = annotation(json!({
      "first_bounding_box": [0, 0, 10, 10],
      "bounding_box": [[0, 0, 5, 5], {"box": [1, 1, 2, 2]}],
    }));

    assert_eq!(session.enter(key(0), &ann).unwrap().slot, TargetSlot::First);
    assert_eq!(
      session.advance_target().unwrap().map(|t| t.slot),
      Some(TargetSlot::Plain(0))
    );
    assert_eq!(
      session.advance_target().unwrap().map(|t| t.slot),
      Some(TargetSlot::Labeled(1))
    );
    assert_eq!(session.advance_target().unwrap(), None);
    assert!(!session.is_active());
    assert!(session.targets().is_empty());
    assert_eq!(session.advance_target().unwrap_err(), EditError::NotActive);
  }

  #[test]
  fn reentering_reflects_current_fields() {
    let mut session = EditSession::default();
    let mut ann = annotation(json!({"first_bounding_box": [0, 0, 10, 10]}));
    session.enter(key(0), &ann).unwrap();
    assert_eq!(session.targets().len(), 1);

    ann.set("bounding_box", json!([5, 5, 50, 50]));
    session.enter(key(0), &ann).unwrap();
    assert_eq!(session.targets().len(), 2);
    assert_eq!(session.targets()[1].slot, TargetSlot::Scalar);
  }

  #[test]
  fn scalar_box_is_overwritten_and_flagged() {
    let mut session = EditSession::default();
    let mut ann = annotation(json!({"bounding_box": [1, 2, 3, 4]}));
    session.enter(key(0), &ann).unwrap();
    assert_eq!(session.active_target().unwrap().slot, TargetSlot::Scalar);

    let outcome = drag(&mut session, &mut ann, (50, 60), (10, 20));
    assert_eq!(
      outcome,
      DragOutcome::Committed {
        label: "bounding_box".into(),
        rect: Rect { x1: 10, y1: 20, x2: 50, y2: 60 }
      }
    );
    assert_eq!(ann.get("bounding_box"), Some(&json!([10, 20, 50, 60])));
    assert!(ann.needs_retrack());
  }

  #[test]
  fn small_rectangles_are_discarded() {
    let mut session = EditSession::default();
    let original = annotation(json!({"bounding_box": [1, 2, 3, 4]}));
    let mut ann = original.clone();
    session.enter(key(0), &ann).unwrap();

    let outcome = drag(&mut session, &mut ann, (10, 10), (15, 80));
    assert_eq!(outcome, DragOutcome::Discarded);
    assert_eq!(ann, original);
    assert_eq!(session.preview(), None);
    assert_eq!(
      session.end_drag(Point::new(90, 90), &mut ann).unwrap(),
      DragOutcome::Ignored
    );
  }

  #[test]
  fn labeled_and_plain_entries_are_written_in_place() {
    let mut session = EditSession::default();
    let mut ann = annotation(json!({
      "bounding_box": [{"label": "a", "box": [0, 0, 1, 1]}, [0, 0, 1, 1]],
    }));
    session.enter(key(0), &ann).unwrap();
    drag(&mut session, &mut ann, (0, 0), (30, 30));
    session.advance_target().unwrap();
    drag(&mut session, &mut ann, (5, 5), (40, 45));

    assert_eq!(
      ann.get("bounding_box"),
      Some(&json!([{"label": "a", "box": [0, 0, 30, 30]}, [5, 5, 40, 45]]))
    );
  }

  #[test]
  fn stale_target_is_reported_without_retrack() {
    let mut session = EditSession::default();
    let mut ann = annotation(json!({"bounding_box": [[0, 0, 1, 1], [0, 0, 2, 2]]}));
    session.enter(key(0), &ann).unwrap();
    session.advance_target().unwrap();

    ann.set("bounding_box", json!([[0, 0, 1, 1]]));
    session.begin_drag(Point::new(0, 0));
    assert_matches!(
      session.end_drag(Point::new(50, 50), &mut ann),
      Err(EditError::StaleTarget(_))
    );
    assert!(!ann.needs_retrack());
  }

  #[test]
  fn drags_outside_edit_mode_are_ignored() {
    let mut session = EditSession::default();
    let mut ann = annotation(json!({"bounding_box": [1, 2, 3, 4]}));
    assert!(!session.begin_drag(Point::new(0, 0)));
    assert_eq!(session.update_drag(Point::new(50, 50)), None);
    assert_eq!(
      session.end_drag(Point::new(50, 50), &mut ann).unwrap(),
      DragOutcome::Ignored
    );
  }

  #[test]
  fn navigation_away_exits_silently() {
    let mut session = EditSession::default();
    let ann = annotation(json!({"bounding_box": [1, 2, 3, 4]}));
    session.enter(key(0), &ann).unwrap();
    session.begin_drag(Point::new(1, 1));

    assert!(!session.sync_to(&key(0)));
    assert!(session.is_active());
    assert!(session.sync_to(&key(1)));
    assert!(!session.is_active());
    assert_eq!(session.update_drag(Point::new(40, 40)), None);
  }

  #[test]
  fn fallback_prefers_first_box_then_first_list_entry() {
    let rect = Rect { x1: 0, y1: 0, x2: 20, y2: 20 };

    let mut with_first = annotation(json!({"first_bounding_box": [1, 1, 2, 2], "bounding_box": [[1, 1, 2, 2]]}));
    assert_eq!(apply_rect(&mut with_first, None, rect).unwrap(), "first_bounding_box");

    let mut dict_list = annotation(json!({"bounding_box": [{"box": [1, 1, 2, 2]}]}));
    assert_eq!(apply_rect(&mut dict_list, None, rect).unwrap(), "bounding_box[0]");
    assert_eq!(dict_list.get("bounding_box"), Some(&json!([{"box": [0, 0, 20, 20]}])));

    let mut empty = annotation(json!({}));
    assert_eq!(apply_rect(&mut empty, None, rect).unwrap(), "first_bounding_box");
    assert_eq!(empty.get("first_bounding_box"), Some(&json!([0, 0, 20, 20])));
    assert!(empty.needs_retrack());
  }

  #[test]
  fn fallback_writes_scalar_box_whole() {
    let rect = Rect { x1: 10, y1: 20, x2: 50, y2: 60 };

    let mut scalar = annotation(json!({"bounding_box": [1, 2, 3, 4]}));
    assert_eq!(apply_rect(&mut scalar, None, rect).unwrap(), "bounding_box");
    assert_eq!(scalar.get("bounding_box"), Some(&json!([10, 20, 50, 60])));
    assert!(scalar.needs_retrack());

    let mut skips_unrecognized = annotation(json!({"bounding_box": ["x", [1, 1, 2, 2]]}));
    assert_eq!(apply_rect(&mut skips_unrecognized, None, rect).unwrap(), "bounding_box[1]");
    assert_eq!(
      skips_unrecognized.get("bounding_box"),
      Some(&json!(["x", [10, 20, 50, 60]]))
    );
  }
}
