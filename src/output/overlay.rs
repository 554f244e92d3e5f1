// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/overlay.rs - 叠加层组合
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

//! 叠加层只描述几何与文字，像素由渲染器负责。

use tracing::warn;

use crate::annotation::{Annotation, BBox};
use crate::edit::Rect;
use crate::navigation::MotTrack;

// RGB
pub const BOX_COLOR: [u8; 3] = [255, 255, 0];
pub const FIRST_BOX_COLOR: [u8; 3] = [0, 0, 255];
pub const MOT_COLOR: [u8; 3] = [0, 255, 255];
pub const PREVIEW_COLOR: [u8; 3] = [0, 255, 255];
pub const BEGIN_COLOR: [u8; 3] = [0, 255, 0];
pub const END_COLOR: [u8; 3] = [255, 0, 0];

pub const FIRST_BOX_LABEL: &str = "Tracked Object";
pub const PREVIEW_LABEL: &str = "EDITING...";

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
  pub bbox: BBox,
  pub label: String,
  pub color: [u8; 3],
}

impl OverlayBox {
  fn new(bbox: BBox, label: impl Into<String>, color: [u8; 3]) -> Self {
    Self {
      bbox,
      label: label.into(),
      color,
    }
  }
}

/// 左上角的窗口提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMarker {
  pub text: String,
  pub color: [u8; 3],
}

impl WindowMarker {
  /// 由导航标签生成，`BEGIN`/`POINT` 为绿色，`END` 为红色
  pub fn from_label(label: &str) -> Option<Self> {
    let color = if label.contains("BEGIN") || label.contains("POINT") {
      BEGIN_COLOR
    } else if label.contains("END") {
      END_COLOR
    } else {
      return None;
    };
    Some(Self {
      text: label.replace('_', " "),
      color,
    })
  }
}

/// 叠加层需要的会话状态
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayContext<'a> {
  pub mot: Option<&'a MotTrack>,
  /// 拖拽中的预览矩形
  pub preview: Option<Rect>,
  /// 窗口导航暂停时当前所在的标签
  pub window_label: Option<&'a str>,
  /// 单帧模式下不显示窗口提示
  pub show_window_marker: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
  pub frame: u64,
  pub boxes: Vec<OverlayBox>,
  pub marker: Option<WindowMarker>,
}

impl Overlay {
  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty() && self.marker.is_none()
  }

  /// 由标注与会话状态组合出第 `frame` 帧的叠加层
  pub fn compose(annotation: &Annotation, frame: u64, context: &OverlayContext<'_>) -> Self {
    let mut boxes = Vec::new();

    match annotation.bounding_boxes() {
      Ok(Some(layout)) => boxes.extend(
        layout
          .labeled_boxes()
          .into_iter()
          .map(|(label, bbox)| OverlayBox::new(bbox, label, BOX_COLOR)),
      ),
      Ok(None) => {}
      Err(e) => warn!("跳过无法识别的边界框: {}", e),
    }

    match annotation.first_bounding_box() {
      Ok(Some(bbox)) => boxes.push(OverlayBox::new(bbox, FIRST_BOX_LABEL, FIRST_BOX_COLOR)),
      Ok(None) => {}
      Err(e) => warn!("跳过无法识别的边界框: {}", e),
    }

    if let Some(track) = context.mot {
      boxes.extend(track.detections_at(frame).map(|d| {
        OverlayBox::new(d.bbox(), format!("ID:{}", d.track_id), MOT_COLOR)
      }));
    }

    if let Some(rect) = context.preview {
      boxes.push(OverlayBox::new(rect.into(), PREVIEW_LABEL, PREVIEW_COLOR));
    }

    let marker = if context.show_window_marker {
      window_marker(annotation, frame, context.window_label)
    } else {
      None
    };

    Self {
      frame,
      boxes,
      marker,
    }
  }

  /// 每个元素一行的文字描述
  pub fn describe(&self) -> Vec<String> {
    let mut lines: Vec<String> = self
      .boxes
      .iter()
      .map(|b| {
        format!(
          "{}, {:.0}, {:.0}, {:.0}, {:.0}",
          b.label, b.bbox.x1, b.bbox.y1, b.bbox.x2, b.bbox.y2
        )
      })
      .collect();
    if let Some(marker) = &self.marker {
      lines.push(format!("marker, {}", marker.text));
    }
    lines
  }
}

fn window_marker(annotation: &Annotation, frame: u64, label: Option<&str>) -> Option<WindowMarker> {
  if let Some(label) = label {
    return WindowMarker::from_label(label);
  }

  let window = annotation.question_window().ok().flatten()?;
  if frame == window.start {
    WindowMarker::from_label("Q_BEGIN")
  } else if frame == window.end {
    WindowMarker::from_label("Q_END")
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::edit::Point;
  use serde_json::json;
  use std::io::Cursor;

  fn annotation(value: serde_json::Value) -> Annotation {
    Annotation::try_from(value).unwrap()
  }

  #[test]
  fn composes_boxes_in_draw_order() {
    let ann = annotation(json!({
      "bounding_box": [{"label": "ball", "box": [1, 1, 20, 20]}, [5, 5, 30, 30]],
      "first_bounding_box": [0, 0, 10, 10],
    }));
    let overlay = Overlay::compose(&ann, 0, &OverlayContext::default());
    let labels: Vec<&str> = overlay.boxes.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["ball", "Object 2", "Tracked Object"]);
    assert_eq!(overlay.boxes[2].color, FIRST_BOX_COLOR);
    assert!(overlay.marker.is_none());
  }

  #[test]
  fn mot_boxes_follow_one_based_frames() {
    let track = MotTrack::from_reader(Cursor::new("1,7,10,10,5,5\n2,8,12,10,5,5\n")).unwrap();
    let ann = annotation(json!({}));
    let context = OverlayContext {
      mot: Some(&track),
      ..OverlayContext::default()
    };

    let overlay = Overlay::compose(&ann, 1, &context);
    assert_eq!(overlay.boxes.len(), 1);
    assert_eq!(overlay.boxes[0].label, "ID:8");
    assert_eq!(overlay.boxes[0].bbox, BBox::new(12.0, 10.0, 17.0, 15.0));
  }

  #[test]
  fn preview_is_labelled_editing() {
    let ann = annotation(json!({}));
    let context = OverlayContext {
      preview: Some(Rect::from_corners(Point::new(40, 40), Point::new(10, 10))),
      ..OverlayContext::default()
    };
    let overlay = Overlay::compose(&ann, 0, &context);
    assert_eq!(overlay.describe(), vec!["EDITING..., 10, 10, 40, 40"]);
  }

  #[test]
  fn window_marker_prefers_navigation_label() {
    let ann = annotation(json!({"Q_window_frame": [5, 9]}));
    let mut context = OverlayContext {
      show_window_marker: true,
      ..OverlayContext::default()
    };

    let begin = Overlay::compose(&ann, 5, &context).marker.unwrap();
    assert_eq!((begin.text.as_str(), begin.color), ("Q BEGIN", BEGIN_COLOR));
    let end = Overlay::compose(&ann, 9, &context).marker.unwrap();
    assert_eq!((end.text.as_str(), end.color), ("Q END", END_COLOR));
    assert!(Overlay::compose(&ann, 7, &context).marker.is_none());

    context.window_label = Some("A2_END");
    let nav = Overlay::compose(&ann, 5, &context).marker.unwrap();
    assert_eq!((nav.text.as_str(), nav.color), ("A2 END", END_COLOR));

    context.show_window_marker = false;
    assert!(Overlay::compose(&ann, 5, &context).marker.is_none());
  }
}
