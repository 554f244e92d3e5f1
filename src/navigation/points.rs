// 该文件是 Shanan （山南西风） 项目的一部分。
// src/navigation/points.rs - 关注帧查找
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

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::annotation::{Annotation, AnswerWindow};
use crate::navigation::mot::MotTrack;

/// 可跳转的帧
pub trait Waypoint {
  fn frame(&self) -> u64;
  fn label(&self) -> Option<&str> {
    None
  }
}

impl Waypoint for u64 {
  fn frame(&self) -> u64 {
    *self
  }
}

/// 带标签的关注帧，例如 `(120, "A1_BEGIN")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointOfInterest {
  pub frame: u64,
  pub label: String,
}

impl PointOfInterest {
  pub fn new(frame: u64, label: impl Into<String>) -> Self {
    Self {
      frame,
      label: label.into(),
    }
  }
}

impl Waypoint for PointOfInterest {
  fn frame(&self) -> u64 {
    self.frame
  }

  fn label(&self) -> Option<&str> {
    Some(&self.label)
  }
}

/// 边界框所在的帧：`first_bounding_box` 的锚定帧并上 MOT 文件中出现的帧，升序去重
pub fn bbox_frames(annotation: &Annotation, mot: Option<&MotTrack>) -> Vec<u64> {
  let mut frames = BTreeSet::new();
  if annotation.has_first_bounding_box() {
    frames.insert(annotation.anchor_frame());
  }
  if let Some(track) = mot {
    frames.extend(track.frames());
  }
  frames.into_iter().collect()
}

/// 窗口边界帧，按字段与列表的声明顺序排列（问题窗口在前），不按帧号排序
pub fn window_frames(annotation: &Annotation) -> Vec<PointOfInterest> {
  let mut points = Vec::new();

  match annotation.question_window() {
    Ok(Some(q)) => {
      points.push(PointOfInterest::new(q.start, "Q_BEGIN"));
      if !q.is_point() {
        points.push(PointOfInterest::new(q.end, "Q_END"));
      }
    }
    Ok(None) => {}
    Err(e) => warn!("忽略问题窗口: {}", e),
  }

  for (ordinal, window) in annotation.answer_windows() {
    match window {
      AnswerWindow::Range(start, end) => {
        points.push(PointOfInterest::new(start, format!("A{}_BEGIN", ordinal)));
        if start != end {
          points.push(PointOfInterest::new(end, format!("A{}_END", ordinal)));
        }
      }
      AnswerWindow::Point(frame) => {
        points.push(PointOfInterest::new(frame, format!("A{}_POINT", ordinal)));
      }
    }
  }

  points
}

/// 一条标注的全部关注帧
#[derive(Debug, Clone, Default)]
pub struct Waypoints {
  pub bbox: Vec<u64>,
  pub window: Vec<PointOfInterest>,
  pub mot: Option<MotTrack>,
}

/// 关注帧查找器，负责解析外部 MOT 文件路径
#[derive(Debug, Clone, Default)]
pub struct PointFinder {
  mot_root: Option<PathBuf>,
}

impl PointFinder {
  /// 相对的 MOT 路径将基于 `mot_root` 解析
  pub fn with_mot_root(mut self, root: Option<PathBuf>) -> Self {
    self.mot_root = root;
    self
  }

  fn resolve(&self, mot_file: &str) -> PathBuf {
    let path = Path::new(mot_file);
    match &self.mot_root {
      Some(root) if path.is_relative() => root.join(path),
      _ => path.to_path_buf(),
    }
  }

  /// 读取标注引用的 MOT 文件，缺失或损坏时返回 `None` 并记录日志
  pub fn load_mot(&self, annotation: &Annotation) -> Option<MotTrack> {
    let path = self.resolve(annotation.mot_file()?);
    match MotTrack::open(&path) {
      Ok(track) => Some(track),
      Err(e) => {
        warn!("无法读取 MOT 文件 {}: {}", path.display(), e);
        None
      }
    }
  }

  pub fn find(&self, annotation: &Annotation) -> Waypoints {
    let mot = self.load_mot(annotation);
    let bbox = bbox_frames(annotation, mot.as_ref());
    let window = window_frames(annotation);
    debug!("边界框帧: {:?}", bbox);
    debug!("窗口帧序列: {:?}", window);
    Waypoints { bbox, window, mot }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Value, json};
  use std::io::{Cursor, Write};

  fn annotation(value: Value) -> Annotation {
    Annotation::try_from(value).unwrap()
  }

  #[test]
  fn question_range_emits_begin_then_end() {
    let points = window_frames(&annotation(json!({"Q_window_frame": [30, 12]})));
    assert_eq!(
      points,
      vec![
        PointOfInterest::new(30, "Q_BEGIN"),
        PointOfInterest::new(12, "Q_END")
      ]
    );
  }

  #[test]
  fn point_question_window_emits_single_begin() {
    let points = window_frames(&annotation(json!({"Q_window_frame": [8, 8]})));
    assert_eq!(points, vec![PointOfInterest::new(8, "Q_BEGIN")]);
  }

  #[test]
  fn answer_windows_follow_declared_order() {
    let ann = annotation(json!({
      "Q_window_frame": [50, 60],
      "A_window_frame": ["90-95", 10, "3-3"],
    }));
    let labels: Vec<(u64, String)> = window_frames(&ann)
      .into_iter()
      .map(|p| (p.frame, p.label))
      .collect();
    assert_eq!(
      labels,
      vec![
        (50, "Q_BEGIN".to_string()),
        (60, "Q_END".to_string()),
        (90, "A1_BEGIN".to_string()),
        (95, "A1_END".to_string()),
        (10, "A2_POINT".to_string()),
        (3, "A3_BEGIN".to_string()),
      ]
    );
  }

  #[test]
  fn mot_only_annotation_yields_zero_based_frames() {
    let track = MotTrack::from_reader(Cursor::new("1,7,10,10,5,5\n2,7,12,10,5,5\n")).unwrap();
    let frames = bbox_frames(&annotation(json!({})), Some(&track));
    assert_eq!(frames, vec![0, 1]);
  }

  #[test]
  fn first_box_anchor_is_merged_and_sorted() {
    let track = MotTrack::from_reader(Cursor::new("3,1,0,0,1,1\n1,1,0,0,1,1\n")).unwrap();
    let ann = annotation(json!({
      "first_bounding_box": [0, 0, 5, 5],
      "A_window_frame": ["2-9"],
    }));
    assert_eq!(bbox_frames(&ann, Some(&track)), vec![0, 2]);
  }

  #[test]
  fn no_first_box_and_no_track_is_empty() {
    let ann = annotation(json!({"Q_window_frame": [1, 5]}));
    assert!(bbox_frames(&ann, None).is_empty());
  }

  #[test]
  fn finder_reads_mot_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("track.txt")).unwrap();
    writeln!(file, "5,1,0,0,10,10").unwrap();

    let finder = PointFinder::default().with_mot_root(Some(dir.path().to_path_buf()));
    let ann = annotation(json!({"tracking_bboxes": {"mot_file": "track.txt"}}));
    let waypoints = finder.find(&ann);
    assert_eq!(waypoints.bbox, vec![4]);
    assert!(waypoints.mot.is_some());
  }

  #[test]
  fn missing_mot_file_contributes_nothing() {
    let finder = PointFinder::default();
    let ann = annotation(json!({
      "first_bounding_box": [0, 0, 5, 5],
      "tracking_bboxes": {"mot_file": "/definitely/not/here.txt"},
    }));
    let waypoints = finder.find(&ann);
    assert_eq!(waypoints.bbox, vec![0]);
    assert!(waypoints.mot.is_none());
  }
}
