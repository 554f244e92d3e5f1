// 该文件是 Shanan （山南西风） 项目的一部分。
// src/dataset.rs - 数据集目录结构
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

//! # 数据集
//!
//! 三个根目录共用同一套相对路径 `<sport>/<event>/<clips|frames>/<id>`：
//!
//! - 输出目录保存待审查的 `<id>.json`；
//! - 数据目录保存媒体文件，片段为视频或抽帧目录，单帧为图片；
//! - 旧数据目录保存只读的历史标注。

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::annotation::Annotation;
use crate::review::{ReviewError, store};

pub const DEFAULT_OUTPUT_ROOT: &str = "../output";
pub const DEFAULT_DATASET_ROOT: &str = "../Dataset";
pub const DEFAULT_LEGACY_ROOT: &str = "../../data/output";

pub const CLIP_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];
pub const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 带任务过滤时使用的默认任务集合
pub const DEFAULT_FILTERED_TASKS: [&str; 2] =
  ["Spatial_Temporal_Grounding", "Continuous_Actions_Caption"];

/// 未审核标注的过滤条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
  tasks: Option<HashSet<String>>,
}

impl TaskFilter {
  /// 不限任务
  pub fn any() -> Self {
    Self::default()
  }

  pub fn only<I, S>(tasks: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      tasks: Some(tasks.into_iter().map(Into::into).collect()),
    }
  }

  pub fn default_tasks() -> Self {
    Self::only(DEFAULT_FILTERED_TASKS)
  }

  /// 未审核，且在指定了任务集合时 `task_L2` 属于该集合
  pub fn matches(&self, annotation: &Annotation) -> bool {
    if let Some(tasks) = &self.tasks {
      match annotation.task_l2() {
        Some(task) if tasks.contains(task) => {}
        _ => return false,
      }
    }
    !annotation.is_reviewed()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
  Clips,
  Frames,
}

impl MediaKind {
  pub fn dir_name(self) -> &'static str {
    match self {
      MediaKind::Clips => "clips",
      MediaKind::Frames => "frames",
    }
  }

  pub fn other(self) -> Self {
    match self {
      MediaKind::Clips => MediaKind::Frames,
      MediaKind::Frames => MediaKind::Clips,
    }
  }
}

impl fmt::Display for MediaKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.dir_name())
  }
}

impl FromStr for MediaKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "clips" => Ok(MediaKind::Clips),
      "frames" => Ok(MediaKind::Frames),
      other => Err(format!("未知的数据类型: {}", other)),
    }
  }
}

/// 一个待审查单元
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitKey {
  pub sport: String,
  pub event: String,
  pub kind: MediaKind,
  pub id: String,
}

impl UnitKey {
  pub fn new(sport: &str, event: &str, kind: MediaKind, id: &str) -> Self {
    Self {
      sport: sport.to_string(),
      event: event.to_string(),
      kind,
      id: id.to_string(),
    }
  }

  /// 解析 `sport/event`
  pub fn from_event(event: &str, kind: MediaKind, id: &str) -> Option<Self> {
    let (sport, event) = event.split_once('/')?;
    Some(Self::new(sport, event, kind, id))
  }

  fn type_dir(&self, root: &Path) -> PathBuf {
    root
      .join(&self.sport)
      .join(&self.event)
      .join(self.kind.dir_name())
  }
}

impl fmt::Display for UnitKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}/{}", self.sport, self.event, self.kind, self.id)
  }
}

/// 单元对应的媒体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
  /// 视频容器，本 crate 不解码
  Video(PathBuf),
  /// 抽帧目录，按文件名顺序作为片段播放
  FrameDirectory(PathBuf),
  Image(PathBuf),
}

impl Media {
  pub fn path(&self) -> &Path {
    match self {
      Media::Video(p) | Media::FrameDirectory(p) | Media::Image(p) => p,
    }
  }
}

/// 纯数字 ID 按数值排在前面，其余按字典序
pub(crate) fn compare_ids(a: &str, b: &str) -> Ordering {
  let numeric = |s: &str| {
    if !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit()) {
      s.parse::<u128>().ok()
    } else {
      None
    }
  };
  match (numeric(a), numeric(b)) {
    (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => a.cmp(b),
  }
}

fn sub_dirs(path: &Path) -> Vec<String> {
  let Ok(entries) = fs::read_dir(path) else {
    return Vec::new();
  };
  let mut names: Vec<String> = entries
    .filter_map(Result::ok)
    .filter(|e| e.path().is_dir())
    .filter_map(|e| e.file_name().to_str().map(str::to_string))
    .collect();
  names.sort();
  names
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
  pub output_root: PathBuf,
  pub dataset_root: PathBuf,
  pub legacy_root: PathBuf,
}

impl Default for Dataset {
  fn default() -> Self {
    Self::new(DEFAULT_OUTPUT_ROOT, DEFAULT_DATASET_ROOT, DEFAULT_LEGACY_ROOT)
  }
}

impl Dataset {
  pub fn new(
    output_root: impl Into<PathBuf>,
    dataset_root: impl Into<PathBuf>,
    legacy_root: impl Into<PathBuf>,
  ) -> Self {
    Self {
      output_root: output_root.into(),
      dataset_root: dataset_root.into(),
      legacy_root: legacy_root.into(),
    }
  }

  /// 输出目录下所有 `sport/event`
  pub fn events(&self) -> Vec<String> {
    sub_dirs(&self.output_root)
      .into_iter()
      .flat_map(|sport| {
        sub_dirs(&self.output_root.join(&sport))
          .into_iter()
          .map(move |event| format!("{}/{}", sport, event))
      })
      .collect()
  }

  /// 某事件某类型下全部标注文件的 ID
  pub fn ids(&self, event: &str, kind: MediaKind) -> Vec<String> {
    let Some(probe) = UnitKey::from_event(event, kind, "") else {
      return Vec::new();
    };
    let Ok(entries) = fs::read_dir(probe.type_dir(&self.output_root)) else {
      return Vec::new();
    };

    let mut ids: Vec<String> = entries
      .filter_map(Result::ok)
      .map(|e| e.path())
      .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
      .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
      .collect();
    ids.sort_by(|a, b| compare_ids(a, b));
    ids
  }

  pub fn json_path(&self, unit: &UnitKey) -> PathBuf {
    unit
      .type_dir(&self.output_root)
      .join(format!("{}.json", unit.id))
  }

  pub fn legacy_path(&self, unit: &UnitKey) -> PathBuf {
    unit
      .type_dir(&self.legacy_root)
      .join(format!("{}.json", unit.id))
  }

  /// 查找单元的媒体文件
  ///
  /// 单帧模式下找不到图片时，退回到第一条标注 `_debug.frame_path` 记录的路径。
  pub fn media(&self, unit: &UnitKey, annotations: &[Annotation]) -> Result<Media, ReviewError> {
    let dir = unit.type_dir(&self.dataset_root);
    match unit.kind {
      MediaKind::Clips => {
        if let Some(path) = find_with_extension(&dir, &unit.id, &CLIP_EXTENSIONS) {
          return Ok(Media::Video(path));
        }
        let frames = dir.join(&unit.id);
        if frames.is_dir() {
          return Ok(Media::FrameDirectory(frames));
        }
      }
      MediaKind::Frames => {
        if let Some(path) = find_with_extension(&dir, &unit.id, &FRAME_EXTENSIONS) {
          return Ok(Media::Image(path));
        }
        if let Some(debug) = annotations.first().and_then(Annotation::debug_frame_path) {
          let path = PathBuf::from(debug);
          if path.is_file() {
            debug!("使用调试记录中的帧路径: {}", path.display());
            return Ok(Media::Image(path));
          }
        }
      }
    }
    Err(ReviewError::NotFound(dir.join(&unit.id)))
  }

  /// 按事件顺序排列的全部单元，每个事件先列首选类型再列另一类型
  pub fn ordered_units(&self, preferred: MediaKind) -> Vec<UnitKey> {
    let mut units = Vec::new();
    for event in self.events() {
      for kind in [preferred, preferred.other()] {
        for id in self.ids(&event, kind) {
          if let Some(unit) = UnitKey::from_event(&event, kind, &id) {
            units.push(unit);
          }
        }
      }
    }
    units
  }

  /// 从 `current` 之后循环查找下一个含有满足过滤条件标注的单元
  pub fn next_unreviewed(
    &self,
    current: Option<&UnitKey>,
    preferred: MediaKind,
    filter: &TaskFilter,
  ) -> Option<UnitKey> {
    let units = self.ordered_units(preferred);
    if units.is_empty() {
      return None;
    }

    let start = current
      .and_then(|c| units.iter().position(|u| u == c))
      .map(|i| i + 1)
      .unwrap_or(0);

    (0..units.len())
      .map(|i| &units[(start + i) % units.len()])
      .find(|unit| match store::read_annotations(&self.json_path(unit)) {
        Ok(annotations) => annotations.iter().any(|a| filter.matches(a)),
        Err(e) => {
          warn!("跳过无法读取的文件 {}: {}", unit, e);
          false
        }
      })
      .cloned()
  }
}

fn find_with_extension(dir: &Path, id: &str, extensions: &[&str]) -> Option<PathBuf> {
  extensions
    .iter()
    .map(|ext| dir.join(format!("{}.{}", id, ext)))
    .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Value, json};

  fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
  }

  fn write_unit(root: &Path, rel: &str, annotations: Value) {
    write(
      &root.join(rel),
      &json!({"annotations": annotations}).to_string(),
    );
  }

  #[test]
  fn task_filter_requires_unreviewed() {
    let unreviewed = Annotation::try_from(json!({"task_L2": "Counting"})).unwrap();
    let reviewed = Annotation::try_from(json!({"task_L2": "Counting", "reviewed": true})).unwrap();
    let grounding = Annotation::try_from(json!({"task_L2": "Spatial_Temporal_Grounding"})).unwrap();

    assert!(TaskFilter::any().matches(&unreviewed));
    assert!(!TaskFilter::any().matches(&reviewed));
    assert!(!TaskFilter::default_tasks().matches(&unreviewed));
    assert!(TaskFilter::default_tasks().matches(&grounding));
  }

  #[test]
  fn ids_sort_numeric_first() {
    let dir = tempfile::tempdir().unwrap();
    for id in ["10", "2", "b", "a", "1"] {
      write_unit(dir.path(), &format!("soccer/final/clips/{}.json", id), json!([]));
    }
    write(&dir.path().join("soccer/final/clips/notes.txt"), "");

    let dataset = Dataset::new(dir.path(), dir.path(), dir.path());
    assert_eq!(dataset.events(), vec!["soccer/final".to_string()]);
    assert_eq!(
      dataset.ids("soccer/final", MediaKind::Clips),
      vec!["1", "2", "10", "a", "b"]
    );
    assert!(dataset.ids("soccer/final", MediaKind::Frames).is_empty());
  }

  #[test]
  fn media_lookup_tries_extensions_then_fallbacks() {
    let out = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let dataset = Dataset::new(out.path(), data.path(), out.path());

    let clip = UnitKey::new("soccer", "final", MediaKind::Clips, "3");
    assert!(matches!(dataset.media(&clip, &[]), Err(ReviewError::NotFound(_))));

    fs::create_dir_all(data.path().join("soccer/final/clips/3")).unwrap();
    assert!(matches!(dataset.media(&clip, &[]), Ok(Media::FrameDirectory(_))));

    write(&data.path().join("soccer/final/clips/3.mov"), "");
    assert!(matches!(dataset.media(&clip, &[]), Ok(Media::Video(p)) if p.ends_with("3.mov")));

    let frame = UnitKey::new("soccer", "final", MediaKind::Frames, "7");
    let debug_image = data.path().join("elsewhere.png");
    write(&debug_image, "");
    let annotations = vec![
      Annotation::try_from(json!({"_debug": {"frame_path": debug_image.to_str().unwrap()}})).unwrap(),
    ];
    assert_eq!(dataset.media(&frame, &annotations).unwrap(), Media::Image(debug_image));
  }

  #[test]
  fn next_unreviewed_wraps_and_prefers_kind() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_unit(root, "a/e1/clips/1.json", json!([{"reviewed": false}]));
    write_unit(root, "a/e1/clips/2.json", json!([{"reviewed": true}]));
    write_unit(root, "a/e1/frames/1.json", json!([{"task_L2": "Continuous_Actions_Caption"}]));
    write(&root.join("a/e1/clips/3.json"), "{ broken");

    let dataset = Dataset::new(root, root, root);
    let first = UnitKey::new("a", "e1", MediaKind::Clips, "1");
    let frame = UnitKey::new("a", "e1", MediaKind::Frames, "1");

    assert_eq!(
      dataset.next_unreviewed(Some(&first), MediaKind::Clips, &TaskFilter::any()),
      Some(frame.clone())
    );
    assert_eq!(
      dataset.next_unreviewed(Some(&frame), MediaKind::Clips, &TaskFilter::any()),
      Some(first.clone())
    );
    assert_eq!(
      dataset.next_unreviewed(None, MediaKind::Clips, &TaskFilter::default_tasks()),
      Some(frame)
    );
  }

  #[test]
  fn paths_mirror_relative_layout() {
    let dataset = Dataset::new("/out", "/data", "/old");
    let unit = UnitKey::new("tennis", "open", MediaKind::Frames, "12");
    assert_eq!(dataset.json_path(&unit), PathBuf::from("/out/tennis/open/frames/12.json"));
    assert_eq!(dataset.legacy_path(&unit), PathBuf::from("/old/tennis/open/frames/12.json"));
    assert_eq!(unit.to_string(), "tennis/open/frames/12");
  }
}
