// 该文件是 Shanan （山南西风） 项目的一部分。
// src/review.rs - 审查集合
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

use std::fmt::Display;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::annotation::{Annotation, AnnotationError};
use crate::dataset::TaskFilter;
use crate::edit::EditError;
use crate::input::InputError;

pub mod store;

#[derive(Error, Debug)]
pub enum ReviewError {
  #[error("文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("标注格式错误: {0}")]
  Schema(#[from] AnnotationError),
  #[error("当前标注没有可编辑的边界框")]
  NoEditableTargets,
  #[error("编辑失败: {0}")]
  Edit(EditError),
  #[error("外部文件格式错误 {path}: {reason}")]
  MalformedExternalFile { path: PathBuf, reason: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧输入错误: {0}")]
  Input(#[from] InputError),
  #[error("当前没有可用的标注")]
  Empty,
}

impl ReviewError {
  pub fn malformed(path: &Path, reason: impl Display) -> Self {
    ReviewError::MalformedExternalFile {
      path: path.to_path_buf(),
      reason: reason.to_string(),
    }
  }
}

impl From<EditError> for ReviewError {
  fn from(err: EditError) -> Self {
    match err {
      EditError::NoEditableTargets => ReviewError::NoEditableTargets,
      other => ReviewError::Edit(other),
    }
  }
}

/// 标注在数据集中的位置：所在文件与下标
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnotationKey {
  pub file: PathBuf,
  pub index: usize,
}

impl AnnotationKey {
  pub fn new(file: PathBuf, index: usize) -> Self {
    Self { file, index }
  }
}

/// 一个标注文件在内存中的全部标注及当前下标
#[derive(Debug, Clone)]
pub struct ReviewSet {
  path: PathBuf,
  annotations: Vec<Annotation>,
  index: usize,
}

impl ReviewSet {
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, ReviewError> {
    let path = path.into();
    let annotations = store::read_annotations(&path)?;
    info!("已加载 {} 条标注: {}", annotations.len(), path.display());
    Ok(Self {
      path,
      annotations,
      index: 0,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn len(&self) -> usize {
    self.annotations.len()
  }

  pub fn is_empty(&self) -> bool {
    self.annotations.is_empty()
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn annotations(&self) -> &[Annotation] {
    &self.annotations
  }

  pub fn key(&self) -> AnnotationKey {
    AnnotationKey::new(self.path.clone(), self.index)
  }

  pub fn current(&self) -> Option<&Annotation> {
    self.annotations.get(self.index)
  }

  pub fn current_mut(&mut self) -> Option<&mut Annotation> {
    self.annotations.get_mut(self.index)
  }

  /// 下一条，已是最后一条时不动并返回 `false`
  pub fn next(&mut self) -> bool {
    if self.index + 1 < self.annotations.len() {
      self.index += 1;
      return true;
    }
    false
  }

  pub fn prev(&mut self) -> bool {
    if self.index > 0 && !self.annotations.is_empty() {
      self.index -= 1;
      return true;
    }
    false
  }

  pub fn select(&mut self, index: usize) -> bool {
    if index < self.annotations.len() {
      self.index = index;
      return true;
    }
    false
  }

  pub fn mark_reviewed(&mut self) -> Result<(), ReviewError> {
    self.current_mut().ok_or(ReviewError::Empty)?.set_reviewed(true);
    Ok(())
  }

  /// 第一条满足过滤条件（未审核且任务匹配）的标注
  pub fn first_matching(&self, filter: &TaskFilter) -> Option<usize> {
    self.annotations.iter().position(|a| filter.matches(a))
  }

  pub fn save(&self) -> Result<(), ReviewError> {
    store::replace_annotations(&self.path, &self.annotations)?;
    info!("已保存: {}", self.path.display());
    Ok(())
  }

  /// 重新读取磁盘内容，尽量保留当前下标
  pub fn reload(&mut self) -> Result<(), ReviewError> {
    let annotations = store::read_annotations(&self.path)?;
    self.annotations = annotations;
    if self.index >= self.annotations.len() {
      self.index = 0;
    }
    Ok(())
  }

  /// 删除当前标注，立即保存并重新加载
  pub fn delete_current(&mut self) -> Result<Annotation, ReviewError> {
    if self.index >= self.annotations.len() {
      return Err(ReviewError::Empty);
    }
    let removed = self.annotations.remove(self.index);
    self.save()?;
    self.reload()?;
    self.index = self.index.min(self.annotations.len().saturating_sub(1));
    Ok(removed)
  }

  /// 用新内容整体替换当前标注
  pub fn replace_current(&mut self, annotation: Annotation) -> Result<Annotation, ReviewError> {
    let slot = self.current_mut().ok_or(ReviewError::Empty)?;
    Ok(std::mem::replace(slot, annotation))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Value, json};
  use std::fs;

  fn write_set(dir: &Path, annotations: Value) -> PathBuf {
    let path = dir.join("3.json");
    fs::write(&path, json!({"clip": "3.mp4", "annotations": annotations}).to_string()).unwrap();
    path
  }

  #[test]
  fn navigation_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_set(dir.path(), json!([{"a": 1}, {"a": 2}]));
    let mut set = ReviewSet::load(&path).unwrap();

    assert!(!set.prev());
    assert!(set.next());
    assert!(!set.next());
    assert_eq!(set.index(), 1);
    assert_eq!(set.key(), AnnotationKey::new(path, 1));
  }

  #[test]
  fn save_round_trips_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_set(dir.path(), json!([{"reviewed": false}, {"reviewed": false}]));
    let mut set = ReviewSet::load(&path).unwrap();
    set.next();
    set.mark_reviewed().unwrap();
    set.save().unwrap();

    let reloaded = ReviewSet::load(&path).unwrap();
    assert!(!reloaded.annotations()[0].is_reviewed());
    assert!(reloaded.annotations()[1].is_reviewed());
  }

  #[test]
  fn delete_persists_and_clamps_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_set(dir.path(), json!([{"n": 1}, {"n": 2}]));
    let mut set = ReviewSet::load(&path).unwrap();
    set.next();

    let removed = set.delete_current().unwrap();
    assert_eq!(removed.get("n"), Some(&json!(2)));
    assert_eq!(set.len(), 1);
    assert_eq!(set.index(), 0);
    assert_eq!(ReviewSet::load(&path).unwrap().len(), 1);
  }

  #[test]
  fn empty_set_rejects_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_set(dir.path(), json!([]));
    let mut set = ReviewSet::load(&path).unwrap();
    assert!(set.is_empty());
    assert!(matches!(set.mark_reviewed(), Err(ReviewError::Empty)));
    assert!(matches!(set.delete_current(), Err(ReviewError::Empty)));
  }

  #[test]
  fn mixed_array_is_refused_and_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_set(dir.path(), json!([{"a": 1}, "note", {"b": 2}]));
    let before = fs::read_to_string(&path).unwrap();

    assert!(matches!(
      ReviewSet::load(&path),
      Err(ReviewError::MalformedExternalFile { .. })
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
  }
}
