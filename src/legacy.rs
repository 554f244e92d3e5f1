// 该文件是 Shanan （山南西风） 项目的一部分。
// src/legacy.rs - 旧数据匹配与一键替换
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

//! # 旧数据
//!
//! 旧数据集与新数据集目录结构相同且只读。审查时可以把旧数据中已审核的同任务标注
//! 一键替换到当前标注上，再次操作即撤销。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tracing::{info, warn};

use crate::annotation::{Annotation, QUESTION};
use crate::review::{AnnotationKey, ReviewError, store};

pub mod sync;

/// 只看 `question` 字段，不退回到 `query`
fn question_of(annotation: &Annotation) -> Option<&str> {
  annotation.get(QUESTION).and_then(Value::as_str).map(str::trim)
}

/// 在候选中挑选与 `annotation` 对应的旧标注
///
/// 只考虑 `task_L2` 相同且已审核的记录，依次按 `annotation_id`、去除首尾空白后的问题文本匹配，
/// 都不匹配时取第一个候选。
pub fn find_match<'a>(annotation: &Annotation, legacy: &'a [Annotation]) -> Option<&'a Annotation> {
  let task = annotation.task_l2()?;
  let candidates: Vec<&Annotation> = legacy
    .iter()
    .filter(|a| a.task_l2() == Some(task) && a.is_reviewed())
    .collect();

  if let Some(id) = annotation.annotation_id()
    && let Some(found) = candidates.iter().find(|a| a.annotation_id() == Some(id))
  {
    return Some(found);
  }

  let question = question_of(annotation).unwrap_or_default();
  if !question.is_empty()
    && let Some(found) = candidates
      .iter()
      .find(|a| question_of(a) == Some(question))
  {
    return Some(found);
  }

  candidates.first().copied()
}

/// 旧数据读取器，按文件路径缓存整个会话
#[derive(Debug, Default)]
pub struct LegacyMatcher {
  cache: HashMap<PathBuf, Option<Rc<[Annotation]>>>,
}

impl LegacyMatcher {
  /// 读取旧文件中的标注，不存在时返回 `None`；读取失败同样缓存为 `None`
  pub fn load(&mut self, source: &Path) -> Option<Rc<[Annotation]>> {
    if let Some(cached) = self.cache.get(source) {
      return cached.clone();
    }

    let loaded = match store::read_annotations(source) {
      Ok(annotations) => Some(Rc::from(annotations)),
      Err(ReviewError::NotFound(_)) => return None,
      Err(e) => {
        warn!("无法读取旧数据 {}: {}", source.display(), e);
        None
      }
    };
    self.cache.insert(source.to_path_buf(), loaded.clone());
    loaded
  }

  pub fn find(&mut self, annotation: &Annotation, source: &Path) -> Option<Annotation> {
    let legacy = self.load(source)?;
    find_match(annotation, &legacy).cloned()
  }
}

/// 最近一次替换的记录
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
  pub key: AnnotationKey,
  /// 替换前标注的深拷贝
  pub original: Annotation,
  pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
  Applied,
  Reverted,
  NoMatch,
}

/// 替换/撤销状态，同一时间只保留一条记录
#[derive(Debug, Clone, Default)]
pub struct TransferState {
  record: Option<TransferRecord>,
}

impl TransferState {
  pub fn record(&self) -> Option<&TransferRecord> {
    self.record.as_ref()
  }

  /// 当前标注变化时调用，丢弃不属于 `key` 的记录
  pub fn invalidate_unless(&mut self, key: &AnnotationKey) {
    if self.record.as_ref().is_some_and(|r| &r.key != key) {
      self.record = None;
    }
  }

  /// 已对 `key` 应用过替换则撤销，否则用 `lookup` 查找旧标注并替换
  ///
  /// 替换后保留当前标注原来的 `reviewed` 值。
  pub fn transfer<F>(
    &mut self,
    key: &AnnotationKey,
    annotation: &mut Annotation,
    lookup: F,
  ) -> TransferOutcome
  where
    F: FnOnce(&Annotation) -> Option<Annotation>,
  {
    if let Some(record) = self.record.as_mut()
      && &record.key == key
      && record.applied
    {
      *annotation = record.original.clone();
      record.applied = false;
      info!("已撤销旧数据替换");
      return TransferOutcome::Reverted;
    }

    let Some(mut replacement) = lookup(annotation) else {
      return TransferOutcome::NoMatch;
    };

    let record = self.record.insert(TransferRecord {
      key: key.clone(),
      original: annotation.clone(),
      applied: false,
    });
    replacement.set_reviewed(annotation.is_reviewed());
    *annotation = replacement;
    record.applied = true;
    info!("已应用旧数据内容");
    TransferOutcome::Applied
  }
}
