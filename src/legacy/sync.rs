// 该文件是 Shanan （山南西风） 项目的一部分。
// src/legacy/sync.rs - 旧数据批量同步
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

//! 把旧数据集中的标注按任务规则批量同步到新数据集
//!
//! 新旧文件按相对路径一一对应。对于规则中列出的任务，以若干字段的文本作为键在旧文件中查找
//! 同键标注，找到且内容不同则整条替换，并把 `reviewed` 置为 `false` 等待重新审核。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::annotation::{ANSWER, Annotation};
use crate::review::{ReviewError, store};

/// 参与同步的任务及其匹配字段
pub const TASK_FIELD_RULES: [(&str, &[&str]); 3] = [
  ("ScoreboardMultiple", &["question", "answer"]),
  ("Spatial_Temporal_Grounding", &["question"]),
  ("Continuous_Actions_Caption", &["question"]),
];

const ANSWER_SEPARATOR: &str = "|||";

fn fields_for(task: &str) -> Option<&'static [&'static str]> {
  TASK_FIELD_RULES
    .iter()
    .find(|(name, _)| *name == task)
    .map(|(_, fields)| *fields)
}

fn normalize_text(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.trim().to_string(),
    Some(other) => other.to_string(),
  }
}

/// 键有序的紧凑 JSON 文本，与字段插入顺序无关
fn canonical_json(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push_str(": ");
        canonical_json(&map[key], out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        canonical_json(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

fn serialize_answer(value: Option<&Value>) -> String {
  match value {
    Some(Value::Array(items)) => items
      .iter()
      .map(|item| normalize_text(Some(item)))
      .collect::<Vec<_>>()
      .join(ANSWER_SEPARATOR),
    Some(object @ Value::Object(_)) => {
      let mut text = String::new();
      canonical_json(object, &mut text);
      text
    }
    other => normalize_text(other),
  }
}

type SyncKey = (String, Vec<String>);

/// 规则中的任务返回其匹配键，其余返回 `None`
fn sync_key(annotation: &Annotation) -> Option<SyncKey> {
  let task = annotation.task_l2()?;
  let fields = fields_for(task)?;
  let parts = fields
    .iter()
    .map(|field| {
      if *field == ANSWER {
        serialize_answer(annotation.get(field))
      } else {
        normalize_text(annotation.get(field))
      }
    })
    .collect();
  Some((task.to_string(), parts))
}

/// 按键建立旧标注索引，同键时后出现的覆盖先出现的
fn build_index(legacy: &[Annotation]) -> HashMap<SyncKey, &Annotation> {
  legacy
    .iter()
    .filter_map(|a| sync_key(a).map(|k| (k, a)))
    .collect()
}

/// 原地替换能匹配上的标注，返回实际改动的条数
pub fn sync_annotations(annotations: &mut [Annotation], legacy: &[Annotation]) -> usize {
  let index = build_index(legacy);
  let mut modified = 0;
  for annotation in annotations.iter_mut() {
    let Some(found) = sync_key(annotation).and_then(|k| index.get(&k).copied()) else {
      continue;
    };
    let mut updated = found.clone();
    updated.set_reviewed(false);
    if updated != *annotation {
      debug!("同步标注: {}", annotation.task_l2().unwrap_or_default());
      *annotation = updated;
      modified += 1;
    }
  }
  modified
}

fn annotation_array(document: &Map<String, Value>) -> Option<&Vec<Value>> {
  document.get(store::ANNOTATIONS).and_then(Value::as_array)
}

/// 同步单个文件，旧文件不存在时返回 0
pub fn sync_file(new_path: &Path, old_path: &Path, dry_run: bool) -> Result<usize, ReviewError> {
  if !old_path.is_file() {
    return Ok(0);
  }

  let mut document = store::read_document(new_path)?;
  let legacy_document = store::read_document(old_path)?;
  if annotation_array(&document).is_none() || annotation_array(&legacy_document).is_none() {
    return Ok(0);
  }

  let mut annotations = store::annotations_of(new_path, &document)?;
  let legacy = store::annotations_of(old_path, &legacy_document)?;
  let changed = sync_annotations(&mut annotations, &legacy);

  if changed > 0 && !dry_run {
    let items = annotations.into_iter().map(Value::from).collect();
    document.insert(store::ANNOTATIONS.to_string(), Value::Array(items));
    store::write_document(new_path, &document)?;
  }
  Ok(changed)
}

/// 一次批量同步的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub annotations: usize,
  /// 有改动的文件，相对于新数据根目录
  pub files: Vec<PathBuf>,
  pub dry_run: bool,
}

/// 遍历 `new_root` 下的全部 JSON 文件，与 `old_root` 中同相对路径的文件同步
pub fn sync_tree(new_root: &Path, old_root: &Path, dry_run: bool) -> SyncReport {
  let mut report = SyncReport {
    dry_run,
    ..SyncReport::default()
  };

  let entries = WalkDir::new(new_root)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!("遍历目录出错: {}", e);
        None
      }
    });

  for entry in entries {
    let path = entry.path();
    if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
      continue;
    }
    let Ok(relative) = path.strip_prefix(new_root) else {
      continue;
    };

    match sync_file(path, &old_root.join(relative), dry_run) {
      Ok(0) => {}
      Ok(changed) => {
        report.annotations += changed;
        report.files.push(relative.to_path_buf());
      }
      Err(e) => warn!("跳过 {}: {}", relative.display(), e),
    }
  }

  info!(
    "同步完成: {} 条标注, {} 个文件",
    report.annotations,
    report.files.len()
  );
  report
}
