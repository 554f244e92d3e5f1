// 该文件是 Shanan （山南西风） 项目的一部分。
// src/review/store.rs - 标注 JSON 文档读写
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

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::annotation::Annotation;
use crate::review::ReviewError;

pub const ANNOTATIONS: &str = "annotations";

/// 读取整个文档，顶层必须是 JSON 对象
pub fn read_document(path: &Path) -> Result<Map<String, Value>, ReviewError> {
  if !path.is_file() {
    return Err(ReviewError::NotFound(path.to_path_buf()));
  }

  let text = fs::read_to_string(path)?;
  match serde_json::from_str(&text) {
    Ok(Value::Object(document)) => Ok(document),
    Ok(_) => Err(ReviewError::malformed(path, "顶层不是 JSON 对象")),
    Err(e) => Err(ReviewError::malformed(path, e)),
  }
}

/// 取出 `annotations` 数组，缺失时为空
///
/// 数组中任何一个元素不是对象都拒绝整个文件，保存时整个数组会被写回，
/// 跳过元素会让它们在下次保存时丢失，下标也会与磁盘错位。
pub fn annotations_of(
  path: &Path,
  document: &Map<String, Value>,
) -> Result<Vec<Annotation>, ReviewError> {
  let items = match document.get(ANNOTATIONS) {
    None => return Ok(Vec::new()),
    Some(Value::Array(items)) => items,
    Some(_) => return Err(ReviewError::malformed(path, "annotations 不是列表")),
  };

  items
    .iter()
    .enumerate()
    .map(|(i, item)| {
      Annotation::try_from(item.clone())
        .map_err(|e| ReviewError::malformed(path, format!("第 {} 条标注: {}", i + 1, e)))
    })
    .collect()
}

pub fn read_annotations(path: &Path) -> Result<Vec<Annotation>, ReviewError> {
  let document = read_document(path)?;
  annotations_of(path, &document)
}

fn staging_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().unwrap_or_default().to_os_string();
  name.push(".saving");
  path.with_file_name(name)
}

/// 写回整个文档
///
/// 先在内存中完成序列化，再写入同目录的临时文件并改名覆盖，
/// 任何一步失败都不会破坏原文件。
pub fn write_document(path: &Path, document: &Map<String, Value>) -> Result<(), ReviewError> {
  let mut text = serde_json::to_string_pretty(document)
    .map_err(|e| ReviewError::malformed(path, e))?;
  text.push('\n');

  let staging = staging_path(path);
  if let Err(e) = fs::write(&staging, text) {
    let _ = fs::remove_file(&staging);
    return Err(e.into());
  }
  fs::rename(&staging, path)?;
  Ok(())
}

/// 用新的标注列表替换磁盘文档中的 `annotations`，其它顶层字段保持不变
pub fn replace_annotations(path: &Path, annotations: &[Annotation]) -> Result<(), ReviewError> {
  let mut document = read_document(path)?;
  let items = annotations.iter().cloned().map(Value::from).collect();
  document.insert(ANNOTATIONS.to_string(), Value::Array(items));
  write_document(path, &document)
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_matches::assert_matches;
  use serde_json::json;

  #[test]
  fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    assert_matches!(read_document(&path), Err(ReviewError::NotFound(p)) if p == path);
  }

  #[test]
  fn corrupt_json_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    assert_matches!(
      read_document(&path),
      Err(ReviewError::MalformedExternalFile { .. })
    );
  }

  #[test]
  fn replacing_annotations_keeps_sibling_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1.json");
    fs::write(
      &path,
      json!({"video": "1.mp4", "annotations": [{"reviewed": false}], "meta": {"fps": 25}}).to_string(),
    )
    .unwrap();

    let updated = vec![Annotation::try_from(json!({"reviewed": true})).unwrap()];
    replace_annotations(&path, &updated).unwrap();

    let document = read_document(&path).unwrap();
    assert_eq!(document.get("video"), Some(&json!("1.mp4")));
    assert_eq!(document.get("meta"), Some(&json!({"fps": 25})));
    assert_eq!(document.get("annotations"), Some(&json!([{"reviewed": true}])));
    assert_eq!(
      document.keys().collect::<Vec<_>>(),
      vec!["video", "annotations", "meta"]
    );
    assert!(!staging_path(&path).exists());
  }

  #[test]
  fn failed_replace_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1.json");
    fs::write(&path, "[1, 2, 3]").unwrap();

    let updated = vec![Annotation::default()];
    assert!(replace_annotations(&path, &updated).is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "[1, 2, 3]");
  }

  #[test]
  fn non_object_annotations_reject_the_file() {
    let path = Path::new("1.json");
    let document = json!({"annotations": [{"a": 1}, "note", {"b": 2}]});
    assert_matches!(
      annotations_of(path, document.as_object().unwrap()),
      Err(ReviewError::MalformedExternalFile { .. })
    );

    let document = json!({"annotations": {"a": 1}});
    assert_matches!(
      annotations_of(path, document.as_object().unwrap()),
      Err(ReviewError::MalformedExternalFile { .. })
    );

    let document = json!({"video": "1.mp4"});
    assert_eq!(annotations_of(path, document.as_object().unwrap()).unwrap(), Vec::new());
  }
}
