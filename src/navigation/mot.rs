// 该文件是 Shanan （山南西风） 项目的一部分。
// src/navigation/mot.rs - MOT 跟踪文件读取
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
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::annotation::BBox;

const MOT_MIN_FIELDS: usize = 6;

#[derive(Error, Debug)]
pub enum MotError {
  #[error("MOT 文件读取失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("MOT 文件第 {line} 行格式错误: {content}")]
  MalformedLine { line: usize, content: String },
}

/// 一条 MOT 检测记录，`frame` 保留文件中的 1 起始编号
#[derive(Debug, Clone, PartialEq)]
pub struct MotDetection {
  pub frame: u64,
  pub track_id: String,
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

impl MotDetection {
  /// 解析一行 `frame,id,x,y,w,h,...`
  ///
  /// 空行与字段不足的行返回 `Ok(None)`。
  pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Self>, MotError> {
    let parts: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if parts.len() < MOT_MIN_FIELDS {
      return Ok(None);
    }

    let malformed = || MotError::MalformedLine {
      line: line_no,
      content: line.trim().to_string(),
    };
    let number = |s: &str| s.parse::<f64>().map_err(|_| malformed());

    let frame = parts[0]
      .parse::<u64>()
      .ok()
      .filter(|f| *f >= 1)
      .ok_or_else(malformed)?;

    Ok(Some(Self {
      frame,
      track_id: parts[1].to_string(),
      x: number(parts[2])?,
      y: number(parts[3])?,
      w: number(parts[4])?,
      h: number(parts[5])?,
    }))
  }

  /// 显示用的 0 起始帧号
  pub fn frame_index(&self) -> u64 {
    self.frame - 1
  }

  pub fn bbox(&self) -> BBox {
    BBox::new(self.x, self.y, self.x + self.w, self.y + self.h)
  }
}

/// 一个 MOT 文件中的全部检测
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotTrack {
  detections: Vec<MotDetection>,
}

impl MotTrack {
  /// 逐行读取，格式错误的行跳过并记录日志
  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, MotError> {
    let mut detections = Vec::new();
    for (i, line) in reader.lines().enumerate() {
      let line = line?;
      match MotDetection::parse_line(i + 1, &line) {
        Ok(Some(detection)) => detections.push(detection),
        Ok(None) => {}
        Err(e) => warn!("跳过 MOT 记录: {}", e),
      }
    }
    Ok(Self { detections })
  }

  pub fn open(path: &Path) -> Result<Self, MotError> {
    let file = File::open(path)?;
    Self::from_reader(BufReader::new(file))
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn detections(&self) -> &[MotDetection] {
    &self.detections
  }

  /// 出现过检测的帧（0 起始，去重升序）
  pub fn frames(&self) -> BTreeSet<u64> {
    self.detections.iter().map(MotDetection::frame_index).collect()
  }

  /// 指定显示帧（0 起始）上的检测
  pub fn detections_at(&self, frame_index: u64) -> impl Iterator<Item = &MotDetection> {
    self
      .detections
      .iter()
      .filter(move |d| d.frame_index() == frame_index)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn frames_are_converted_to_zero_based() {
    let track = MotTrack::from_reader(Cursor::new("1,7,10,10,5,5\n2,7,12,10,5,5\n")).unwrap();
    assert_eq!(track.frames().into_iter().collect::<Vec<_>>(), vec![0, 1]);
  }

  #[test]
  fn malformed_and_short_lines_are_skipped() {
    let content = "1,7,10,10,5,5,1,-1,-1\n\nx,7,1,1,1,1\n3,7\n0,1,1,1,1,1\n4,9,1,1,2,2\n";
    let track = MotTrack::from_reader(Cursor::new(content)).unwrap();
    assert_eq!(track.detections().len(), 2);
    assert_eq!(track.frames().into_iter().collect::<Vec<_>>(), vec![0, 3]);
  }

  #[test]
  fn detections_are_selected_by_display_frame() {
    let track = MotTrack::from_reader(Cursor::new("1,7,10,10,5,5\n2,7,12,10,5,5\n2,8,0,0,4,4\n")).unwrap();
    let ids: Vec<&str> = track.detections_at(1).map(|d| d.track_id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8"]);
    assert_eq!(
      track.detections_at(1).next().unwrap().bbox(),
      BBox::new(12.0, 10.0, 17.0, 15.0)
    );
  }

  #[test]
  fn parse_line_reports_line_number() {
    let err = MotDetection::parse_line(5, "1,2,a,b,c,d").unwrap_err();
    assert!(matches!(err, MotError::MalformedLine { line: 5, .. }));
  }
}
