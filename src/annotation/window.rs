// 该文件是 Shanan （山南西风） 项目的一部分。
// src/annotation/window.rs - 问题/答案时间窗口
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

use serde_json::Value;

use super::{A_WINDOW_FRAME, AnnotationError, Q_WINDOW_FRAME};

fn frame_number(value: &Value) -> Option<u64> {
  value
    .as_u64()
    .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

/// `Q_window_frame`：闭区间 [start, end]，允许 start == end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionWindow {
  pub start: u64,
  pub end: u64,
}

impl QuestionWindow {
  pub fn from_value(value: &Value) -> Result<Self, AnnotationError> {
    let malformed = || AnnotationError::MalformedWindow {
      field: Q_WINDOW_FRAME,
      value: value.clone(),
    };

    match value.as_array().map(Vec::as_slice) {
      Some([start, end]) => Ok(Self {
        start: frame_number(start).ok_or_else(malformed)?,
        end: frame_number(end).ok_or_else(malformed)?,
      }),
      _ => Err(malformed()),
    }
  }

  pub fn is_point(&self) -> bool {
    self.start == self.end
  }
}

/// `A_window_frame` 中的单个元素：`"start-end"` 区间或单帧
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerWindow {
  Range(u64, u64),
  Point(u64),
}

impl AnswerWindow {
  pub fn from_value(value: &Value) -> Result<Self, AnnotationError> {
    let malformed = || AnnotationError::MalformedWindow {
      field: A_WINDOW_FRAME,
      value: value.clone(),
    };

    match value {
      Value::String(text) => {
        let (start, end) = text.split_once('-').ok_or_else(malformed)?;
        let start = start.trim().parse().map_err(|_| malformed())?;
        let end = end.trim().parse().map_err(|_| malformed())?;
        Ok(AnswerWindow::Range(start, end))
      }
      Value::Number(_) => frame_number(value)
        .map(AnswerWindow::Point)
        .ok_or_else(malformed),
      _ => Err(malformed()),
    }
  }

  pub fn start(&self) -> u64 {
    match self {
      AnswerWindow::Range(start, _) => *start,
      AnswerWindow::Point(frame) => *frame,
    }
  }
}
