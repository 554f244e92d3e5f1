// 该文件是 Shanan （山南西风） 项目的一部分。
// src/navigation/cursor.rs - 关注帧循环游标
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

use crate::navigation::points::Waypoint;

/// 游标类型，两者恢复播放的时机不同
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
  /// 暂停后的下一次触发即恢复播放
  BoundingBox,
  /// 走完整个列表后的下一次触发才恢复播放
  Window,
}

/// 一次触发的结果，由调用方驱动播放器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStep {
  /// 跳到该帧并暂停
  Seek {
    frame: u64,
    label: Option<String>,
    /// 本次跳转在列表中的位置（从 0 开始）
    position: usize,
    total: usize,
  },
  /// 恢复连续播放
  Resume,
  /// 列表为空，什么都不做
  Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationCursor {
  kind: CursorKind,
  index: usize,
  paused: bool,
}

impl NavigationCursor {
  pub fn new(kind: CursorKind) -> Self {
    Self {
      kind,
      index: 0,
      paused: false,
    }
  }

  pub fn kind(&self) -> CursorKind {
    self.kind
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn is_paused(&self) -> bool {
    self.paused
  }

  pub fn reset(&mut self) {
    self.index = 0;
    self.paused = false;
  }

  pub fn advance<W: Waypoint>(&mut self, points: &[W]) -> CursorStep {
    if points.is_empty() {
      return CursorStep::Idle;
    }

    match self.kind {
      CursorKind::BoundingBox => {
        if self.paused {
          self.paused = false;
          return CursorStep::Resume;
        }
        // 列表可能在两次触发之间被重新计算
        let position = self.index % points.len();
        self.index = (position + 1) % points.len();
        self.paused = true;
        Self::seek(points, position)
      }
      CursorKind::Window => {
        if self.index >= points.len() {
          self.reset();
          return CursorStep::Resume;
        }
        let position = self.index;
        self.index += 1;
        self.paused = true;
        Self::seek(points, position)
      }
    }
  }

  fn seek<W: Waypoint>(points: &[W], position: usize) -> CursorStep {
    let point = &points[position];
    CursorStep::Seek {
      frame: point.frame(),
      label: point.label().map(str::to_string),
      position,
      total: points.len(),
    }
  }
}

/// 两个互斥的导航游标：触发其中一个会把另一个复位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
  bbox: NavigationCursor,
  window: NavigationCursor,
}

impl Default for Navigator {
  fn default() -> Self {
    Self {
      bbox: NavigationCursor::new(CursorKind::BoundingBox),
      window: NavigationCursor::new(CursorKind::Window),
    }
  }
}

impl Navigator {
  pub fn bbox_cursor(&self) -> &NavigationCursor {
    &self.bbox
  }

  pub fn window_cursor(&self) -> &NavigationCursor {
    &self.window
  }

  pub fn next_bbox_frame<W: Waypoint>(&mut self, points: &[W]) -> CursorStep {
    self.window.reset();
    self.bbox.advance(points)
  }

  pub fn next_window_frame<W: Waypoint>(&mut self, points: &[W]) -> CursorStep {
    self.bbox.reset();
    self.window.advance(points)
  }

  pub fn reset(&mut self) {
    self.bbox.reset();
    self.window.reset();
  }
}
