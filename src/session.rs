// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session.rs - 审查会话
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

//! # 审查会话
//!
//! 会话把审查集合、导航游标、编辑会话、旧数据替换与播放状态组合在一起，
//! 由离散的 [`Command`] 驱动，每条命令同步执行完毕后返回一条 [`Notice`]。
//!
//! 任何会改变状态的命令都先取消播放，避免过期的定时器改写新加载的状态。

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::annotation::Annotation;
use crate::dataset::{Dataset, MediaKind, TaskFilter, UnitKey};
use crate::edit::{DragOutcome, EditSession, Point, Rect};
use crate::input::{Frame, InputWrapper};
use crate::legacy::{LegacyMatcher, TransferOutcome, TransferState};
use crate::navigation::{CursorStep, Navigator, PointFinder, Waypoints};
use crate::output::{Overlay, OverlayContext, Render};
use crate::playback::{Playback, Tick, TickToken};
use crate::review::{ReviewError, ReviewSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  TogglePlay,
  Replay,
  NextBboxFrame,
  NextWindowFrame,
  ToggleEdit,
  PointerDown(Point),
  PointerMove(Point),
  PointerUp(Point),
  Next,
  Prev,
  MarkReviewed,
  Save,
  Transfer,
  Delete,
  Seek(u64),
  Reload,
}

impl FromStr for Command {
  type Err = String;

  /// 控制台命令，例如 `b`、`seek 120`、`down 10 20`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.split_whitespace();
    let name = parts.next().ok_or_else(|| "空命令".to_string())?;
    let args: Vec<i64> = parts
      .map(|p| p.parse::<i64>().map_err(|_| format!("参数不是整数: {}", p)))
      .collect::<Result<_, _>>()?;

    let point = || match args.as_slice() {
      [x, y] => Ok(Point::new(*x, *y)),
      _ => Err(format!("`{}` 需要两个坐标参数", name)),
    };

    let command = match name {
      "space" | "enter" | "play" => Command::TogglePlay,
      "r" | "replay" => Command::Replay,
      "b" => Command::NextBboxFrame,
      "w" => Command::NextWindowFrame,
      "e" | "edit" => Command::ToggleEdit,
      "down" => Command::PointerDown(point()?),
      "move" => Command::PointerMove(point()?),
      "up" => Command::PointerUp(point()?),
      "n" | "next" => Command::Next,
      "p" | "prev" => Command::Prev,
      "m" | "mark" => Command::MarkReviewed,
      "s" | "save" => Command::Save,
      "t" | "transfer" => Command::Transfer,
      "del" | "delete" => Command::Delete,
      "f5" | "reload" => Command::Reload,
      "seek" => match args.as_slice() {
        [frame] if *frame >= 0 => Command::Seek(*frame as u64),
        _ => return Err("`seek` 需要一个非负帧号".to_string()),
      },
      other => return Err(format!("未知命令: {}", other)),
    };
    Ok(command)
  }
}

/// 命令执行后给用户的提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Nothing,
  /// 当前单元没有可播放的媒体
  NoMedia,
  Playing(TickToken),
  Paused,
  /// 暂停在某一帧
  Shown(u64),
  Jumped {
    frame: u64,
    label: Option<String>,
    position: usize,
    total: usize,
  },
  EditEntered {
    target: String,
    total: usize,
  },
  EditTarget(String),
  EditExited,
  DragStarted,
  Preview(Rect),
  BoxUpdated {
    target: String,
    rect: Rect,
  },
  DragDiscarded,
  Moved {
    index: usize,
    total: usize,
  },
  AtBoundary,
  MarkedReviewed,
  Saved,
  TransferApplied,
  TransferReverted,
  NoLegacyMatch,
  Deleted {
    index: usize,
    total: usize,
  },
  Reloaded,
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Notice::Nothing => Ok(()),
      Notice::NoMedia => write!(f, "当前单元没有可播放的媒体"),
      Notice::Playing(_) => write!(f, "播放"),
      Notice::Paused => write!(f, "暂停"),
      Notice::Shown(frame) => write!(f, "第 {} 帧", frame),
      Notice::Jumped {
        frame,
        label,
        position,
        total,
      } => {
        write!(f, "跳转到第 {} 帧 ({}/{})", frame, position + 1, total)?;
        if let Some(label) = label {
          write!(f, " {}", label)?;
        }
        Ok(())
      }
      Notice::EditEntered { target, total } => {
        write!(f, "进入编辑模式, 当前目标: {} (共 {} 个)", target, total)
      }
      Notice::EditTarget(target) => write!(f, "当前目标: {}", target),
      Notice::EditExited => write!(f, "退出编辑模式"),
      Notice::DragStarted => write!(f, "开始绘制"),
      Notice::Preview(rect) => write!(
        f,
        "预览: [{}, {}, {}, {}]",
        rect.x1, rect.y1, rect.x2, rect.y2
      ),
      Notice::BoxUpdated { target, rect } => write!(
        f,
        "已更新 {}: [{}, {}, {}, {}], retrack=true, 记得保存",
        target, rect.x1, rect.y1, rect.x2, rect.y2
      ),
      Notice::DragDiscarded => write!(f, "矩形过小, 已忽略"),
      Notice::Moved { index, total } => write!(f, "标注 {}/{}", index + 1, total),
      Notice::AtBoundary => write!(f, "已经到头了"),
      Notice::MarkedReviewed => write!(f, "已标记为已审核"),
      Notice::Saved => write!(f, "已保存"),
      Notice::TransferApplied => write!(f, "已应用旧数据内容 (再次替换可撤销)"),
      Notice::TransferReverted => write!(f, "已撤销本次一键替换"),
      Notice::NoLegacyMatch => write!(f, "旧数据不存在同任务且已审核的标注"),
      Notice::Deleted { index, total } => {
        write!(f, "已删除标注 {}/{}, 文件已重新加载", index + 1, total)
      }
      Notice::Reloaded => write!(f, "已重新加载"),
    }
  }
}

/// 一个单元的审查会话
pub struct ReviewSession {
  dataset: Dataset,
  unit: UnitKey,
  set: ReviewSet,
  source: Option<InputWrapper>,
  frame_rate: Option<f64>,
  finder: PointFinder,
  waypoints: Waypoints,
  navigator: Navigator,
  window_label: Option<String>,
  edit: EditSession,
  transfer: TransferState,
  legacy: LegacyMatcher,
  legacy_match: Option<Annotation>,
  playback: Playback,
  shown: Option<Frame>,
}

fn open_source(
  dataset: &Dataset,
  unit: &UnitKey,
  annotations: &[Annotation],
  frame_rate: Option<f64>,
) -> Option<InputWrapper> {
  let media = match dataset.media(unit, annotations) {
    Ok(media) => media,
    Err(e) => {
      warn!("找不到媒体: {}", e);
      return None;
    }
  };
  match InputWrapper::from_media(&media, frame_rate) {
    Ok(source) => Some(source),
    Err(e) => {
      warn!("无法打开媒体 {}: {}", media.path().display(), e);
      None
    }
  }
}

impl ReviewSession {
  /// 打开单元。标注文件读取失败返回错误，媒体缺失只记录日志
  pub fn open(dataset: Dataset, unit: UnitKey) -> Result<Self, ReviewError> {
    Self::open_with(dataset, unit, PointFinder::default(), None)
  }

  pub fn open_with(
    dataset: Dataset,
    unit: UnitKey,
    finder: PointFinder,
    frame_rate: Option<f64>,
  ) -> Result<Self, ReviewError> {
    let set = ReviewSet::load(dataset.json_path(&unit))?;
    let source = open_source(&dataset, &unit, set.annotations(), frame_rate);

    let mut session = Self {
      dataset,
      unit,
      set,
      source,
      frame_rate,
      finder,
      waypoints: Waypoints::default(),
      navigator: Navigator::default(),
      window_label: None,
      edit: EditSession::default(),
      transfer: TransferState::default(),
      legacy: LegacyMatcher::default(),
      legacy_match: None,
      playback: Playback::default(),
      shown: None,
    };
    session.annotation_changed()?;
    Ok(session)
  }

  pub fn unit(&self) -> &UnitKey {
    &self.unit
  }

  pub fn dataset(&self) -> &Dataset {
    &self.dataset
  }

  pub fn review_set(&self) -> &ReviewSet {
    &self.set
  }

  pub fn current(&self) -> Option<&Annotation> {
    self.set.current()
  }

  pub fn waypoints(&self) -> &Waypoints {
    &self.waypoints
  }

  pub fn navigator(&self) -> &Navigator {
    &self.navigator
  }

  pub fn edit_session(&self) -> &EditSession {
    &self.edit
  }

  pub fn transfer_state(&self) -> &TransferState {
    &self.transfer
  }

  pub fn legacy_match(&self) -> Option<&Annotation> {
    self.legacy_match.as_ref()
  }

  pub fn playback(&self) -> &Playback {
    &self.playback
  }

  pub fn has_media(&self) -> bool {
    self.source.is_some()
  }

  /// 最近一次显示的帧
  pub fn shown_frame(&self) -> Option<&Frame> {
    self.shown.as_ref()
  }

  fn is_clip(&self) -> bool {
    self.unit.kind == MediaKind::Clips
  }

  /// 换到另一个单元，读取失败时保留当前状态
  pub fn load(&mut self, unit: UnitKey) -> Result<(), ReviewError> {
    self.playback.cancel();
    let set = ReviewSet::load(self.dataset.json_path(&unit))?;
    self.source = open_source(&self.dataset, &unit, set.annotations(), self.frame_rate);
    self.set = set;
    self.unit = unit;
    self.shown = None;
    self.annotation_changed()?;
    info!("已载入 {}", self.unit);
    Ok(())
  }

  /// 保存当前单元，跳到下一个含有满足条件标注的单元并选中第一条
  pub fn next_unreviewed(&mut self, filter: &TaskFilter) -> Result<Option<UnitKey>, ReviewError> {
    let Some(target) = self
      .dataset
      .next_unreviewed(Some(&self.unit), self.unit.kind, filter)
    else {
      info!("没有下一个未审核文件");
      return Ok(None);
    };

    if let Err(e) = self.set.save() {
      warn!("保存当前文件失败: {}", e);
    }
    self.load(target.clone())?;
    if let Some(index) = self.set.first_matching(filter) {
      self.set.select(index);
      self.annotation_changed()?;
    }
    Ok(Some(target))
  }

  /// 当前标注变化后的统一处理
  fn annotation_changed(&mut self) -> Result<(), ReviewError> {
    self.playback.cancel();
    let key = self.set.key();
    if self.edit.sync_to(&key) {
      info!("标注已切换, 退出编辑模式");
    }
    self.transfer.invalidate_unless(&key);
    self.refresh_points();

    let legacy_path = self.dataset.legacy_path(&self.unit);
    self.legacy_match = match self.set.current() {
      Some(annotation) => self.legacy.find(annotation, &legacy_path),
      None => None,
    };

    self.restart_playback()
  }

  /// 重新计算关注帧，两个游标回到初始状态
  fn refresh_points(&mut self) {
    self.waypoints = match (self.is_clip(), self.set.current()) {
      (true, Some(annotation)) => self.finder.find(annotation),
      _ => Waypoints::default(),
    };
    self.navigator.reset();
    self.window_label = None;
  }

  /// 从窗口起点开始播放，到末尾后回到问题窗口起点
  fn restart_playback(&mut self) -> Result<(), ReviewError> {
    let Some(annotation) = self.set.current() else {
      return Ok(());
    };
    let anchor = annotation.anchor_frame();
    let loop_start = annotation
      .question_window()
      .ok()
      .flatten()
      .map(|q| q.start)
      .unwrap_or(0);

    let clip = self.is_clip();
    let Some(source) = self.source.as_mut() else {
      return Ok(());
    };
    self.playback.set_loop_start(loop_start);
    self.shown = self.playback.seek(source, anchor)?;
    if clip {
      self.playback.start();
    }
    Ok(())
  }

  /// 正在播放时的定时器令牌
  pub fn playing_token(&self) -> Option<TickToken> {
    self.playback.token()
  }

  /// 定时器触发
  pub fn tick(&mut self, token: TickToken) -> Result<Option<Tick>, ReviewError> {
    let Some(source) = self.source.as_mut() else {
      return Ok(None);
    };
    let tick = self.playback.tick(token, source)?;
    if let Some(t) = &tick {
      self.shown = Some(t.frame.clone());
    }
    Ok(tick)
  }

  /// 指定帧的叠加层，单帧模式下不显示 MOT 与窗口提示
  pub fn overlay(&self, frame: u64) -> Overlay {
    let Some(annotation) = self.set.current() else {
      return Overlay {
        frame,
        ..Overlay::default()
      };
    };
    let clip = self.is_clip();
    let context = OverlayContext {
      mot: self.waypoints.mot.as_ref().filter(|_| clip),
      preview: self.edit.preview(),
      window_label: self.window_label.as_deref(),
      show_window_marker: clip,
    };
    Overlay::compose(annotation, frame, &context)
  }

  /// 渲染最近一次显示的帧
  pub fn render_shown<R>(&self, output: &R) -> Result<bool, R::Error>
  where
    R: Render<Frame, Overlay>,
  {
    let Some(frame) = &self.shown else {
      return Ok(false);
    };
    output.render_result(frame, &self.overlay(frame.index))?;
    Ok(true)
  }

  /// 当前标注的文字摘要
  pub fn describe(&self) -> Vec<String> {
    let Some(annotation) = self.set.current() else {
      return vec!["没有标注数据".to_string()];
    };
    let text = |v: Option<&str>| v.unwrap_or("N/A").to_string();

    let mut lines = vec![
      format!("Annotation {}/{}", self.set.index() + 1, self.set.len()),
      format!(
        "ID: {}",
        annotation
          .annotation_id()
          .map(|v| v.to_string())
          .unwrap_or_else(|| "N/A".to_string())
      ),
      format!(
        "Task Type: {}/{}",
        text(annotation.task_l1()),
        text(annotation.task_l2())
      ),
      format!("Reviewed: {}", if annotation.is_reviewed() { "Yes" } else { "No" }),
      format!("exist_old: {}", self.legacy_match.is_some()),
    ];
    if let Some(target) = self.edit.active_target() {
      lines.push(format!("Editing Target: {}", target.label));
    }
    lines.push(format!(
      "Retrack: {}",
      if annotation.needs_retrack() { "Yes" } else { "No" }
    ));
    if let Some(question) = annotation.question() {
      lines.push(format!("Question: {}", question));
    }
    if let Some(answer) = annotation.answer_text() {
      lines.push(format!("Answer: {}", answer));
    }
    if let Ok(Some(q)) = annotation.question_window() {
      lines.push(format!("Question Window: {}-{}", q.start, q.end));
    }
    if let Some(a) = annotation.get(crate::annotation::A_WINDOW_FRAME) {
      lines.push(format!("Answer Window: {}", a));
    }
    lines
  }

  pub fn handle(&mut self, command: Command) -> Result<Notice, ReviewError> {
    match command {
      Command::TogglePlay => self.toggle_play(),
      Command::Replay => self.replay(),
      Command::NextBboxFrame => {
        let step = self.navigator.next_bbox_frame(&self.waypoints.bbox);
        self.window_label = None;
        self.apply_step(step, false)
      }
      Command::NextWindowFrame => {
        let step = self.navigator.next_window_frame(&self.waypoints.window);
        self.apply_step(step, true)
      }
      Command::ToggleEdit => self.toggle_edit(),
      Command::PointerDown(point) => Ok(if self.edit.begin_drag(point) {
        Notice::DragStarted
      } else {
        Notice::Nothing
      }),
      Command::PointerMove(point) => Ok(
        self
          .edit
          .update_drag(point)
          .map(Notice::Preview)
          .unwrap_or(Notice::Nothing),
      ),
      Command::PointerUp(point) => self.end_drag(point),
      Command::Next => self.step_annotation(true),
      Command::Prev => self.step_annotation(false),
      Command::MarkReviewed => {
        self.set.mark_reviewed()?;
        Ok(Notice::MarkedReviewed)
      }
      Command::Save => {
        self.set.save()?;
        Ok(Notice::Saved)
      }
      Command::Transfer => self.transfer(),
      Command::Delete => self.delete(),
      Command::Seek(frame) => self.seek(frame),
      Command::Reload => {
        self.load(self.unit.clone())?;
        Ok(Notice::Reloaded)
      }
    }
  }

  fn toggle_play(&mut self) -> Result<Notice, ReviewError> {
    if !self.is_clip() || self.source.is_none() {
      return Ok(Notice::NoMedia);
    }
    Ok(match self.playback.toggle() {
      Some(token) => Notice::Playing(token),
      None => Notice::Paused,
    })
  }

  fn replay(&mut self) -> Result<Notice, ReviewError> {
    let clip = self.is_clip();
    let Some(source) = self.source.as_mut().filter(|_| clip) else {
      return Ok(Notice::NoMedia);
    };
    let token = self.playback.replay(source)?;
    Ok(Notice::Playing(token))
  }

  fn seek(&mut self, frame: u64) -> Result<Notice, ReviewError> {
    let Some(source) = self.source.as_mut() else {
      return Ok(Notice::NoMedia);
    };
    self.shown = self.playback.seek(source, frame)?;
    Ok(match &self.shown {
      Some(shown) => Notice::Shown(shown.index),
      None => Notice::Nothing,
    })
  }

  fn apply_step(&mut self, step: CursorStep, window: bool) -> Result<Notice, ReviewError> {
    match step {
      CursorStep::Idle => Ok(Notice::Nothing),
      CursorStep::Resume => {
        self.window_label = None;
        // 源的读取位置停在暂停帧之后，直接继续
        match self.source {
          Some(_) => Ok(Notice::Playing(self.playback.start())),
          None => Ok(Notice::NoMedia),
        }
      }
      CursorStep::Seek {
        frame,
        label,
        position,
        total,
      } => {
        if window {
          self.window_label = label.clone();
        }
        match self.source.as_mut() {
          Some(source) => self.shown = self.playback.seek(source, frame)?,
          None => self.playback.cancel(),
        }
        Ok(Notice::Jumped {
          frame,
          label,
          position,
          total,
        })
      }
    }
  }

  fn toggle_edit(&mut self) -> Result<Notice, ReviewError> {
    let key = self.set.key();
    if !self.edit.is_active_for(&key) {
      let annotation = self.set.current().ok_or(ReviewError::Empty)?;
      let target = self.edit.enter(key, annotation)?.label.clone();
      self.playback.cancel();
      return Ok(Notice::EditEntered {
        target,
        total: self.edit.targets().len(),
      });
    }

    match self.edit.advance_target()? {
      Some(target) => Ok(Notice::EditTarget(target.label.clone())),
      None => Ok(Notice::EditExited),
    }
  }

  fn end_drag(&mut self, point: Point) -> Result<Notice, ReviewError> {
    let Some(annotation) = self.set.current_mut() else {
      return Ok(Notice::Nothing);
    };
    match self.edit.end_drag(point, annotation)? {
      DragOutcome::Ignored => Ok(Notice::Nothing),
      DragOutcome::Discarded => Ok(Notice::DragDiscarded),
      DragOutcome::Committed { label, rect } => {
        self.refresh_points();
        Ok(Notice::BoxUpdated {
          target: label,
          rect,
        })
      }
    }
  }

  fn step_annotation(&mut self, forward: bool) -> Result<Notice, ReviewError> {
    self.playback.cancel();
    let moved = if forward {
      self.set.next()
    } else {
      self.set.prev()
    };
    if !moved {
      return Ok(Notice::AtBoundary);
    }
    self.annotation_changed()?;
    Ok(Notice::Moved {
      index: self.set.index(),
      total: self.set.len(),
    })
  }

  fn transfer(&mut self) -> Result<Notice, ReviewError> {
    self.playback.cancel();
    let key = self.set.key();
    let legacy_path = self.dataset.legacy_path(&self.unit);
    let cached = self.legacy_match.clone();
    let legacy = &mut self.legacy;
    let annotation = self.set.current_mut().ok_or(ReviewError::Empty)?;

    let outcome = self.transfer.transfer(&key, annotation, |current| {
      cached.or_else(|| legacy.find(current, &legacy_path))
    });

    match outcome {
      TransferOutcome::NoMatch => Ok(Notice::NoLegacyMatch),
      TransferOutcome::Applied | TransferOutcome::Reverted => {
        // 内容整体被替换，原有的编辑目标全部失效
        self.edit.exit();
        self.annotation_changed()?;
        Ok(match outcome {
          TransferOutcome::Applied => Notice::TransferApplied,
          _ => Notice::TransferReverted,
        })
      }
    }
  }

  fn delete(&mut self) -> Result<Notice, ReviewError> {
    self.playback.cancel();
    let index = self.set.index();
    let total = self.set.len();
    self.set.delete_current()?;
    self.edit.exit();
    self.annotation_changed()?;
    Ok(Notice::Deleted { index, total })
  }
}
