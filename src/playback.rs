// 该文件是 Shanan （山南西风） 项目的一部分。
// src/playback.rs - 连续播放
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

//! # 连续播放
//!
//! 播放被建模为自我重新调度的定时器。每次 `start` 或 `cancel` 都会推进代数，
//! 持有旧代数令牌的定时器触发时什么也不做，因此取消不需要抢占。

use std::time::Duration;

use tracing::debug;

use crate::input::{Frame, FrameSource};

pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(33);

/// 帧率对应的帧间隔，帧率未知时为 33 毫秒
pub fn frame_delay(frame_rate: Option<f64>) -> Duration {
  match frame_rate {
    Some(fps) if fps > 0.0 => Duration::from_millis((1000.0 / fps) as u64),
    _ => DEFAULT_FRAME_DELAY,
  }
}

/// 定时器令牌
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken(u64);

/// 一次有效触发的结果
#[derive(Debug)]
pub struct Tick {
  pub frame: Frame,
  /// 下一次触发前的等待时间
  pub delay: Duration,
  pub next: TickToken,
}

#[derive(Debug, Clone, Default)]
pub struct Playback {
  generation: u64,
  playing: bool,
  loop_start: u64,
  displayed: Option<u64>,
}

impl Playback {
  pub fn is_playing(&self) -> bool {
    self.playing
  }

  /// 当前显示的帧
  pub fn displayed(&self) -> Option<u64> {
    self.displayed
  }

  pub fn loop_start(&self) -> u64 {
    self.loop_start
  }

  /// 到达末尾后回到的帧
  pub fn set_loop_start(&mut self, frame: u64) {
    self.loop_start = frame;
  }

  /// 开始播放，之前发出的令牌全部失效
  pub fn start(&mut self) -> TickToken {
    self.generation += 1;
    self.playing = true;
    TickToken(self.generation)
  }

  pub fn cancel(&mut self) {
    if self.playing {
      debug!("停止播放");
    }
    self.generation += 1;
    self.playing = false;
  }

  /// 播放中则停止并返回 `None`，否则开始播放
  pub fn toggle(&mut self) -> Option<TickToken> {
    if self.playing {
      self.cancel();
      None
    } else {
      Some(self.start())
    }
  }

  /// 播放中时有效的令牌
  pub fn token(&self) -> Option<TickToken> {
    self.playing.then_some(TickToken(self.generation))
  }

  pub fn is_current(&self, token: TickToken) -> bool {
    self.playing && token.0 == self.generation
  }

  /// 回到循环起点并开始播放
  pub fn replay<S: FrameSource>(&mut self, source: &mut S) -> Result<TickToken, S::Error> {
    self.cancel();
    source.seek(self.loop_start)?;
    Ok(self.start())
  }

  /// 停止播放，定位并读出该帧用于显示
  pub fn seek<S: FrameSource>(
    &mut self,
    source: &mut S,
    frame: u64,
  ) -> Result<Option<Frame>, S::Error> {
    self.cancel();
    source.seek(frame)?;
    let read = source.read_next()?;
    if let Some(f) = &read {
      self.displayed = Some(f.index);
    }
    Ok(read)
  }

  /// 定时器触发：令牌过期返回 `None`，否则读取一帧
  ///
  /// 读到末尾时回到循环起点继续，若起点也读不到帧则停止播放。
  pub fn tick<S: FrameSource>(
    &mut self,
    token: TickToken,
    source: &mut S,
  ) -> Result<Option<Tick>, S::Error> {
    if !self.is_current(token) {
      return Ok(None);
    }

    let frame = match source.read_next()? {
      Some(frame) => frame,
      None => {
        source.seek(self.loop_start)?;
        match source.read_next()? {
          Some(frame) => frame,
          None => {
            self.cancel();
            return Ok(None);
          }
        }
      }
    };

    self.displayed = Some(frame.index);
    Ok(Some(Tick {
      frame,
      delay: frame_delay(source.frame_rate()),
      next: token,
    }))
  }
}
