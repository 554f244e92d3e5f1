// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 播放任务
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

use std::sync::mpsc::Receiver;
use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::input::Frame;
use crate::output::{Overlay, Render};
use crate::session::ReviewSession;

pub trait Task<O>: Sized {
  type Error;
  fn run_task(self, session: &mut ReviewSession, output: &O) -> Result<(), Self::Error>;
}

/// 注册 Ctrl-C 处理，收到信号后通过通道通知任务循环
///
/// 循环 30 秒内没有退出时强制结束进程。
pub fn interrupt_channel() -> Result<Receiver<()>, ctrlc::Error> {
  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

/// 按定时器连续播放当前标注，每帧交给输出渲染
#[derive(Default)]
pub struct PlaybackTask {
  max_frames: Option<usize>,
  interrupt: Option<Receiver<()>>,
  /// 是否按帧率等待，关闭时尽快播放
  realtime: bool,
}

impl PlaybackTask {
  pub fn with_max_frames(mut self, max_frames: Option<usize>) -> Self {
    self.max_frames = max_frames;
    self
  }

  pub fn with_interrupt(mut self, interrupt: Receiver<()>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  pub fn with_realtime(mut self, realtime: bool) -> Self {
    self.realtime = realtime;
    self
  }

  fn interrupted(&self) -> bool {
    self.interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok())
  }
}

impl<RE, O> Task<O> for PlaybackTask
where
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, Overlay, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, session: &mut ReviewSession, output: &O) -> Result<(), Self::Error> {
    info!("开始播放 {}", session.unit());
    session.render_shown(output)?;

    let Some(mut token) = session.playing_token() else {
      warn!("当前单元没有可播放的片段");
      return Ok(());
    };

    let mut frame_number = 0;
    while let Some(tick) = session.tick(token)? {
      frame_number += 1;
      let overlay = session.overlay(tick.frame.index);
      output.render_result(&tick.frame, &overlay)?;
      if self.max_frames.is_some_and(|n| frame_number >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_number);
        break;
      }
      if self.interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if self.realtime {
        thread::sleep(tick.delay);
      }
      token = tick.next;
    }

    info!("播放结束, 共 {} 帧", frame_number);
    Ok(())
  }
}
