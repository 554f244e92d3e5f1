// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::io::BufRead;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

use shanan_review::{
  FromUrl,
  dataset::{Dataset, UnitKey},
  navigation::PointFinder,
  output::OutputWrapper,
  session::{Command, Notice, ReviewSession},
  task::{PlaybackTask, Task, interrupt_channel},
};

use args::{Args, UnitArgs};

fn open_session(args: &Args, dataset: Dataset, unit: &UnitArgs) -> Result<ReviewSession> {
  let unit = unit
    .unit()
    .ok_or_else(|| anyhow!("事件应为 sport/event 形式: {}", unit.event))?;
  let finder = PointFinder::default().with_mot_root(args.mot_root.clone());
  let session = ReviewSession::open_with(dataset, unit.clone(), finder, args.fps)
    .with_context(|| format!("无法打开 {}", unit))?;
  Ok(session)
}

fn inspect(session: &mut ReviewSession) -> Result<()> {
  let total = session.review_set().len();
  for index in 0..total {
    if index > 0 {
      session.handle(Command::Next)?;
    }
    for line in session.describe() {
      println!("{}", line);
    }
    let points = session.waypoints();
    println!("BBox Frames: {:?}", points.bbox);
    let window: Vec<String> = points
      .window
      .iter()
      .map(|p| format!("{}@{}", p.label, p.frame))
      .collect();
    println!("Window Frames: [{}]", window.join(", "));
    println!();
  }
  Ok(())
}

fn console(
  mut session: ReviewSession,
  filter: &shanan_review::dataset::TaskFilter,
  output: &OutputWrapper,
  step_frames: usize,
) -> Result<()> {
  for line in session.describe() {
    println!("{}", line);
  }
  session.render_shown(output)?;

  let stdin = std::io::stdin();
  for line in stdin.lock().lines() {
    let line = line?;
    let line = line.trim();
    match line {
      "" => continue,
      "q" | "quit" => break,
      "i" | "info" => {
        session.describe().iter().for_each(|l| println!("{}", l));
        continue;
      }
      "u" | "next-unreviewed" => {
        match session.next_unreviewed(filter)? {
          Some(unit) => println!("已跳转到 {}", unit),
          None => println!("没有下一个未审核文件"),
        }
        session.render_shown(output)?;
        continue;
      }
      _ => {}
    }

    let command: Command = match line.parse() {
      Ok(command) => command,
      Err(e) => {
        println!("{}", e);
        continue;
      }
    };

    match session.handle(command) {
      Ok(Notice::Playing(_)) => {
        PlaybackTask::default()
          .with_max_frames(Some(step_frames))
          .run_task(&mut session, output)?;
      }
      Ok(notice) => {
        let text = notice.to_string();
        if !text.is_empty() {
          println!("{}", text);
        }
        session.render_shown(output)?;
      }
      Err(e) => {
        warn!("命令执行失败: {}", e);
        println!("错误: {}", e);
      }
    }
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let dataset = args.dataset();
  info!("标注目录: {}", dataset.output_root.display());
  info!("数据目录: {}", dataset.dataset_root.display());
  info!("旧数据目录: {}", dataset.legacy_root.display());

  match &args.command {
    args::Command::Events => {
      for event in dataset.events() {
        println!("{}", event);
      }
    }
    args::Command::Ids { event, kind } => {
      for id in dataset.ids(event, *kind) {
        println!("{}", id);
      }
    }
    args::Command::Inspect { unit } => {
      let mut session = open_session(&args, dataset.clone(), unit)?;
      inspect(&mut session)?;
    }
    args::Command::NextUnreviewed {
      after,
      kind,
      filter,
    } => {
      let current: Option<UnitKey> = match after {
        Some(after) => {
          Some(args::parse_unit(after).ok_or_else(|| anyhow!("无法解析单元: {}", after))?)
        }
        None => None,
      };
      match dataset.next_unreviewed(current.as_ref(), *kind, &filter.filter()) {
        Some(unit) => println!("{}", unit),
        None => println!("没有下一个未审核文件"),
      }
    }
    args::Command::Console {
      unit,
      filter,
      output,
      step_frames,
    } => {
      let session = open_session(&args, dataset.clone(), unit)?;
      let output = OutputWrapper::from_url(output)?;
      console(session, &filter.filter(), &output, *step_frames)?;
    }
    args::Command::Play {
      unit,
      index,
      output,
      max_frames,
      realtime,
    } => {
      let mut session = open_session(&args, dataset.clone(), unit)?;
      for _ in 0..*index {
        if session.handle(Command::Next)? == Notice::AtBoundary {
          break;
        }
      }
      let output = OutputWrapper::from_url(output)?;
      PlaybackTask::default()
        .with_max_frames(*max_frames)
        .with_realtime(*realtime)
        .with_interrupt(interrupt_channel()?)
        .run_task(&mut session, &output)?;
    }
  }

  Ok(())
}
