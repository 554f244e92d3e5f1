// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use url::Url;

use shanan_review::dataset::{
  DEFAULT_DATASET_ROOT, DEFAULT_LEGACY_ROOT, DEFAULT_OUTPUT_ROOT, Dataset, MediaKind, TaskFilter,
  UnitKey,
};

/// 标注审查工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待审查标注的根目录
  #[arg(long, default_value = DEFAULT_OUTPUT_ROOT, value_name = "DIR")]
  pub output_root: PathBuf,

  /// 媒体数据的根目录
  #[arg(long, default_value = DEFAULT_DATASET_ROOT, value_name = "DIR")]
  pub dataset_root: PathBuf,

  /// 旧标注的根目录
  #[arg(long, default_value = DEFAULT_LEGACY_ROOT, value_name = "DIR")]
  pub legacy_root: PathBuf,

  /// 相对 MOT 路径的解析根目录
  #[arg(long, value_name = "DIR")]
  pub mot_root: Option<PathBuf>,

  /// 抽帧目录的帧率，未给出时按 33 毫秒一帧播放
  #[arg(long, value_name = "FPS")]
  pub fps: Option<f64>,

  #[command(subcommand)]
  pub command: Command,
}

impl Args {
  pub fn dataset(&self) -> Dataset {
    Dataset::new(&self.output_root, &self.dataset_root, &self.legacy_root)
  }
}

/// 指定一个单元
#[derive(ClapArgs, Debug, Clone)]
pub struct UnitArgs {
  /// `sport/event`
  #[arg(long, value_name = "SPORT/EVENT")]
  pub event: String,

  /// clips 或 frames
  #[arg(long, default_value = "clips", value_name = "KIND")]
  pub kind: MediaKind,

  #[arg(long, value_name = "ID")]
  pub id: String,
}

impl UnitArgs {
  pub fn unit(&self) -> Option<UnitKey> {
    UnitKey::from_event(&self.event, self.kind, &self.id)
  }
}

/// 任务过滤参数
#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
  /// 只看这些任务，逗号分隔
  #[arg(long, value_delimiter = ',', value_name = "TASK_L2")]
  pub tasks: Vec<String>,

  /// 使用默认任务集合过滤
  #[arg(long, conflicts_with = "tasks")]
  pub default_tasks: bool,
}

impl FilterArgs {
  pub fn filter(&self) -> TaskFilter {
    if self.default_tasks {
      TaskFilter::default_tasks()
    } else if self.tasks.is_empty() {
      TaskFilter::any()
    } else {
      TaskFilter::only(self.tasks.iter())
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 列出所有 `sport/event`
  Events,
  /// 列出某事件下的全部 ID
  Ids {
    #[arg(long, value_name = "SPORT/EVENT")]
    event: String,
    #[arg(long, default_value = "clips", value_name = "KIND")]
    kind: MediaKind,
  },
  /// 打印单元内每条标注的摘要与关注帧
  Inspect {
    #[command(flatten)]
    unit: UnitArgs,
  },
  /// 查找下一个含未审核标注的单元
  NextUnreviewed {
    /// 从该单元之后开始查找
    #[arg(long, value_name = "SPORT/EVENT/KIND/ID")]
    after: Option<String>,
    #[arg(long, default_value = "clips", value_name = "KIND")]
    kind: MediaKind,
    #[command(flatten)]
    filter: FilterArgs,
  },
  /// 交互式审查，从标准输入读取命令
  Console {
    #[command(flatten)]
    unit: UnitArgs,
    #[command(flatten)]
    filter: FilterArgs,
    /// 渲染输出，例如 `log://` 或 `folder:///tmp/review`
    #[arg(long, default_value = "log://", value_name = "OUTPUT")]
    output: Url,
    /// 每次播放命令推进的帧数
    #[arg(long, default_value = "30", value_name = "COUNT")]
    step_frames: usize,
  },
  /// 播放当前标注的窗口
  Play {
    #[command(flatten)]
    unit: UnitArgs,
    /// 标注序号，从 0 开始
    #[arg(long, default_value = "0", value_name = "INDEX")]
    index: usize,
    #[arg(long, default_value = "log://", value_name = "OUTPUT")]
    output: Url,
    /// 最大播放帧数
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,
    /// 按帧率等待
    #[arg(long)]
    realtime: bool,
  },
}

/// 解析 `sport/event/kind/id`
pub fn parse_unit(value: &str) -> Option<UnitKey> {
  let mut parts = value.rsplitn(3, '/');
  let id = parts.next()?;
  let kind = parts.next()?.parse().ok()?;
  let event = parts.next()?;
  UnitKey::from_event(event, kind, id)
}
