// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/sync_legacy.rs - 旧标注批量同步
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use shanan_review::dataset::{DEFAULT_LEGACY_ROOT, DEFAULT_OUTPUT_ROOT};
use shanan_review::legacy::sync::sync_tree;

/// 把旧标注中已审核的内容同步到新标注
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 新标注根目录
  #[arg(long, default_value = DEFAULT_OUTPUT_ROOT, value_name = "DIR")]
  pub new_root: PathBuf,
  /// 旧标注根目录
  #[arg(long, default_value = DEFAULT_LEGACY_ROOT, value_name = "DIR")]
  pub old_root: PathBuf,
  /// 只统计，不写回文件
  #[arg(long)]
  pub dry_run: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("新标注目录: {}", args.new_root.display());
  info!("旧标注目录: {}", args.old_root.display());

  let report = sync_tree(&args.new_root, &args.old_root, args.dry_run);

  println!("同步的标注数: {}", report.annotations);
  println!("更新的文件数: {}", report.files.len());
  for path in &report.files {
    println!("  {}", path.display());
  }
  if report.dry_run {
    println!("(dry run, 未写入任何文件)");
  }

  Ok(())
}
