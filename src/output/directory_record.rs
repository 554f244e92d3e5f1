// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::input::{Frame, url_path};
use crate::output::Render;
use crate::output::draw::{Draw, Record};
use crate::output::overlay::Overlay;
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug)]
pub enum DrawWrapper {
  /// 把叠加层画到帧上，同时写文字记录
  Draw(Draw),
  /// 保存原始帧，只写文字记录
  Record,
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    overlay: &Overlay,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        let mut image = frame.image.clone();
        draw.draw_overlay(&mut image, overlay);
        image.save(path)?;
      }
      DrawWrapper::Record => {
        frame.image.save(path)?;
      }
    };
    Record.record(overlay, path)?;

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record" => DrawWrapper::Record,
      _ => DrawWrapper::Draw(Draw),
    }
  }
}

/// 按日期分目录保存渲染结果，URL 形如 `folder:///snapshots?always`
#[derive(Debug)]
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = if uri.query_pairs().any(|(k, _)| k == "record") {
      "record"
    } else {
      "draw"
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: url_path(uri),
      draw: DrawWrapper::with(kind),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, Overlay> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  /// 叠加层为空时跳过，除非设置了 `always`
  fn render_result(&self, frame: &Frame, overlay: &Overlay) -> Result<(), Self::Error> {
    if !self.always && overlay.is_empty() {
      return Ok(());
    }
    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, overlay)?;
    debug!("已保存第 {} 帧: {}", frame.index, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::overlay::WindowMarker;
  use image::RgbImage;
  use walkdir::WalkDir;

  fn saved_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
      .into_iter()
      .filter_map(Result::ok)
      .filter(|e| e.file_type().is_file())
      .map(|e| e.into_path())
      .collect()
  }

  #[test]
  fn writes_dated_png_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = Frame {
      image: RgbImage::new(32, 32),
      index: 4,
    };
    output.render_result(&frame, &Overlay::default()).unwrap();
    assert!(saved_files(dir.path()).is_empty());

    let overlay = Overlay {
      frame: 4,
      boxes: Vec::new(),
      marker: WindowMarker::from_label("Q_END"),
    };
    output.render_result(&frame, &overlay).unwrap();

    let mut files = saved_files(dir.path());
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files[0].extension().is_some_and(|e| e == "png"));
    assert!(files[1].extension().is_some_and(|e| e == "txt"));
    assert_eq!(files[0].strip_prefix(dir.path()).unwrap().components().count(), 4);
  }

  #[test]
  fn always_keeps_empty_frames() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?always&record", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let frame = Frame {
      image: RgbImage::new(8, 8),
      index: 0,
    };
    output.render_result(&frame, &Overlay::default()).unwrap();
    assert_eq!(saved_files(dir.path()).len(), 2);
  }
}
