// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_sequence.rs - 抽帧目录输入
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

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::dataset::{FRAME_EXTENSIONS, compare_ids};
use crate::input::{Frame, FrameSource, url_path};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("目录中没有图像: {0}")]
  Empty(PathBuf),
  #[error("帧率参数无效: {0}")]
  InvalidFrameRate(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误 {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
}

/// 把一个目录下的图像按文件名顺序当作片段播放
///
/// URL 形如 `frames:///path/to/dir?fps=25`。
#[derive(Debug)]
pub struct ImageSequenceInput {
  directory: PathBuf,
  frames: Vec<PathBuf>,
  frame_rate: Option<f64>,
  position: u64,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际为 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageSequenceInputError::SchemaMismatch);
    }

    let mut frame_rate = None;
    for (k, v) in url.query_pairs() {
      if k == "fps" {
        let fps = v
          .parse::<f64>()
          .ok()
          .filter(|fps| *fps > 0.0)
          .ok_or_else(|| ImageSequenceInputError::InvalidFrameRate(v.to_string()))?;
        frame_rate = Some(fps);
      }
    }

    Self::open(&url_path(url), frame_rate)
  }
}

fn file_stem(path: &Path) -> &str {
  path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

fn is_frame_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl ImageSequenceInput {
  pub fn open(directory: &Path, frame_rate: Option<f64>) -> Result<Self, ImageSequenceInputError> {
    let mut frames: Vec<PathBuf> = fs::read_dir(directory)?
      .filter_map(Result::ok)
      .map(|e| e.path())
      .filter(|p| p.is_file() && is_frame_image(p))
      .collect();
    if frames.is_empty() {
      return Err(ImageSequenceInputError::Empty(directory.to_path_buf()));
    }
    // 未补零的帧号按数值排序，`2.jpg` 在 `10.jpg` 之前
    frames.sort_by(|a, b| compare_ids(file_stem(a), file_stem(b)).then_with(|| a.cmp(b)));

    info!("打开图像序列 {}, 共 {} 帧", directory.display(), frames.len());
    Ok(Self {
      directory: directory.to_path_buf(),
      frames,
      frame_rate,
      position: 0,
    })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }
}

impl FrameSource for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  /// 超出末尾的位置会被截断到末尾
  fn seek(&mut self, frame_index: u64) -> Result<(), Self::Error> {
    self.position = frame_index.min(self.frame_count());
    Ok(())
  }

  fn read_next(&mut self) -> Result<Option<Frame>, Self::Error> {
    let Some(path) = self.frames.get(self.position as usize) else {
      return Ok(None);
    };
    let image = ImageReader::open(path)?
      .decode()
      .map_err(|source| ImageSequenceInputError::ImageLoadError {
        path: path.clone(),
        source,
      })?
      .to_rgb8();

    let index = self.position;
    self.position += 1;
    Ok(Some(Frame { image, index }))
  }

  fn frame_count(&self) -> u64 {
    self.frames.len() as u64
  }

  fn frame_rate(&self) -> Option<f64> {
    self.frame_rate
  }

  fn position(&self) -> u64 {
    self.position
  }
}
