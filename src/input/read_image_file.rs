// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::input::{Frame, FrameSource, url_path};
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单帧模式：整段只有一张图
#[derive(Debug)]
pub struct ImageFileInput {
  path: PathBuf,
  image: RgbImage,
  consumed: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际为 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }
    Self::open(&url_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: &Path) -> Result<Self, ImageFileInputError> {
    let image = ImageReader::open(path)?.decode()?.to_rgb8();
    Ok(ImageFileInput {
      path: path.to_path_buf(),
      image,
      consumed: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }
}

impl FrameSource for ImageFileInput {
  type Error = ImageFileInputError;

  /// 只有第 0 帧，任意定位都回到这一帧
  fn seek(&mut self, _frame_index: u64) -> Result<(), Self::Error> {
    self.consumed = false;
    Ok(())
  }

  fn read_next(&mut self) -> Result<Option<Frame>, Self::Error> {
    if self.consumed {
      return Ok(None);
    }
    self.consumed = true;
    Ok(Some(Frame {
      image: self.image.clone(),
      index: 0,
    }))
  }

  fn frame_count(&self) -> u64 {
    1
  }

  fn frame_rate(&self) -> Option<f64> {
    None
  }

  fn position(&self) -> u64 {
    u64::from(self.consumed)
  }
}
