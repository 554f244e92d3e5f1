// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 帧输入
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::dataset::Media;
use crate::{FromUrl, FromUrlWithScheme};

mod image_sequence;
mod read_image_file;

pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 解码后的一帧
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub image: RgbImage,
  /// 帧序号，从 0 开始
  pub index: u64,
}

/// 可定位的帧来源
pub trait FrameSource {
  type Error;

  fn seek(&mut self, frame_index: u64) -> Result<(), Self::Error>;

  /// 读取当前位置的帧并前进一帧，到达末尾返回 `None`
  fn read_next(&mut self) -> Result<Option<Frame>, Self::Error>;

  fn frame_count(&self) -> u64;

  /// 帧率未知时返回 `None`
  fn frame_rate(&self) -> Option<f64>;

  /// 下一次 `read_next` 将读取的帧序号
  fn position(&self) -> u64;
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("图像序列输入错误: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[error("不支持的媒体: {0}")]
  Unsupported(PathBuf),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// URL 路径部分按百分号编码解码
pub(crate) fn url_path(url: &Url) -> PathBuf {
  let raw = url.path();
  match urlencoding::decode(raw) {
    Ok(decoded) => PathBuf::from(decoded.into_owned()),
    Err(_) => PathBuf::from(raw),
  }
}

#[derive(Debug)]
pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageSequence(ImageSequenceInput),
}

impl InputWrapper {
  /// 按数据集中找到的媒体打开输入，视频容器不在此解码
  pub fn from_media(media: &Media, frame_rate: Option<f64>) -> Result<Self, InputError> {
    match media {
      Media::Image(path) => Ok(InputWrapper::ReadImageFile(ImageFileInput::open(path)?)),
      Media::FrameDirectory(path) => Ok(InputWrapper::ImageSequence(ImageSequenceInput::open(
        path, frame_rate,
      )?)),
      Media::Video(path) => Err(InputError::Unsupported(path.clone())),
    }
  }

  pub fn is_still(&self) -> bool {
    matches!(self, InputWrapper::ReadImageFile(_))
  }

  pub fn path(&self) -> &Path {
    match self {
      InputWrapper::ReadImageFile(input) => input.path(),
      InputWrapper::ImageSequence(input) => input.directory(),
    }
  }
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      ImageSequenceInput::SCHEME => Ok(InputWrapper::ImageSequence(
        ImageSequenceInput::from_url(url)?,
      )),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl FrameSource for InputWrapper {
  type Error = InputError;

  fn seek(&mut self, frame_index: u64) -> Result<(), Self::Error> {
    match self {
      InputWrapper::ReadImageFile(input) => input.seek(frame_index).map_err(InputError::from),
      InputWrapper::ImageSequence(input) => input.seek(frame_index).map_err(InputError::from),
    }
  }

  fn read_next(&mut self) -> Result<Option<Frame>, Self::Error> {
    match self {
      InputWrapper::ReadImageFile(input) => input.read_next().map_err(InputError::from),
      InputWrapper::ImageSequence(input) => input.read_next().map_err(InputError::from),
    }
  }

  fn frame_count(&self) -> u64 {
    match self {
      InputWrapper::ReadImageFile(input) => input.frame_count(),
      InputWrapper::ImageSequence(input) => input.frame_count(),
    }
  }

  fn frame_rate(&self) -> Option<f64> {
    match self {
      InputWrapper::ReadImageFile(input) => input.frame_rate(),
      InputWrapper::ImageSequence(input) => input.frame_rate(),
    }
  }

  fn position(&self) -> u64 {
    match self {
      InputWrapper::ReadImageFile(input) => input.position(),
      InputWrapper::ImageSequence(input) => input.position(),
    }
  }
}
