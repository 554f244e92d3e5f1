// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 叠加层绘制
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

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::annotation::BBox;
use crate::output::overlay::{Overlay, WindowMarker};

const BOX_THICKNESS: i32 = 2;
const MARKER_ORIGIN: (i32, i32) = (15, 15);
const MARKER_HEIGHT: u32 = 105;
const MARKER_CHAR_WIDTH: u32 = 48; // 粗略估计
const MARKER_MIN_WIDTH: u32 = 300;
const MARKER_BORDER: [u8; 3] = [255, 255, 255];

/// 只画几何形状，文字写入同名 `.txt` 记录
#[derive(Debug, Clone, Copy, Default)]
pub struct Draw;

impl Draw {
  /// 在图像上绘制矩形边框，坐标为像素坐标 `[x1, y1, x2, y2]`
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BBox, color: [u8; 3]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox.x1.min(bbox.x2).floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.y1.min(bbox.y2).floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.x1.max(bbox.x2).ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.y1.max(bbox.y2).ceil() as i32).clamp(0, h - 1);

    for t in 0..BOX_THICKNESS {
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  fn draw_marker(&self, image: &mut RgbImage, marker: &WindowMarker) {
    let width = (marker.text.chars().count() as u32 * MARKER_CHAR_WIDTH).max(MARKER_MIN_WIDTH);
    let (x, y) = MARKER_ORIGIN;
    let rect = Rect::at(x, y).of_size(width, MARKER_HEIGHT);
    draw_filled_rect_mut(image, rect, Rgb(marker.color));
    draw_hollow_rect_mut(image, rect, Rgb(MARKER_BORDER));
  }

  pub fn draw_overlay(&self, image: &mut RgbImage, overlay: &Overlay) {
    if let Some(marker) = &overlay.marker {
      self.draw_marker(image, marker);
    }
    for item in overlay.boxes.iter() {
      self.draw_bbox(image, &item.bbox, item.color);
    }
  }
}

/// 叠加层的文字记录
pub struct Record;

impl Record {
  pub fn record(&self, overlay: &Overlay, path: &Path) -> Result<(), std::io::Error> {
    let mut lines = vec![format!("frame, {}", overlay.frame)];
    lines.extend(overlay.describe());
    std::fs::write(path.with_extension("txt"), lines.join("\n"))?;
    Ok(())
  }
}
