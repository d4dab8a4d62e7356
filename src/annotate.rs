//! 结果叠加绘制
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::Bbox;

/// 类别配色, 按类别 id 轮转
pub const COLOR_PALETTE: [(u8, u8, u8); 4] =
    [(0, 255, 255), (0, 255, 0), (255, 255, 0), (0, 0, 255)];

pub fn load_font(path: &str) -> Result<FontArc> {
    let bytes = std::fs::read(path).with_context(|| format!("font not found: {path}"))?;
    FontArc::try_from_vec(bytes).with_context(|| format!("invalid font file: {path}"))
}

fn hollow_rect(img: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    draw_hollow_rect_mut(img, Rect::at(x, y).of_size(w, h), color);
    // 两像素线宽
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(img, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
    }
}

/// 画检测框, 给了字体时在框上方写类别名
pub fn draw_detections(
    img: &mut RgbImage,
    boxes: &[Bbox],
    names: &[String],
    font: Option<&FontArc>,
) {
    for b in boxes {
        let (r, g, bl) = COLOR_PALETTE[b.id() % COLOR_PALETTE.len()];
        let color = Rgb([r, g, bl]);
        let x = b.xmin().round() as i32;
        let y = b.ymin().round() as i32;
        let w = b.width().round().max(1.0) as u32;
        let h = b.height().round().max(1.0) as u32;
        hollow_rect(img, x, y, w, h, color);

        if let (Some(font), Some(name)) = (font, names.get(b.id())) {
            let label_y = (y - 20).max(0);
            draw_filled_rect_mut(img, Rect::at(x, label_y).of_size(w.max(40), 20), color);
            draw_text_mut(
                img,
                Rgb([0, 0, 0]),
                x + 2,
                label_y + 4,
                PxScale::from(14.0),
                font,
                name,
            );
        }
    }
}

/// 画模板匹配命中框 (红色, 模板尺寸)
pub fn draw_matches(img: &mut RgbImage, points: &[(u32, u32)], tw: u32, th: u32) {
    for &(x, y) in points {
        hollow_rect(img, x as i32, y as i32, tw, th, Rgb([255, 0, 0]));
    }
}
