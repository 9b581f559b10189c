use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::config::GridConfig;
use crate::types::{CellPos, GRID_SIZE};

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

/// Synthetic puzzle board: a 5x5 lattice of square tiles, optionally rotated
/// about the canvas center.
#[derive(Debug, Clone)]
pub(crate) struct TileLayout {
    pub origin: u32,
    pub tile: u32,
    pub gap: u32,
    pub rotation_deg: f32,
    pub skip: Option<CellPos>,
    pub background: [u8; 3],
    pub text_color: [u8; 3],
    pub glyph_scale: u32,
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            origin: 40,
            tile: 70,
            gap: 8,
            rotation_deg: 0.0,
            skip: None,
            background: [20, 20, 20],
            text_color: [255, 255, 255],
            glyph_scale: 4,
        }
    }
}

impl TileLayout {
    fn pitch(&self) -> u32 {
        self.tile + self.gap
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        let side = 2 * self.origin + GRID_SIZE as u32 * self.pitch() - self.gap;
        (side, side)
    }

    fn rotate(&self, (x, y): (f32, f32)) -> (f32, f32) {
        let (w, h) = self.canvas_size();
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let (dx, dy) = (x - cx, y - cy);
        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
    }

    fn upright_center(&self, row: usize, col: usize) -> (f32, f32) {
        let half = (self.tile - 1) as f32 / 2.0;
        (
            (self.origin + col as u32 * self.pitch()) as f32 + half,
            (self.origin + row as u32 * self.pitch()) as f32 + half,
        )
    }

    pub fn tile_center(&self, row: usize, col: usize) -> (f32, f32) {
        self.rotate(self.upright_center(row, col))
    }

    fn tile_corners(&self, row: usize, col: usize) -> Vec<Point<i32>> {
        let (cx, cy) = self.upright_center(row, col);
        let half = (self.tile - 1) as f32 / 2.0;
        [(-half, -half), (half, -half), (half, half), (-half, half)]
            .into_iter()
            .map(|(dx, dy)| {
                let (x, y) = self.rotate((cx + dx, cy + dy));
                Point::new(x.round() as i32, y.round() as i32)
            })
            .collect()
    }
}

/// Draws the board with `config.tile_color` tiles; `text` supplies the cell
/// contents (lines separated by `\n`). Text is drawn upright at the tile center.
pub(crate) fn draw_tile_grid<F>(layout: &TileLayout, config: &GridConfig, text: F) -> RgbImage
where
    F: Fn(CellPos) -> Option<&'static str>,
{
    let (w, h) = layout.canvas_size();
    let mut image = RgbImage::from_pixel(w, h, Rgb(layout.background));

    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let pos = CellPos::new(row, col);
            if layout.skip == Some(pos) {
                continue;
            }
            draw_polygon_mut(&mut image, &layout.tile_corners(row, col), Rgb(config.tile_color));
            if let Some(content) = text(pos) {
                draw_text(
                    &mut image,
                    layout.tile_center(row, col),
                    content,
                    layout.glyph_scale,
                    layout.text_color,
                );
            }
        }
    }
    image
}

/// 5x7 block font; every glyph is 4-connected.
pub(crate) fn glyph_pattern(ch: char) -> Option<[&'static str; 7]> {
    let pattern = match ch {
        '0' => ["#####", "#...#", "#...#", "#...#", "#...#", "#...#", "#####"],
        '1' => ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."],
        '2' => ["#####", "....#", "....#", "#####", "#....", "#....", "#####"],
        '3' => ["#####", "....#", "....#", ".####", "....#", "....#", "#####"],
        '4' => ["#...#", "#...#", "#...#", "#####", "....#", "....#", "....#"],
        '5' => ["#####", "#....", "#....", "#####", "....#", "....#", "#####"],
        '6' => ["#####", "#....", "#....", "#####", "#...#", "#...#", "#####"],
        '7' => ["#####", "....#", "....#", "....#", "....#", "....#", "....#"],
        '8' => ["#####", "#...#", "#...#", "#####", "#...#", "#...#", "#####"],
        '9' => ["#####", "#...#", "#...#", "#####", "....#", "....#", "#####"],
        _ => return None,
    };
    Some(pattern)
}

/// Draws `text` centered on `center`. Characters advance by one glyph plus one
/// font pixel; lines are separated by two font pixels. Unknown characters
/// (spaces) only advance.
pub(crate) fn draw_text(
    image: &mut RgbImage,
    center: (f32, f32),
    text: &str,
    scale: u32,
    color: [u8; 3],
) {
    let lines: Vec<&str> = text.lines().collect();
    let advance = (GLYPH_W + 1) * scale;
    let line_advance = (GLYPH_H + 2) * scale;
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
    let block_w = (widest * advance).saturating_sub(scale);
    let block_h = (lines.len() as u32 * line_advance).saturating_sub(2 * scale);

    let left = center.0.round() as i32 - (block_w / 2) as i32;
    let top = center.1.round() as i32 - (block_h / 2) as i32;

    for (li, line) in lines.iter().enumerate() {
        let y = top + (li as u32 * line_advance) as i32;
        for (ci, ch) in line.chars().enumerate() {
            let x = left + (ci as u32 * advance) as i32;
            let Some(pattern) = glyph_pattern(ch) else {
                continue;
            };
            for (py, bits) in pattern.iter().enumerate() {
                for (px, bit) in bits.chars().enumerate() {
                    if bit == '#' {
                        draw_filled_rect_mut(
                            image,
                            Rect::at(x + (px as u32 * scale) as i32, y + (py as u32 * scale) as i32)
                                .of_size(scale, scale),
                            Rgb(color),
                        );
                    }
                }
            }
        }
    }
}

/// A tightly cropped binary mask of `ch` (foreground 255).
pub(crate) fn glyph_mask(ch: char, scale: u32) -> GrayImage {
    let pattern = glyph_pattern(ch).unwrap_or(["....."; 7]);
    let used: Vec<usize> = (0..GLYPH_W as usize)
        .filter(|&px| pattern.iter().any(|row| row.as_bytes()[px] == b'#'))
        .collect();
    let first = used.first().copied().unwrap_or(0) as u32;
    let last = used.last().copied().unwrap_or(0) as u32;
    let width = (last - first + 1) * scale;

    GrayImage::from_fn(width, GLYPH_H * scale, |x, y| {
        let px = (first + x / scale) as usize;
        let py = (y / scale) as usize;
        if pattern[py].as_bytes()[px] == b'#' {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Light text of `text` on a plain dark cell of the given size.
pub(crate) fn text_cell(text: &str, size: u32, scale: u32) -> RgbImage {
    let mut cell = RgbImage::from_pixel(size, size, Rgb([40, 60, 90]));
    let center = (size as f32 / 2.0, size as f32 / 2.0);
    draw_text(&mut cell, center, text, scale, [255, 255, 255]);
    cell
}
