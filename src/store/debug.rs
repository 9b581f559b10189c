use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use log::{debug, warn};

use crate::detect::TileGrid;
use crate::ocr::LabelSource;
use crate::segment::Line;
use crate::types::BoundingBox;

const TILE_OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const CORNER_MARK: Rgb<u8> = Rgb([255, 0, 255]);
const GLYPH_OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Optional directory of intermediate images. Failures to write are logged
/// and never affect the scan.
#[derive(Debug, Clone, Default)]
pub struct DebugSink {
    dir: Option<PathBuf>,
}

impl DebugSink {
    pub fn new(dir: Option<&Path>) -> Self {
        Self {
            dir: dir.map(Path::to_path_buf),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Removes the images of the previous scan. Only `.png` files directly in
    /// the directory are deleted; other files and subdirectories stay.
    pub fn reset(&self) {
        let Some(dir) = &self.dir else {
            return;
        };
        if let Err(e) = fs::create_dir_all(dir) {
            warn!("Failed to create debug dir {}: {e}", dir.display());
            return;
        }
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list debug dir {}: {e}", dir.display());
                return;
            }
        };
        for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "png") {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }

    pub fn save_rgb(&self, name: &str, image: &RgbImage) {
        if let Some(path) = self.path(name) {
            log_failure(&path, image.save(&path));
        }
    }

    pub fn save_gray(&self, name: &str, image: &GrayImage) {
        if let Some(path) = self.path(name) {
            log_failure(&path, image.save(&path));
        }
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{name}.png")))
    }
}

fn log_failure(path: &Path, result: image::ImageResult<()>) {
    match result {
        Ok(()) => debug!("Saved {}", path.display()),
        Err(e) => warn!("Failed to save {}: {e}", path.display()),
    }
}

pub fn draw_tiles(image: &RgbImage, grid: &TileGrid) -> RgbImage {
    let mut overlay = image.clone();
    for tile in grid.tiles() {
        draw_hollow_rect_mut(&mut overlay, tile.bbox.to_rect(), TILE_OUTLINE);
    }
    overlay
}

/// The four reference centers used for rectification.
pub fn draw_corners(image: &RgbImage, corners: &[(f32, f32)]) -> RgbImage {
    let mut overlay = image.clone();
    for &(x, y) in corners {
        draw_cross_mut(&mut overlay, CORNER_MARK, x.round() as i32, y.round() as i32);
    }
    overlay
}

/// Glyph boxes drawn over a cell image.
pub fn draw_glyphs(cell: &RgbImage, lines: &[Line]) -> RgbImage {
    let mut overlay = cell.clone();
    for glyph in lines.iter().flat_map(|line| &line.glyphs) {
        draw_hollow_rect_mut(&mut overlay, glyph.bbox.to_rect(), GLYPH_OUTLINE);
    }
    overlay
}

/// Glyph boxes colored by the stage that labeled them.
pub fn draw_recognized(cell: &RgbImage, glyphs: &[(BoundingBox, LabelSource)]) -> RgbImage {
    let mut overlay = cell.clone();
    for (bbox, source) in glyphs {
        let color = match source {
            LabelSource::Template => Rgb([0, 255, 0]),
            LabelSource::Fallback => Rgb([255, 255, 0]),
            LabelSource::Unknown => GLYPH_OUTLINE,
        };
        draw_hollow_rect_mut(&mut overlay, bbox.to_rect(), color);
    }
    overlay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_previous_scan() {
        let dir = tempfile::tempdir().unwrap();
        let debug_dir = dir.path().join("debug");
        let sink = DebugSink::new(Some(debug_dir.as_path()));

        sink.reset();
        sink.save_gray("old", &GrayImage::new(3, 3));
        assert!(debug_dir.join("old.png").exists());

        sink.reset();
        sink.save_rgb("new", &RgbImage::new(3, 3));

        assert!(!debug_dir.join("old.png").exists());
        assert!(debug_dir.join("new.png").exists());
    }

    #[test]
    fn reset_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        let nested = dir.path().join("nested");
        fs::write(&notes, "keep").unwrap();
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("inner.png"), "keep").unwrap();
        let sink = DebugSink::new(Some(dir.path()));
        sink.save_gray("stage", &GrayImage::new(2, 2));

        sink.reset();

        assert!(!dir.path().join("stage.png").exists());
        assert!(notes.exists());
        assert!(nested.join("inner.png").exists());
    }

    #[test]
    fn disabled_sink_writes_nothing() {
        let sink = DebugSink::disabled();

        sink.reset();
        sink.save_rgb("x", &RgbImage::new(2, 2));

        assert!(!sink.is_enabled());
    }
}
