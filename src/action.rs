use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::assemble::{LabeledLine, assemble_cell};
use crate::config::ScanConfig;
use crate::detect::{
    find_highlighted_corners, locate_grid_in_mask, rectify_grid, rectify_single_cell, tile_mask,
    validate_corners,
};
use crate::error::ScanResult;
use crate::ocr::{FallbackClassifier, GlyphClassifier, TemplateSet};
use crate::segment::{binarize_cell, segment_binarized};
use crate::store::{DebugSink, GlyphStore, LabelStore, debug};
use crate::types::{CellPos, RecognitionIssue, RecognitionResult};

/// Everything a scan reads: calibration, the template set and the stores
/// glyphs and debug images are written to.
pub struct ScanContext {
    pub config: ScanConfig,
    pub templates: TemplateSet,
    pub fallback: Arc<dyn FallbackClassifier>,
    pub glyphs: GlyphStore,
    pub debug: DebugSink,
}

impl ScanContext {
    pub fn new(
        config: ScanConfig,
        templates: TemplateSet,
        fallback: Arc<dyn FallbackClassifier>,
    ) -> Self {
        let glyphs = GlyphStore::from_config(&config.store);
        let debug = DebugSink::new(config.store.debug_dir.as_deref());
        Self {
            config,
            templates,
            fallback,
            glyphs,
            debug,
        }
    }

    /// Loads the template set from the configured label store.
    pub fn load(config: ScanConfig, fallback: Arc<dyn FallbackClassifier>) -> ScanResult<Self> {
        let templates = LabelStore::from_config(&config.store).load_templates()?;
        Ok(Self::new(config, templates, fallback))
    }
}

/// Value and soft failures of a single highlighted cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellRecognition {
    pub text: String,
    pub issues: Vec<RecognitionIssue>,
}

/// Full pipeline: locate the 25 tiles, rectify, then recognize every cell.
/// Hard failures abort before any cell is recognized.
pub fn scan_grid(image: &RgbImage, ctx: &ScanContext) -> ScanResult<RecognitionResult> {
    let now = Instant::now();
    info!("Start scan_grid on {}x{}", image.width(), image.height());

    ctx.debug.reset();
    ctx.debug.save_rgb("00_screenshot", image);

    let mask = tile_mask(image, &ctx.config.grid);
    ctx.debug.save_gray("10_tile_mask", &mask);

    let grid = locate_grid_in_mask(&mask, &ctx.config.grid)?;
    if ctx.debug.is_enabled() {
        ctx.debug.save_rgb("30_tiles_overlay", &debug::draw_tiles(image, &grid));
        ctx.debug
            .save_rgb("49_grid_corners", &debug::draw_corners(image, &grid.outer_centers()));
    }

    let rectified = rectify_grid(image, &grid, ctx.config.grid.buffer)?;
    ctx.debug.save_rgb("50_grid_warped", &rectified.image);

    let mut result = RecognitionResult::default();
    for (pos, cell) in rectified.cells() {
        let value = recognize_cell(&cell, pos, ctx, &mut result.issues);
        info!("Cell {pos}: {value:?}");
        result.cells[pos.row][pos.col] = value;
    }

    let elapsed = now.elapsed();
    info!(
        "End scan_grid elapsed: {elapsed:.2?} ({} unresolved glyphs)",
        result.unresolved_count()
    );
    Ok(result)
}

/// Recognizes the one cell framed by the four highlight markers.
pub fn scan_single_cell(image: &RgbImage, ctx: &ScanContext) -> ScanResult<CellRecognition> {
    let now = Instant::now();
    info!("Start scan_single_cell");

    ctx.debug.reset();
    ctx.debug.save_rgb("00_screenshot", image);

    let highlight = &ctx.config.highlight;
    let corners = find_highlighted_corners(image, highlight)?;
    validate_corners(&corners, highlight)?;
    if ctx.debug.is_enabled() {
        ctx.debug
            .save_rgb("49_grid_corners", &debug::draw_corners(image, &corners));
    }

    let cell = rectify_single_cell(image, corners, highlight.cell_size)?;
    let mut issues = Vec::new();
    let text = recognize_cell(&cell, CellPos::new(0, 0), ctx, &mut issues);

    let elapsed = now.elapsed();
    info!("End scan_single_cell elapsed: {elapsed:.2?} -> {text:?}");
    Ok(CellRecognition { text, issues })
}

/// Segments, classifies and assembles one rectified cell. Unresolved glyphs
/// are persisted for labeling and reported in `issues`.
pub fn recognize_cell(
    cell: &RgbImage,
    pos: CellPos,
    ctx: &ScanContext,
    issues: &mut Vec<RecognitionIssue>,
) -> String {
    let config = &ctx.config;
    let classifier = GlyphClassifier::new(&ctx.templates, ctx.fallback.as_ref(), &config.classifier);

    let mask = binarize_cell(cell);
    let lines = segment_binarized(cell, &mask, &config.segment);
    if ctx.debug.is_enabled() {
        ctx.debug.save_rgb(&format!("cell_{pos}_cell"), cell);
        ctx.debug.save_gray(&format!("cell_{pos}_thresh"), &mask);
        ctx.debug
            .save_rgb(&format!("cell_{pos}_split"), &debug::draw_glyphs(cell, &lines));
    }

    let mut labeled = Vec::with_capacity(lines.len());
    let mut recognized = Vec::new();
    let mut index = 0;

    for line in &lines {
        let mut labels = Vec::with_capacity(line.glyphs.len());
        for glyph in &line.glyphs {
            let classification = classifier.classify(&glyph.mask);

            if classification.is_unknown() {
                issues.push(RecognitionIssue::GlyphUnresolved {
                    cell: pos,
                    index,
                    score: Some(classification.confidence),
                });
                match ctx.glyphs.save_unknown(pos, index, &glyph.mask) {
                    Ok(path) => info!("Saved unresolved glyph to {}", path.display()),
                    Err(e) => warn!("Failed to save unresolved glyph {pos}/{index}: {e}"),
                }
            }
            if config.store.collect_all_glyphs {
                if let Err(e) =
                    ctx.glyphs
                        .save_labeled(pos, index, &classification.label, &glyph.mask)
                {
                    warn!("Failed to save glyph {pos}/{index}: {e}");
                }
            }

            recognized.push((glyph.bbox, classification.source));
            labels.push(classification.label);
            index += 1;
        }
        labeled.push(LabeledLine::new(labels, line.boxes()));
    }

    if ctx.debug.is_enabled() {
        ctx.debug.save_rgb(
            &format!("cell_{pos}_recognized"),
            &debug::draw_recognized(cell, &recognized),
        );
    }

    let value = assemble_cell(&labeled, config.assemble.gap_ratio);
    if value.ambiguous {
        warn!("Cell {pos}: ambiguous split of {} lines", lines.len());
        issues.push(RecognitionIssue::AssemblyAmbiguous {
            cell: pos,
            line_count: lines.len(),
        });
    }
    value.text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanError;
    use crate::ocr::NoFallback;
    use crate::test_util::{TileLayout, draw_text, draw_tile_grid};
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use std::path::Path;

    const DIGITS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

    fn digit_at(pos: CellPos) -> &'static str {
        DIGITS[(pos.row * 5 + pos.col) % 10]
    }

    fn config_in(dir: &Path) -> ScanConfig {
        let mut config = ScanConfig::default();
        config.grid.tile_color = [40, 60, 90];
        config.store.label_file = dir.join("char_labels.csv");
        config.store.labeled_dir = dir.join("all_chars");
        config.store.unknown_dir = dir.join("unknown_chars");
        config.store.debug_dir = Some(dir.join("debug"));
        config
    }

    fn digit_board(config: &ScanConfig) -> RgbImage {
        let layout = TileLayout {
            origin: 30,
            tile: 60,
            gap: 4,
            ..TileLayout::default()
        };
        draw_tile_grid(&layout, &config.grid, |pos| Some(digit_at(pos)))
    }

    /// `char_{row}_{col}_{index}_{label}.png` -> cell position.
    fn cell_of(file_name: &str) -> CellPos {
        let parts: Vec<&str> = file_name.split('_').collect();
        CellPos::new(parts[1].parse().unwrap(), parts[2].parse().unwrap())
    }

    #[test]
    fn unlabeled_board_is_all_unknown_then_learned() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.store.collect_all_glyphs = true;
        let image = digit_board(&config);

        let first = ScanContext::load(config.clone(), Arc::new(NoFallback)).unwrap();
        let result = scan_grid(&image, &first).unwrap();

        assert!(result.cells.iter().flatten().all(|cell| cell == "?"));
        assert_eq!(result.unresolved_count(), 25);
        assert!(dir.path().join("unknown_chars").join("char_4_2_0.png").exists());
        assert!(dir.path().join("debug").join("50_grid_warped.png").exists());

        let store = LabelStore::from_config(&config.store);
        let unlabeled = store.unlabeled_images().unwrap();
        assert_eq!(unlabeled.len(), 25);
        for name in &unlabeled {
            store.append_label(name, digit_at(cell_of(name))).unwrap();
        }

        config.store.collect_all_glyphs = false;
        let second = ScanContext::load(config, Arc::new(NoFallback)).unwrap();
        let result = scan_grid(&image, &second).unwrap();

        for row in 0..5 {
            for col in 0..5 {
                let pos = CellPos::new(row, col);
                assert_eq!(result.get(pos), digit_at(pos), "cell {pos}");
            }
        }
        assert!(result.issues.is_empty(), "{:?}", result.issues);
    }

    #[test]
    fn missing_grid_aborts_without_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ScanContext::new(config_in(dir.path()), TemplateSet::new(), Arc::new(NoFallback));
        let image = RgbImage::from_pixel(200, 200, Rgb([20, 20, 20]));

        let result = scan_grid(&image, &ctx);

        assert!(matches!(result, Err(ScanError::InsufficientTiles { found: 0 })));
    }

    fn highlighted_cell(text: &str) -> RgbImage {
        let mut image = RgbImage::from_pixel(200, 200, Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut image, Rect::at(50, 50).of_size(100, 100), Rgb([40, 60, 90]));
        for (x, y) in [(50, 50), (150, 50), (150, 150), (50, 150)] {
            draw_filled_rect_mut(
                &mut image,
                Rect::at(x - 2, y - 2).of_size(5, 5),
                Rgb([0x00, 0x47, 0xA5]),
            );
        }
        draw_text(&mut image, (100.0, 100.0), text, 4, [255, 255, 255]);
        image
    }

    #[test]
    fn highlighted_cell_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let image = highlighted_cell("7");

        let first = ScanContext::load(config.clone(), Arc::new(NoFallback)).unwrap();
        let unknown = scan_single_cell(&image, &first).unwrap();
        assert_eq!(unknown.text, "?");
        assert!(matches!(
            unknown.issues.as_slice(),
            [RecognitionIssue::GlyphUnresolved { index: 0, .. }]
        ));

        let saved = dir.path().join("unknown_chars").join("char_0_0_0.png");
        let mut templates = TemplateSet::new();
        templates.insert("7", &image::open(saved).unwrap().to_luma8());
        let second = ScanContext::new(config, templates, Arc::new(NoFallback));

        let known = scan_single_cell(&image, &second).unwrap();
        assert_eq!(known.text, "7");
        assert!(known.issues.is_empty());
    }

    #[test]
    fn cell_without_markers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ScanContext::new(config_in(dir.path()), TemplateSet::new(), Arc::new(NoFallback));
        let image = RgbImage::from_pixel(100, 100, Rgb([20, 20, 20]));

        let result = scan_single_cell(&image, &ctx);

        assert!(matches!(result, Err(ScanError::HighlightNotFound { found: 0 })));
    }
}
