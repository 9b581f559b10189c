use image::{GenericImageView, GrayImage, RgbImage};
use imageproc::region_labelling::{Connectivity, connected_components};
use log::debug;

use crate::config::SegmentConfig;
use crate::types::BoundingBox;

pub mod binarize;
pub mod boxes;
pub(crate) mod components;

pub use binarize::{
    FOREGROUND, binarize_cell, binarize_foreground, is_binary_mask, threshold_keep_polarity,
};

/// One isolated character inside a cell.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Position inside the cell image.
    pub bbox: BoundingBox,
    pub line: usize,
    /// Crop of the source cell.
    pub image: RgbImage,
    /// Crop of the binarized cell, foreground 255.
    pub mask: GrayImage,
}

/// Glyphs of one text line, left to right.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub glyphs: Vec<Glyph>,
}

impl Line {
    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.glyphs.iter().map(|g| g.bbox).collect()
    }
}

/// Foreground boxes of a binarized cell after area filtering, optional merging
/// and containment filtering.
pub fn glyph_boxes(mask: &GrayImage, config: &SegmentConfig) -> Vec<BoundingBox> {
    let labels = connected_components(mask, Connectivity::Eight, image::Luma([0u8]));
    let mut boxes: Vec<BoundingBox> = components::component_stats(&labels)
        .into_iter()
        .filter(|stats| stats.area >= config.min_component_area)
        .map(|stats| stats.bbox)
        .collect();

    if config.merge_boxes {
        boxes = boxes::merge_boxes(&boxes, config.merge_x_gap, config.merge_y_gap);
    }
    boxes::filter_contained_boxes(&boxes, config.contain_epsilon)
}

/// Splits a rectified cell into lines of glyphs, top to bottom.
pub fn segment_cell(cell: &RgbImage, config: &SegmentConfig) -> Vec<Line> {
    segment_binarized(cell, &binarize_cell(cell), config)
}

/// Like [`segment_cell`] with the binarized cell already computed.
pub fn segment_binarized(cell: &RgbImage, mask: &GrayImage, config: &SegmentConfig) -> Vec<Line> {
    let boxes = glyph_boxes(mask, config);

    let lines: Vec<Line> = boxes::group_into_lines(&boxes, config.line_gap)
        .into_iter()
        .enumerate()
        .map(|(line, members)| {
            let line_boxes: Vec<BoundingBox> = members.iter().map(|&i| boxes[i]).collect();
            let glyphs = boxes::cluster_line(&line_boxes, config.cluster_overlap)
                .into_iter()
                .map(|bbox| Glyph {
                    bbox,
                    line,
                    image: crop(cell, bbox),
                    mask: crop(mask, bbox),
                })
                .collect();
            Line { glyphs }
        })
        .collect();

    debug!(
        "Segmented {} glyphs in {} lines",
        lines.iter().map(|l| l.glyphs.len()).sum::<usize>(),
        lines.len()
    );
    lines
}

pub(crate) fn crop<I>(
    image: &I,
    bbox: BoundingBox,
) -> image::ImageBuffer<I::Pixel, Vec<<I::Pixel as image::Pixel>::Subpixel>>
where
    I: GenericImageView + 'static,
{
    image
        .view(bbox.x0, bbox.y0, bbox.width(), bbox.height())
        .to_image()
}
