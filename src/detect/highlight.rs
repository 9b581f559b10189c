use image::RgbImage;
use imageproc::region_labelling::{Connectivity, connected_components};
use log::{info, warn};

use super::rectify::warp_quad;
use super::{color_distance, mask_where};
use crate::config::HighlightConfig;
use crate::error::{ScanError, ScanResult};
use crate::segment::components::component_stats;

/// Centroids of the four highlight markers around the selected cell, ordered
/// top-left, top-right, bottom-right, bottom-left.
pub fn find_highlighted_corners(
    image: &RgbImage,
    config: &HighlightConfig,
) -> ScanResult<[(f32, f32); 4]> {
    let mask = mask_where(image, |pixel| {
        config
            .colors
            .iter()
            .any(|&color| color_distance(pixel, color) <= config.color_distance)
    });

    let labels = connected_components(&mask, Connectivity::Eight, image::Luma([0u8]));
    let centers: Vec<(f32, f32)> = component_stats(&labels)
        .iter()
        .map(|stats| stats.centroid())
        .collect();
    info!("Found {} corner candidates", centers.len());

    if centers.len() != 4 {
        warn!("Expected 4 corners, found {}", centers.len());
        return Err(ScanError::HighlightNotFound {
            found: centers.len(),
        });
    }

    let pick = |key: fn(&(f32, f32)) -> f32, largest: bool| {
        let iter = centers.iter().copied();
        let chosen = if largest {
            iter.max_by(|a, b| key(a).total_cmp(&key(b)))
        } else {
            iter.min_by(|a, b| key(a).total_cmp(&key(b)))
        };
        chosen.unwrap_or_default()
    };

    Ok([
        pick(|p| p.0 + p.1, false),
        pick(|p| p.1 - p.0, false),
        pick(|p| p.0 + p.1, true),
        pick(|p| p.1 - p.0, true),
    ])
}

/// Rejects quads whose horizontal or vertical span is below the configured minimum.
pub fn validate_corners(corners: &[(f32, f32); 4], config: &HighlightConfig) -> ScanResult<()> {
    let [tl, tr, br, bl] = *corners;
    let width = (tr.0 - tl.0).max(br.0 - bl.0);
    let height = (bl.1 - tl.1).max(br.1 - tr.1);

    if width < config.min_corner_span || height < config.min_corner_span {
        warn!("Cell seems too small ({width}x{height})");
        return Err(ScanError::DegenerateRectification);
    }
    info!("Corners validated. Approximate cell size: {width}x{height}");
    Ok(())
}

pub fn rectify_single_cell(
    image: &RgbImage,
    corners: [(f32, f32); 4],
    cell_size: u32,
) -> ScanResult<RgbImage> {
    let edge = cell_size.saturating_sub(1) as f32;
    let dst = [(0.0, 0.0), (edge, 0.0), (edge, edge), (0.0, edge)];
    warp_quad(image, corners, dst, cell_size, cell_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn marked_image(points: &[(i32, i32)]) -> RgbImage {
        let mut image = RgbImage::from_pixel(200, 160, Rgb([20, 20, 20]));
        for &(x, y) in points {
            draw_filled_rect_mut(
                &mut image,
                Rect::at(x - 2, y - 2).of_size(5, 5),
                Rgb([0x00, 0x47, 0xA5]),
            );
        }
        image
    }

    #[test]
    fn corners_are_ordered_clockwise_from_top_left() {
        let image = marked_image(&[(150, 130), (40, 30), (40, 128), (152, 28)]);
        let config = HighlightConfig::default();

        let corners = find_highlighted_corners(&image, &config).unwrap();

        let rounded = corners.map(|(x, y)| (x.round() as i32, y.round() as i32));
        assert_eq!(rounded, [(40, 30), (152, 28), (150, 130), (40, 128)]);
        assert!(validate_corners(&corners, &config).is_ok());
    }

    #[test]
    fn wrong_marker_count_is_reported() {
        let image = marked_image(&[(40, 30), (150, 30), (150, 130)]);

        let result = find_highlighted_corners(&image, &HighlightConfig::default());

        assert!(matches!(
            result,
            Err(ScanError::HighlightNotFound { found: 3 })
        ));
    }

    #[test]
    fn tiny_quad_fails_validation() {
        let corners = [(10.0, 10.0), (15.0, 10.0), (15.0, 15.0), (10.0, 15.0)];

        let result = validate_corners(&corners, &HighlightConfig::default());

        assert!(matches!(result, Err(ScanError::DegenerateRectification)));
    }

    #[test]
    fn single_cell_is_warped_to_cell_size() {
        let image = marked_image(&[(40, 30), (150, 30), (150, 130), (40, 130)]);
        let corners = [(40.0, 30.0), (150.0, 30.0), (150.0, 130.0), (40.0, 130.0)];

        let cell = rectify_single_cell(&image, corners, 90).unwrap();

        assert_eq!(cell.dimensions(), (90, 90));
    }
}
