use image::{GrayImage, Luma, RgbImage};

pub mod grid_locator;
pub mod highlight;
pub mod rectify;

pub use grid_locator::{Tile, TileGrid, locate_grid, locate_grid_in_mask, tile_mask};
pub use highlight::{find_highlighted_corners, rectify_single_cell, validate_corners};
pub use rectify::{RectifiedGrid, rectify_grid};

pub(crate) fn color_distance(pixel: [u8; 3], color: [u8; 3]) -> f32 {
    pixel
        .iter()
        .zip(color.iter())
        .map(|(&a, &b)| {
            let d = f32::from(a) - f32::from(b);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Binary mask (255 = hit) of the pixels accepted by `predicate`.
pub(crate) fn mask_where<F>(image: &RgbImage, predicate: F) -> GrayImage
where
    F: Fn([u8; 3]) -> bool,
{
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if predicate(image.get_pixel(x, y).0) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_distance_is_euclidean() {
        assert_eq!(color_distance([0, 0, 0], [3, 4, 0]), 5.0);
        assert_eq!(color_distance([10, 10, 10], [10, 10, 10]), 0.0);
    }
}
