use image::{GenericImageView, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use log::{info, warn};

use super::grid_locator::TileGrid;
use crate::error::{ScanError, ScanResult};
use crate::types::{BoundingBox, CellPos, GRID_SIZE};

const MIN_QUAD_AREA: f32 = 1.0;

/// The warped capture: a `GRID_SIZE x GRID_SIZE` lattice of uniform cells
/// surrounded by a `buffer` margin.
#[derive(Debug, Clone)]
pub struct RectifiedGrid {
    pub image: RgbImage,
    pub cell_w: u32,
    pub cell_h: u32,
    pub buffer: u32,
}

impl RectifiedGrid {
    pub fn cell_bbox(&self, pos: CellPos) -> BoundingBox {
        let x0 = self.buffer + pos.col as u32 * self.cell_w;
        let y0 = self.buffer + pos.row as u32 * self.cell_h;
        BoundingBox::new(x0, x0 + self.cell_w, y0, y0 + self.cell_h)
    }

    pub fn cell(&self, pos: CellPos) -> RgbImage {
        let bbox = self.cell_bbox(pos);
        self.image
            .view(bbox.x0, bbox.y0, bbox.width(), bbox.height())
            .to_image()
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellPos, RgbImage)> + '_ {
        (0..GRID_SIZE)
            .flat_map(|row| (0..GRID_SIZE).map(move |col| CellPos::new(row, col)))
            .map(|pos| (pos, self.cell(pos)))
    }
}

/// Warps the capture so that the corner tile centers land on the centers of the
/// corner cells of a perfect lattice sized from the mean tile dimensions.
pub fn rectify_grid(image: &RgbImage, grid: &TileGrid, buffer: u32) -> ScanResult<RectifiedGrid> {
    let (cell_w, cell_h) = grid.mean_cell_size();
    if cell_w == 0 || cell_h == 0 {
        return Err(ScanError::DegenerateRectification);
    }

    let grid_w = cell_w * GRID_SIZE as u32;
    let grid_h = cell_h * GRID_SIZE as u32;
    let warp_w = grid_w + 2 * buffer;
    let warp_h = grid_h + 2 * buffer;

    let half_w = cell_w as f32 / 2.0;
    let half_h = cell_h as f32 / 2.0;
    let b = buffer as f32;
    let left = b + half_w;
    let top = b + half_h;
    let right = b + grid_w as f32 - half_w;
    let bottom = b + grid_h as f32 - half_h;

    let src = grid.outer_centers();
    let dst = [(left, top), (right, top), (right, bottom), (left, bottom)];

    info!("Rectifying grid to {warp_w}x{warp_h} with {cell_w}x{cell_h} cells");
    let image = warp_quad(image, src, dst, warp_w, warp_h)?;

    Ok(RectifiedGrid {
        image,
        cell_w,
        cell_h,
        buffer,
    })
}

/// Projective warp of `image` mapping the `src` quad onto the `dst` quad of a
/// `width x height` output.
pub fn warp_quad(
    image: &RgbImage,
    src: [(f32, f32); 4],
    dst: [(f32, f32); 4],
    width: u32,
    height: u32,
) -> ScanResult<RgbImage> {
    if quad_area(&src) < MIN_QUAD_AREA || quad_area(&dst) < MIN_QUAD_AREA {
        warn!("Degenerate rectification quad {src:?} -> {dst:?}");
        return Err(ScanError::DegenerateRectification);
    }

    let projection =
        Projection::from_control_points(src, dst).ok_or(ScanError::DegenerateRectification)?;

    let mut out = RgbImage::new(width, height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    Ok(out)
}

/// Shoelace area of a quadrilateral given in winding order.
pub fn quad_area(points: &[(f32, f32); 4]) -> f32 {
    let twice: f32 = (0..4)
        .map(|i| {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % 4];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice.abs() / 2.0
}
