use image::{GrayImage, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use itertools::Itertools;
use log::{debug, info, warn};

use super::{color_distance, mask_where};
use crate::config::GridConfig;
use crate::error::{ScanError, ScanResult};
use crate::types::{BoundingBox, CellPos, GRID_SIZE};

const TILE_COUNT: usize = GRID_SIZE * GRID_SIZE;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    pub bbox: BoundingBox,
    pub center: (f32, f32),
    pub area: f64,
    pub pos: CellPos,
}

/// The 25 tiles in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn get(&self, row: usize, col: usize) -> &Tile {
        &self.tiles[row * GRID_SIZE + col]
    }

    /// Mean tile width and height, rounded.
    pub fn mean_cell_size(&self) -> (u32, u32) {
        let n = self.tiles.len().max(1) as f64;
        let w: f64 = self.tiles.iter().map(|t| f64::from(t.bbox.width())).sum();
        let h: f64 = self.tiles.iter().map(|t| f64::from(t.bbox.height())).sum();
        ((w / n).round() as u32, (h / n).round() as u32)
    }

    /// Centers of the corner tiles: top-left, top-right, bottom-right, bottom-left.
    pub fn outer_centers(&self) -> [(f32, f32); 4] {
        let last = GRID_SIZE - 1;
        [
            self.get(0, 0).center,
            self.get(0, last).center,
            self.get(last, last).center,
            self.get(last, 0).center,
        ]
    }
}

pub fn tile_mask(image: &RgbImage, config: &GridConfig) -> GrayImage {
    mask_where(image, |pixel| {
        color_distance(pixel, config.tile_color) < config.color_distance
    })
}

/// Square-ish four-cornered blobs of the tile color, in detection order.
pub fn find_tile_candidates(mask: &GrayImage, config: &GridConfig) -> Vec<Tile> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(|contour| {
            let area = polygon_area(&contour.points);
            if area < config.min_tile_area {
                return None;
            }

            let perimeter = arc_length(&contour.points, true);
            let epsilon = (config.approx_epsilon_ratio * perimeter).max(1.0);
            let vertices = polygon_vertices(&contour.points, epsilon);
            if vertices.len() != 4 {
                debug!("Rejected contour with {} vertices", vertices.len());
                return None;
            }

            let bbox = points_bbox(&contour.points)?;
            let aspect = bbox.width() as f32 / bbox.height().max(1) as f32;
            if !(config.min_aspect..=config.max_aspect).contains(&aspect) {
                debug!("Rejected contour with aspect ratio {aspect:.2}");
                return None;
            }

            Some(Tile {
                bbox,
                center: bbox.center(),
                area,
                pos: CellPos::new(0, 0),
            })
        })
        .collect()
}

/// Finds the 25 tiles of the puzzle grid and orders them row-major.
pub fn locate_grid(image: &RgbImage, config: &GridConfig) -> ScanResult<TileGrid> {
    let mask = tile_mask(image, config);
    locate_grid_in_mask(&mask, config)
}

pub fn locate_grid_in_mask(mask: &GrayImage, config: &GridConfig) -> ScanResult<TileGrid> {
    let mut candidates = find_tile_candidates(mask, config);
    info!("Found {} tile candidates", candidates.len());

    if candidates.len() < TILE_COUNT {
        warn!("Only {} tiles found, aborting.", candidates.len());
        return Err(ScanError::InsufficientTiles {
            found: candidates.len(),
        });
    }

    candidates.sort_by(|a, b| b.area.total_cmp(&a.area));
    candidates.truncate(TILE_COUNT);
    candidates.sort_by(|a, b| a.center.1.total_cmp(&b.center.1));

    let tiles = candidates
        .chunks(GRID_SIZE)
        .enumerate()
        .flat_map(|(row, chunk)| {
            chunk
                .iter()
                .sorted_by(|a, b| a.center.0.total_cmp(&b.center.0))
                .enumerate()
                .map(move |(col, tile)| Tile {
                    pos: CellPos::new(row, col),
                    ..*tile
                })
                .collect_vec()
        })
        .collect();

    Ok(TileGrid { tiles })
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 / 2.0
}

/// Douglas-Peucker approximation of a closed contour. The contour is split at the
/// point farthest from its start so both halves have distinct endpoints, then
/// near-duplicate vertices are folded away.
fn polygon_vertices(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|a, b| point_distance(&first, a.1).total_cmp(&point_distance(&first, b.1)))
        .map_or(0, |(index, _)| index);
    if far == 0 {
        return vec![first];
    }

    let mut closing = points[far..].to_vec();
    closing.push(first);

    let mut chain = approximate_polygon_dp(&points[..=far], epsilon, false);
    chain.pop();
    chain.extend(approximate_polygon_dp(&closing, epsilon, false));

    let mut vertices: Vec<Point<i32>> = Vec::new();
    for point in chain {
        if vertices
            .last()
            .is_some_and(|last| point_distance(last, &point) <= epsilon)
        {
            continue;
        }
        vertices.push(point);
    }

    while vertices.len() > 1 && point_distance(&vertices[0], &vertices[vertices.len() - 1]) <= epsilon
    {
        vertices.pop();
    }
    vertices
}

fn point_distance(a: &Point<i32>, b: &Point<i32>) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    (dx * dx + dy * dy).sqrt()
}

fn points_bbox(points: &[Point<i32>]) -> Option<BoundingBox> {
    let (min_x, max_x) = points.iter().map(|p| p.x).minmax().into_option()?;
    let (min_y, max_y) = points.iter().map(|p| p.y).minmax().into_option()?;
    Some(BoundingBox::new(
        min_x.max(0) as u32,
        max_x.max(0) as u32 + 1,
        min_y.max(0) as u32,
        max_y.max(0) as u32 + 1,
    ))
}
