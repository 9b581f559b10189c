use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const GRID_SIZE: usize = 5;

/// Pixel rectangle with exclusive right/bottom edges: `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub x1: u32,
    pub y0: u32,
    pub y1: u32,
}

impl BoundingBox {
    pub fn new(x0: u32, x1: u32, y0: u32, y1: u32) -> Self {
        Self {
            x0: x0.min(x1),
            x1: x0.max(x1),
            y0: y0.min(y1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.x0 + self.x1) as f32 / 2.0,
            (self.y0 + self.y1) as f32 / 2.0,
        )
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            x1: self.x1.max(other.x1),
            y0: self.y0.min(other.y0),
            y1: self.y1.max(other.y1),
        }
    }

    /// Signed horizontal overlap; negative values are the gap between the boxes.
    pub fn x_overlap(&self, other: &BoundingBox) -> i64 {
        i64::from(self.x1.min(other.x1)) - i64::from(self.x0.max(other.x0))
    }

    /// True when `self` lies inside `other` widened by `epsilon` on every side.
    pub fn is_inside(&self, other: &BoundingBox, epsilon: u32) -> bool {
        self.x0 + epsilon >= other.x0
            && self.x1 <= other.x1 + epsilon
            && self.y0 + epsilon >= other.y0
            && self.y1 <= other.y1 + epsilon
    }

    pub fn to_rect(&self) -> imageproc::rect::Rect {
        imageproc::rect::Rect::at(self.x0 as i32, self.y0 as i32)
            .of_size(self.width().max(1), self.height().max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.row, self.col)
    }
}

/// Per-cell soft failures; they never abort the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecognitionIssue {
    GlyphUnresolved {
        cell: CellPos,
        index: usize,
        score: Option<f32>,
    },
    AssemblyAmbiguous {
        cell: CellPos,
        line_count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionResult {
    pub cells: [[String; GRID_SIZE]; GRID_SIZE],
    pub issues: Vec<RecognitionIssue>,
}

impl RecognitionResult {
    pub fn get(&self, pos: CellPos) -> &str {
        &self.cells[pos.row][pos.col]
    }

    pub fn unresolved_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, RecognitionIssue::GlyphUnresolved { .. }))
            .count()
    }
}

impl fmt::Display for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .cells
            .iter()
            .flatten()
            .map(|cell| cell.chars().count())
            .max()
            .unwrap_or(0)
            .max(1);

        for row in &self.cells {
            let line = row.iter().map(|cell| format!("{cell:>width$}")).join(" | ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_containment_uses_epsilon() {
        let outer = BoundingBox::new(10, 30, 10, 40);
        let inner = BoundingBox::new(9, 31, 12, 20);

        assert!(inner.is_inside(&outer, 2));
        assert!(!inner.is_inside(&outer, 0));
        assert!(outer.is_inside(&outer, 0));
    }

    #[test]
    fn x_overlap_is_negative_for_gaps() {
        let a = BoundingBox::new(0, 10, 0, 10);
        let b = BoundingBox::new(14, 20, 0, 10);

        assert_eq!(a.x_overlap(&b), -4);
        assert_eq!(a.union(&b), BoundingBox::new(0, 20, 0, 10));
    }

    #[test]
    fn result_display_has_five_rows() {
        let mut result = RecognitionResult::default();
        result.cells[2][3] = "255 0 12".to_string();

        let text = result.to_string();

        assert_eq!(text.lines().count(), GRID_SIZE);
        assert!(text.lines().nth(2).unwrap().contains("255 0 12"));
    }
}
