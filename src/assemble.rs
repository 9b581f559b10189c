use itertools::Itertools;
use log::debug;

use crate::types::BoundingBox;

/// Classified glyphs of one text line, left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledLine {
    pub labels: Vec<String>,
    pub boxes: Vec<BoundingBox>,
}

impl LabeledLine {
    pub fn new(labels: Vec<String>, boxes: Vec<BoundingBox>) -> Self {
        Self { labels, boxes }
    }

    pub fn text(&self) -> String {
        self.labels.concat()
    }

    fn slice(&self, from: usize, to: usize) -> String {
        self.labels[from.min(to)..to].concat()
    }
}

/// Final value of one cell. `ambiguous` is set when the component split was a guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellValue {
    pub text: String,
    pub ambiguous: bool,
}

/// Indices `i` where a gap wider than `ratio` times the mean glyph width
/// separates glyph `i - 1` from glyph `i`.
pub fn detect_gaps(boxes: &[BoundingBox], ratio: f32) -> Vec<usize> {
    if boxes.len() < 2 {
        return Vec::new();
    }
    let mean_width = boxes.iter().map(|b| b.width() as f32).sum::<f32>() / boxes.len() as f32;
    let threshold = mean_width * ratio;

    boxes
        .iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (a, b))| (i64::from(b.x0) - i64::from(a.x1)) as f32 > threshold)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Splits the lines of a multi-component cell into R, G and B strings.
/// Returns the components and whether the split was ambiguous.
pub fn split_rgb(lines: &[LabeledLine], ratio: f32) -> ([String; 3], bool) {
    match lines {
        [r, g, b] => ([r.text(), g.text(), b.text()], false),
        [first, second] => {
            let first_gaps = detect_gaps(&first.boxes, ratio);
            let second_gaps = detect_gaps(&second.boxes, ratio);
            match (first_gaps.first(), second_gaps.first()) {
                (Some(&at), None) => (
                    [
                        first.slice(0, at),
                        first.slice(at, first.labels.len()),
                        second.text(),
                    ],
                    false,
                ),
                (None, Some(&at)) => (
                    [
                        first.text(),
                        second.slice(0, at),
                        second.slice(at, second.labels.len()),
                    ],
                    false,
                ),
                _ => ([first.text(), second.text(), String::new()], true),
            }
        }
        [line] => {
            let len = line.labels.len();
            match detect_gaps(&line.boxes, ratio).as_slice() {
                [] => ([line.text(), String::new(), String::new()], false),
                [at] => (
                    [line.slice(0, *at), line.slice(*at, len), String::new()],
                    false,
                ),
                [at, next, ..] => (
                    [
                        line.slice(0, *at),
                        line.slice(*at, *next),
                        line.slice(*next, len),
                    ],
                    false,
                ),
            }
        }
        _ => (Default::default(), true),
    }
}

/// One line is taken verbatim; several lines are read as an RGB triplet and
/// the non-empty components are joined with spaces.
pub fn assemble_cell(lines: &[LabeledLine], ratio: f32) -> CellValue {
    match lines {
        [] => CellValue {
            text: String::new(),
            ambiguous: false,
        },
        [line] => CellValue {
            text: line.text(),
            ambiguous: false,
        },
        _ => {
            let (components, ambiguous) = split_rgb(lines, ratio);
            debug!("RGB components {components:?} (ambiguous: {ambiguous})");
            CellValue {
                text: components.iter().filter(|c| !c.is_empty()).join(" "),
                ambiguous,
            }
        }
    }
}
