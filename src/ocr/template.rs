use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use itertools::Itertools;
use multimap::MultiMap;

use crate::config::ClassifierConfig;
use crate::segment::{FOREGROUND, binarize_foreground, is_binary_mask, threshold_keep_polarity};

/// Reference glyph masks keyed by label. Loaded once per scan and never
/// mutated while recognition runs.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: MultiMap<String, GrayImage>,
}

/// Best template score for one glyph. `label` is `None` when the score is
/// below the acceptance threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    pub label: Option<String>,
    pub score: f32,
}

/// Score reported when there is nothing to compare against.
pub const NO_MATCH_SCORE: f32 = -1.0;

/// Components of one glyph/reference comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceScore {
    pub ncc: f32,
    pub fill_penalty: f32,
    pub hole_penalty: f32,
}

impl ReferenceScore {
    pub fn total(&self) -> f32 {
        self.ncc - self.fill_penalty - self.hole_penalty
    }
}

struct Candidate<'a> {
    label: &'a str,
    score: f32,
    aspect_gap: f32,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reference image. Binary masks are stored as they are, foreground
    /// white; anything else is binarized with foreground as the minority class.
    pub fn insert(&mut self, label: impl Into<String>, image: &GrayImage) {
        let mask = if is_binary_mask(image) {
            image.clone()
        } else {
            binarize_foreground(image)
        };
        self.templates.insert(label.into(), mask);
    }

    pub fn label_count(&self) -> usize {
        self.templates.len()
    }

    pub fn image_count(&self) -> usize {
        self.templates.iter_all().map(|(_, images)| images.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).sorted().collect()
    }

    /// Every (label, reference) pair, labels in sorted order.
    fn references(&self) -> impl Iterator<Item = (&str, &GrayImage)> {
        self.labels().into_iter().flat_map(move |label| {
            self.templates
                .get_vec(label)
                .into_iter()
                .flatten()
                .map(move |image| (label, image))
        })
    }

    /// Scores a foreground-white glyph mask against every reference and keeps
    /// the global best. Equal scores go to the reference whose original shape
    /// is closest to the glyph's.
    pub fn match_glyph(&self, glyph: &GrayImage, config: &ClassifierConfig) -> TemplateMatch {
        if glyph.width() == 0 || glyph.height() == 0 {
            return TemplateMatch {
                label: None,
                score: NO_MATCH_SCORE,
            };
        }
        let glyph = threshold_keep_polarity(glyph);
        let glyph_holes = count_holes(&glyph);
        let glyph_aspect = aspect(&glyph);

        let best = self
            .references()
            .map(|(label, reference)| Candidate {
                label,
                score: score_reference(&glyph, glyph_holes, reference, config).total(),
                aspect_gap: (aspect(reference) - glyph_aspect).abs(),
            })
            .fold(None, |best: Option<Candidate<'_>>, candidate| match best {
                Some(best)
                    if best.score > candidate.score
                        || (best.score == candidate.score
                            && best.aspect_gap <= candidate.aspect_gap) =>
                {
                    Some(best)
                }
                _ => Some(candidate),
            });

        match best {
            Some(best) if best.score >= config.ncc_threshold => TemplateMatch {
                label: Some(best.label.to_string()),
                score: best.score,
            },
            Some(best) => TemplateMatch {
                label: None,
                score: best.score,
            },
            None => TemplateMatch {
                label: None,
                score: NO_MATCH_SCORE,
            },
        }
    }
}

/// Log aspect ratio, so wide and tall shapes are equally far from square.
fn aspect(image: &GrayImage) -> f32 {
    let (w, h) = image.dimensions();
    (w.max(1) as f32 / h.max(1) as f32).ln()
}

fn score_reference(
    glyph: &GrayImage,
    glyph_holes: usize,
    reference: &GrayImage,
    config: &ClassifierConfig,
) -> ReferenceScore {
    let (w, h) = glyph.dimensions();
    let reference = if reference.dimensions() == (w, h) {
        reference.clone()
    } else {
        threshold_keep_polarity(&imageops::resize(reference, w, h, FilterType::Triangle))
    };

    let ncc = normalized_cross_correlation(glyph, &reference);

    // Glyph ink where the reference has none, over the whole area.
    let size = (w as usize * h as usize).max(1);
    let spill = glyph
        .pixels()
        .zip(reference.pixels())
        .filter(|(g, r)| g[0] == FOREGROUND && r[0] != FOREGROUND)
        .count();
    let fill_penalty = config.fill_penalty_weight * spill as f32 / size as f32;

    let reference_holes = count_holes(&reference);
    let hole_penalty = config.hole_penalty_weight * glyph_holes.abs_diff(reference_holes) as f32
        / reference_holes.max(1) as f32;

    ReferenceScore {
        ncc,
        fill_penalty,
        hole_penalty,
    }
}

/// Mean-subtracted correlation coefficient of two equally sized images, in `[-1, 1]`.
/// Two flat images correlate fully only when they are identical.
pub fn normalized_cross_correlation(a: &GrayImage, b: &GrayImage) -> f32 {
    if a.dimensions() != b.dimensions() || a.as_raw().is_empty() {
        return 0.0;
    }

    let n = a.as_raw().len() as f64;
    let mean_a = a.as_raw().iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let mean_b = b.as_raw().iter().map(|&v| f64::from(v)).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&pa, &pb) in a.as_raw().iter().zip(b.as_raw()) {
        let da = f64::from(pa) - mean_a;
        let db = f64::from(pb) - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Number of background regions fully enclosed by foreground. The mask is
/// traced inside a one pixel background frame, so notches open to the crop
/// edge are not holes.
pub fn count_holes(mask: &GrayImage) -> usize {
    let (w, h) = mask.dimensions();
    let framed = GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            Luma([0])
        } else {
            *mask.get_pixel(x - 1, y - 1)
        }
    });
    find_contours::<i32>(&framed)
        .iter()
        .filter(|contour| contour.border_type == BorderType::Hole)
        .count()
}
