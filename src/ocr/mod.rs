use image::GrayImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString};

use crate::config::ClassifierConfig;

pub mod char_cnn;
pub mod template;

pub use char_cnn::{CharCnn, FallbackClassifier, NoFallback, Prediction};
pub use template::{TemplateMatch, TemplateSet};

/// Which stage produced a glyph label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum LabelSource {
    Template,
    Fallback,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
    pub source: LabelSource,
}

impl Classification {
    pub fn is_unknown(&self) -> bool {
        self.source == LabelSource::Unknown
    }
}

/// Template matching first; the fallback classifier only sees rejected glyphs
/// and is trusted above `fallback_confidence`.
pub struct GlyphClassifier<'a> {
    templates: &'a TemplateSet,
    fallback: &'a dyn FallbackClassifier,
    config: &'a ClassifierConfig,
}

impl<'a> GlyphClassifier<'a> {
    pub fn new(
        templates: &'a TemplateSet,
        fallback: &'a dyn FallbackClassifier,
        config: &'a ClassifierConfig,
    ) -> Self {
        Self {
            templates,
            fallback,
            config,
        }
    }

    pub fn classify(&self, glyph: &GrayImage) -> Classification {
        let matched = self.templates.match_glyph(glyph, self.config);
        if let Some(label) = matched.label {
            return Classification {
                label,
                confidence: matched.score,
                source: LabelSource::Template,
            };
        }
        debug!("Template match rejected (score {:.3})", matched.score);

        match self.fallback.predict(glyph) {
            Ok(Some(prediction)) if prediction.confidence > self.config.fallback_confidence => {
                Classification {
                    label: prediction.label,
                    confidence: prediction.confidence,
                    source: LabelSource::Fallback,
                }
            }
            Ok(_) => self.unknown(matched.score),
            Err(e) => {
                warn!("Fallback classifier failed: {e:#}");
                self.unknown(matched.score)
            }
        }
    }

    fn unknown(&self, score: f32) -> Classification {
        Classification {
            label: self.config.unknown_label.clone(),
            confidence: score,
            source: LabelSource::Unknown,
        }
    }
}
