use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, anyhow};
use image::GrayImage;
use image::imageops::{self, FilterType};
use log::info;
use ndarray::Array4;
use ort::inputs;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use crate::error::{ScanError, ScanResult};

/// Output classes of the bundled character CNN, by output index.
pub const CNN_LABELS: &str = "0123456789!@#$%^&*()@%";
pub const CNN_INPUT_SIZE: u32 = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Secondary classifier consulted when template matching rejects a glyph.
pub trait FallbackClassifier: Send + Sync {
    fn predict(&self, glyph: &GrayImage) -> anyhow::Result<Option<Prediction>>;
}

/// Used when no model is available: every rejected glyph stays unresolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFallback;

impl FallbackClassifier for NoFallback {
    fn predict(&self, _glyph: &GrayImage) -> anyhow::Result<Option<Prediction>> {
        Ok(None)
    }
}

/// Small ONNX CNN over 32x32 single-channel glyphs (NHWC, values in `[0, 1]`).
#[derive(Debug)]
pub struct CharCnn {
    session: Mutex<Session>,
    input: String,
    output: String,
    labels: Vec<char>,
}

impl CharCnn {
    pub fn load(path: &Path) -> ScanResult<Self> {
        if !path.is_file() {
            return Err(ScanError::Fallback(anyhow!(
                "model {} not found",
                path.display()
            )));
        }
        Self::create_session(path).map_err(ScanError::Fallback)
    }

    fn create_session(path: &Path) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("model has no inputs")?;
        let output = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .context("model has no outputs")?;
        info!("Loaded fallback model {} ({input} -> {output})", path.display());

        Ok(Self {
            session: Mutex::new(session),
            input,
            output,
            labels: CNN_LABELS.chars().collect(),
        })
    }

    fn label_for(&self, index: usize) -> Option<String> {
        self.labels.get(index).map(char::to_string)
    }
}

impl FallbackClassifier for CharCnn {
    fn predict(&self, glyph: &GrayImage) -> anyhow::Result<Option<Prediction>> {
        let tensor = glyph_tensor(glyph);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("fallback model lock poisoned"))?;
        let outputs = session.run(inputs! {
            self.input.as_str() => TensorRef::from_array_view(&tensor)?,
        })?;
        let scores = outputs[self.output.as_str()].try_extract_array::<f32>()?;

        let best = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1));

        Ok(best.and_then(|(index, confidence)| {
            self.label_for(index).map(|label| Prediction { label, confidence })
        }))
    }
}

/// Nearest-neighbour resize to the network input, scaled to `[0, 1]`, shape `(1, 32, 32, 1)`.
pub fn glyph_tensor(glyph: &GrayImage) -> Array4<f32> {
    let size = CNN_INPUT_SIZE as usize;
    let resized = imageops::resize(glyph, CNN_INPUT_SIZE, CNN_INPUT_SIZE, FilterType::Nearest);
    Array4::from_shape_fn((1, size, size, 1), |(_, y, x, _)| {
        f32::from(resized.get_pixel(x as u32, y as u32)[0]) / 255.0
    })
}
