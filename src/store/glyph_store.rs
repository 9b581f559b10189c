use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use log::debug;

use crate::config::StoreConfig;
use crate::error::ScanResult;
use crate::types::CellPos;

/// Writes glyph masks for later labeling: unresolved ones into the unknown
/// directory and, when collecting, every glyph into the labeled directory.
#[derive(Debug, Clone)]
pub struct GlyphStore {
    labeled_dir: PathBuf,
    unknown_dir: PathBuf,
}

impl GlyphStore {
    pub fn new(labeled_dir: impl Into<PathBuf>, unknown_dir: impl Into<PathBuf>) -> Self {
        Self {
            labeled_dir: labeled_dir.into(),
            unknown_dir: unknown_dir.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.labeled_dir, &config.unknown_dir)
    }

    /// `char_{row}_{col}_{index}.png` in the unknown directory.
    pub fn save_unknown(&self, pos: CellPos, index: usize, mask: &GrayImage) -> ScanResult<PathBuf> {
        let name = format!("char_{}_{}_{index}.png", pos.row, pos.col);
        save(&self.unknown_dir, &name, mask)
    }

    /// `char_{row}_{col}_{index}_{label}.png` in the labeled directory.
    pub fn save_labeled(
        &self,
        pos: CellPos,
        index: usize,
        label: &str,
        mask: &GrayImage,
    ) -> ScanResult<PathBuf> {
        let name = format!(
            "char_{}_{}_{index}_{}.png",
            pos.row,
            pos.col,
            file_safe_label(label)
        );
        save(&self.labeled_dir, &name, mask)
    }
}

fn save(dir: &Path, name: &str, mask: &GrayImage) -> ScanResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    mask.save(&path)?;
    debug!("Saved glyph {}", path.display());
    Ok(path)
}

/// ASCII letters and digits pass through; anything else becomes `x` plus its hex code.
pub fn file_safe_label(label: &str) -> String {
    label.chars().fold(String::new(), |mut out, ch| {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            let _ = write!(out, "x{:02x}", u32::from(ch));
        }
        out
    })
}
