use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{ScanError, ScanResult};
use crate::ocr::TemplateSet;

/// `filename,label` records next to a directory of labeled glyph images.
#[derive(Debug, Clone)]
pub struct LabelStore {
    label_file: PathBuf,
    image_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub file_name: String,
    pub label: String,
}

impl LabelStore {
    pub fn new(label_file: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            label_file: label_file.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.label_file, &config.labeled_dir)
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// All label records; a missing label file means nothing is labeled yet.
    pub fn entries(&self) -> ScanResult<Vec<LabelEntry>> {
        if !self.label_file.exists() {
            info!("No label file at {}", self.label_file.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.label_file)
            .map_err(|e| ScanError::template_store(&self.label_file, e.to_string()))?;

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(number, line)| match line.trim().split_once(',') {
                Some((file_name, label)) if !file_name.is_empty() && !label.is_empty() => {
                    Some(LabelEntry {
                        file_name: file_name.to_string(),
                        label: label.to_string(),
                    })
                }
                _ => {
                    warn!("Skipping malformed label record on line {}: {line:?}", number + 1);
                    None
                }
            })
            .collect())
    }

    /// Loads every labeled image that still exists on disk.
    pub fn load_templates(&self) -> ScanResult<TemplateSet> {
        let mut templates = TemplateSet::new();

        for entry in self.entries()? {
            let path = self.image_dir.join(&entry.file_name);
            if !path.exists() {
                debug!("Labeled image {} is missing", path.display());
                continue;
            }
            let image = image::open(&path)
                .map_err(|e| ScanError::template_store(&path, e.to_string()))?
                .to_luma8();
            templates.insert(entry.label, &image);
        }

        info!(
            "Loaded {} templates for {} labels",
            templates.image_count(),
            templates.label_count()
        );
        Ok(templates)
    }

    /// Appends one record. Labels are single characters and may not contain the delimiter.
    pub fn append_label(&self, file_name: &str, label: &str) -> ScanResult<()> {
        let valid = |s: &str| !s.is_empty() && !s.contains([',', '\n', '\r']);
        if !valid(file_name) || !valid(label) || label.chars().count() != 1 {
            return Err(ScanError::template_store(
                &self.label_file,
                format!("invalid label record {file_name:?} -> {label:?}"),
            ));
        }

        if let Some(parent) = self.label_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.label_file)?;
        writeln!(file, "{file_name},{label}")?;
        Ok(())
    }

    /// PNG files in the image directory without a label record, sorted by name.
    pub fn unlabeled_images(&self) -> ScanResult<Vec<String>> {
        if !self.image_dir.exists() {
            return Ok(Vec::new());
        }
        let labeled: HashSet<String> = self
            .entries()?
            .into_iter()
            .map(|entry| entry.file_name)
            .collect();

        let mut unlabeled: Vec<String> = fs::read_dir(&self.image_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".png") && !labeled.contains(name))
            .collect();
        unlabeled.sort();
        Ok(unlabeled)
    }
}
