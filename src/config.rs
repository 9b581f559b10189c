use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

pub const SCAN_CONFIG_DIR: &str = "config";
pub const SCAN_CONFIG: &str = "config/scanner.json";

/// Calibration constants for one game theme / render resolution.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
#[serde(default)]
pub struct ScanConfig {
    pub grid: GridConfig,
    pub segment: SegmentConfig,
    pub classifier: ClassifierConfig,
    pub assemble: AssembleConfig,
    pub store: StoreConfig,
    pub highlight: HighlightConfig,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct GridConfig {
    /// Tile background color, RGB.
    pub tile_color: [u8; 3],
    /// Euclidean RGB distance below which a pixel counts as tile background.
    pub color_distance: f32,
    pub min_tile_area: f64,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Margin in pixels added around the rectified grid.
    pub buffer: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tile_color: [103, 168, 244],
            color_distance: 30.0,
            min_tile_area: 2000.0,
            approx_epsilon_ratio: 0.02,
            min_aspect: 0.7,
            max_aspect: 1.3,
            buffer: 6,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct SegmentConfig {
    pub min_component_area: u32,
    pub merge_boxes: bool,
    pub merge_x_gap: i64,
    pub merge_y_gap: i64,
    pub contain_epsilon: u32,
    pub line_gap: u32,
    pub cluster_overlap: f32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_component_area: 10,
            merge_boxes: false,
            merge_x_gap: 10,
            merge_y_gap: 12,
            contain_epsilon: 2,
            line_gap: 3,
            cluster_overlap: 0.3,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub ncc_threshold: f32,
    pub fill_penalty_weight: f32,
    pub hole_penalty_weight: f32,
    pub fallback_confidence: f32,
    pub fallback_model: PathBuf,
    pub unknown_label: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ncc_threshold: 0.65,
            fill_penalty_weight: 0.5,
            hole_penalty_weight: 0.7,
            fallback_confidence: 0.7,
            fallback_model: PathBuf::from("char_cnn.onnx"),
            unknown_label: "?".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct AssembleConfig {
    /// A gap wider than this multiple of the mean glyph width separates two values.
    pub gap_ratio: f32,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self { gap_ratio: 1.0 }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub label_file: PathBuf,
    pub labeled_dir: PathBuf,
    pub unknown_dir: PathBuf,
    pub collect_all_glyphs: bool,
    /// Stage images are written here when set. Off by default.
    pub debug_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label_file: PathBuf::from("char_labels.csv"),
            labeled_dir: PathBuf::from("all_chars"),
            unknown_dir: PathBuf::from("unknown_chars"),
            collect_all_glyphs: false,
            debug_dir: None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct HighlightConfig {
    /// Corner marker colors, RGB.
    pub colors: Vec<[u8; 3]>,
    pub color_distance: f32,
    pub cell_size: u32,
    pub min_corner_span: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            colors: vec![[0x00, 0x47, 0xA5], [0x01, 0x4E, 0xA7]],
            color_distance: 5.0,
            cell_size: 90,
            min_corner_span: 20.0,
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scan config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write scan config {}", path.display()))
    }

    /// Loads the config at `path`, writing the defaults there first if it does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Writing default scan config to {}", path.display());
            Self::default().save(path)?;
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let json = r#"{ "grid": { "color_distance": 12.5 }, "classifier": { "ncc_threshold": 0.8 } }"#;

        let config: ScanConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.grid.color_distance, 12.5);
        assert_eq!(config.grid.tile_color, [103, 168, 244]);
        assert_eq!(config.classifier.ncc_threshold, 0.8);
        assert_eq!(config.classifier.hole_penalty_weight, 0.7);
        assert_eq!(config.segment, SegmentConfig::default());
    }

    #[test]
    fn load_or_init_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("scanner.json");

        let config = ScanConfig::load_or_init(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn debug_dumps_are_off_unless_configured() {
        let json = r#"{ "store": { "debug_dir": "scratch" } }"#;

        let config: ScanConfig = serde_json::from_str(json).unwrap();

        assert_eq!(ScanConfig::default().store.debug_dir, None);
        assert_eq!(config.store.debug_dir, Some(PathBuf::from("scratch")));
    }
}
