#![warn(clippy::all, rust_2018_idioms)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]

pub mod action;
pub mod assemble;
pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod ocr;
pub mod segment;
pub mod store;
pub mod worker;

mod types;

#[cfg(test)]
pub(crate) mod test_util;

pub use action::{CellRecognition, ScanContext, recognize_cell, scan_grid, scan_single_cell};
pub use config::ScanConfig;
pub use error::ScanError;
pub use types::{BoundingBox, CellPos, GRID_SIZE, RecognitionIssue, RecognitionResult};
pub use worker::ScanService;
