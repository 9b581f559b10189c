use std::path::PathBuf;

use thiserror::Error;

/// Hard failures of a single scan attempt. Nothing is written back to the caller's
/// result matrix when one of these is returned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("screen capture unavailable: {message}")]
    CaptureUnavailable { message: String },
    #[error("only {found} tiles found, 25 required")]
    InsufficientTiles { found: usize },
    #[error("reference corners do not span a valid quadrilateral")]
    DegenerateRectification,
    #[error("expected 4 highlighted corners, found {found}")]
    HighlightNotFound { found: usize },
    #[error("a scan is already in progress")]
    ScanInProgress,
    #[error("template store {path:?}: {message}")]
    TemplateStore { path: PathBuf, message: String },
    #[error("fallback classifier failed: {0}")]
    Fallback(#[source] anyhow::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn capture(message: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            message: message.into(),
        }
    }

    pub fn template_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TemplateStore {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
