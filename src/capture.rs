use std::path::Path;

use image::{DynamicImage, RgbImage, RgbaImage};
use log::info;
use screenshots::Screen;

use crate::error::{ScanError, ScanResult};

/// Grabs the whole primary display.
pub fn capture_screen() -> ScanResult<RgbImage> {
    let screens = Screen::all().map_err(|e| ScanError::capture(e.to_string()))?;
    let screen = screens
        .iter()
        .find(|screen| screen.display_info.is_primary)
        .or_else(|| screens.first())
        .ok_or_else(|| ScanError::capture("no display found"))?;

    let image = screen
        .capture()
        .map_err(|e| ScanError::capture(e.to_string()))?;

    let bytes = image.to_vec();
    let image = RgbaImage::from_raw(image.width(), image.height(), bytes)
        .ok_or_else(|| ScanError::capture("screenshot buffer has the wrong size"))?;

    info!("Captured screen {}x{}", image.width(), image.height());
    Ok(DynamicImage::ImageRgba8(image).to_rgb8())
}

/// Uses an image file as the capture.
pub fn load_image(path: &Path) -> ScanResult<RgbImage> {
    let image = image::open(path).map_err(|e| {
        ScanError::capture(format!("could not open {}: {e}", path.display()))
    })?;
    info!(
        "Loaded capture {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image.to_rgb8())
}
