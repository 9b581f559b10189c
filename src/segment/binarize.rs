use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;

pub const FOREGROUND: u8 = 255;
const MID_GRAY: u8 = 127;
const MIN_CONTRAST: u8 = 128;

/// Otsu threshold: pixels strictly above the level become foreground.
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let level = otsu_level(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    })
}

pub fn foreground_fraction(mask: &GrayImage) -> f32 {
    let total = mask.width() as usize * mask.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let on = mask.pixels().filter(|p| p[0] == FOREGROUND).count();
    on as f32 / total as f32
}

/// Inverts the mask when foreground is the majority, so text is always the minority class.
pub fn normalize_polarity(mut mask: GrayImage) -> GrayImage {
    if foreground_fraction(&mask) > 0.5 {
        image::imageops::invert(&mut mask);
    }
    mask
}

pub fn binarize_foreground(gray: &GrayImage) -> GrayImage {
    normalize_polarity(otsu_binarize(gray))
}

/// Otsu threshold without polarity normalization. Images with less than half
/// the full contrast range are split at mid-gray instead, so a flat or nearly
/// flat mask keeps its value.
pub fn threshold_keep_polarity(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max.saturating_sub(min) < MIN_CONTRAST {
        return GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
            if gray.get_pixel(x, y)[0] > MID_GRAY {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
    }
    otsu_binarize(gray)
}

/// True when every pixel is either background or [`FOREGROUND`].
pub fn is_binary_mask(gray: &GrayImage) -> bool {
    gray.pixels().all(|p| p[0] == 0 || p[0] == FOREGROUND)
}

pub fn binarize_cell(cell: &RgbImage) -> GrayImage {
    binarize_foreground(&image::imageops::grayscale(cell))
}
