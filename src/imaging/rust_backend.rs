//! Pure Rust thumbnail backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image::ImageReader` with format sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Paste | `image::imageops::overlay` (alpha blended onto the canvas) |
//! | Encode | `RgbImage::save`, format from the output extension |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::centered_offset;
use super::params::ThumbnailParams;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgba, RgbaImage};
use std::path::Path;

/// Extensions of extracted outputs that may become a thumbnail.
const THUMBNAIL_CANDIDATES: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `path` has an image extension eligible for thumbnail selection.
pub fn is_thumbnail_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            THUMBNAIL_CANDIDATES
                .iter()
                .any(|c| e.eq_ignore_ascii_case(c))
        })
}

/// Backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img
            .resize_exact(params.width, params.height, FilterType::Lanczos3)
            .to_rgba8();

        let [r, g, b] = params.background.0;
        let mut canvas = RgbaImage::from_pixel(
            params.box_width,
            params.box_height,
            Rgba([r, g, b, 255]),
        );
        let (x, y) = centered_offset(
            (params.width, params.height),
            (params.box_width, params.box_height),
        );
        image::imageops::overlay(&mut canvas, &resized, x, y);

        if let Some(parent) = params.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        DynamicImage::ImageRgba8(canvas)
            .to_rgb8()
            .save(&params.output)
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to write {}: {}",
                    params.output.display(),
                    e
                ))
            })
    }
}
