//! High-level image operations.
//!
//! These functions combine the fit calculation with backend execution.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{fit_scale, scaled_dimensions};
use super::params::{Background, ThumbnailParams};
use std::path::Path;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// What [`make_thumbnail`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// A canvas of exactly the box size was written.
    Written,
    /// Source already fits and would be overwritten in place; nothing written.
    Unchanged,
}

/// Plan a thumbnail operation without executing it.
///
/// Returns `None` when the source already fits the box and `source` and
/// `output` are the same path: an image is never upscaled in place.
pub fn plan_thumbnail(
    source: &Path,
    output: &Path,
    source_dims: (u32, u32),
    box_size: (u32, u32),
) -> Option<ThumbnailParams> {
    let scale = fit_scale(source_dims, box_size);
    if scale >= 1.0 && source == output {
        return None;
    }
    let (width, height) = scaled_dimensions(source_dims, scale);

    Some(ThumbnailParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        box_width: box_size.0,
        box_height: box_size.1,
        background: Background::WHITE,
    })
}

/// Fit `source` into a `box_size` canvas and write it to `output`.
///
/// Fails when the source is missing or cannot be decoded; callers fall back
/// to another candidate or the placeholder.
pub fn make_thumbnail(
    backend: &dyn ImageBackend,
    source: &Path,
    output: &Path,
    box_size: (u32, u32),
) -> Result<ThumbnailOutcome> {
    let dims = backend.identify(source)?;
    if dims.width == 0 || dims.height == 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "{} has no pixels",
            source.display()
        )));
    }

    match plan_thumbnail(source, output, (dims.width, dims.height), box_size) {
        Some(params) => {
            debug!(
                source = %source.display(),
                output = %output.display(),
                width = params.width,
                height = params.height,
                "scaling thumbnail"
            );
            backend.thumbnail(&params)?;
            Ok(ThumbnailOutcome::Written)
        }
        None => Ok(ThumbnailOutcome::Unchanged),
    }
}
