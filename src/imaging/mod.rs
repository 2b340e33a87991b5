//! Thumbnail images for gallery tiles.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize** | `DynamicImage::resize_exact` with `Lanczos3` |
//! | **Canvas** | `image::imageops::overlay` on a white RGBA buffer |
//! | **Placeholder** | generated PNG written once per output root |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fit-inside geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`make_thumbnail`], combining calculations + backend
//! - **Placeholder**: the built-in "no image" tile

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod placeholder;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{centered_offset, fit_scale, scaled_dimensions};
pub use operations::{ThumbnailOutcome, make_thumbnail, plan_thumbnail};
pub use params::{Background, ThumbnailParams};
pub use placeholder::write_placeholder;
pub use rust_backend::{RustBackend, is_thumbnail_candidate};
