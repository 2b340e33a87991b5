//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides whether and how large a thumbnail is drawn) and the
//! [`backend`](super::backend) (which does the actual pixel work), so a mock
//! backend can stand in during tests.

use std::path::PathBuf;

/// An opaque RGB canvas color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 3]);

impl Background {
    pub const WHITE: Self = Self([255, 255, 255]);
}

impl Default for Background {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Parameters for a thumbnail operation (resize + paste centered on a canvas).
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Size of the resized source image.
    pub width: u32,
    pub height: u32,
    /// Size of the written canvas.
    pub box_width: u32,
    pub box_height: u32,
    pub background: Background,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_background_is_white() {
        assert_eq!(Background::default(), Background([255, 255, 255]));
    }
}
