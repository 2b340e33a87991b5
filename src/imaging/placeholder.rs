//! The built-in "no image" tile used when a notebook has no usable figure.

use super::backend::BackendError;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Where the placeholder lives relative to an output root.
pub const PLACEHOLDER_PATH: &str = "_static/no_image.png";

const FILL: Rgb<u8> = Rgb([238, 238, 238]);
const INK: Rgb<u8> = Rgb([187, 187, 187]);

/// Write the placeholder tile under `output_root` unless it already exists.
///
/// The tile is a light gray box of the thumbnail size with a one-pixel frame
/// and both diagonals drawn in a darker gray.
pub fn write_placeholder(output_root: &Path, size: (u32, u32)) -> Result<PathBuf, BackendError> {
    let path = output_root.join(PLACEHOLDER_PATH);
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let (w, h) = size;
    let img = RgbImage::from_fn(w, h, |x, y| {
        let frame = x == 0 || y == 0 || x + 1 == w || y + 1 == h;
        // Diagonal test in integer space: |x*h - y*w| < max(w, h)
        let (x, y, w, h) = (x as i64, y as i64, w as i64, h as i64);
        let span = w.max(h);
        let diagonal = (x * h - y * w).abs() < span || (x * h - (h - 1 - y) * w).abs() < span;
        if frame || diagonal { INK } else { FILL }
    });
    img.save(&path)
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to write placeholder: {e}")))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_box_sized_png() {
        let tmp = TempDir::new().unwrap();
        let path = write_placeholder(tmp.path(), (400, 280)).unwrap();

        assert_eq!(path, tmp.path().join("_static/no_image.png"));
        assert_eq!(image::image_dimensions(&path).unwrap(), (400, 280));
        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, INK.0);
        assert_eq!(img.get_pixel(200, 20).0, FILL.0);
    }

    #[test]
    fn existing_placeholder_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(PLACEHOLDER_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"custom").unwrap();

        write_placeholder(tmp.path(), (400, 280)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"custom");
    }
}
