//! Centralized naming for everything the gallery writes.
//!
//! Labels, artifact names and links are derived from paths in one place so
//! that the transform unit, the aggregator and the tests agree on them.
//!
//! ## Reference labels
//!
//! Every document and index page carries a cross-reference target built from
//! its output path, starting at the gallery directory name:
//! - `examples/example_basic.ipynb` → `gallery_examples_example_basic.ipynb`
//! - `examples/Plots` (an index page) → `gallery_examples_plots`
//!
//! ## Artifact names
//!
//! - extracted figures: `images/<notebook stem>_<n>.<ext>`, numbered from 0
//! - thumbnails: `images/thumb/<label>_thumb.png`

use std::path::{Component, Path, PathBuf};

/// Prefix shared by every reference label.
pub const LABEL_PREFIX: &str = "gallery_";

/// Sub-directory of a gallery directory holding extracted figures.
pub const IMAGES_DIR: &str = "images";

/// Sub-directory of [`IMAGES_DIR`] holding thumbnails.
pub const THUMB_DIR: &str = "thumb";

/// Build the reference label for a (relative) output path.
///
/// Path separators become `_` and the result is lowercased. Root and `.`
/// components are ignored so `./examples/` and `examples` agree.
pub fn reference_label(path: &Path) -> String {
    let joined = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_");
    format!("{LABEL_PREFIX}{}", joined.to_lowercase())
}

/// Relative path of the `n`-th extracted figure of a notebook.
pub fn image_name(stem: &str, n: usize, ext: &str) -> String {
    format!("{IMAGES_DIR}/{stem}_{n}.{ext}")
}

/// Relative path of a notebook's thumbnail inside its gallery directory.
pub fn thumb_name(label: &str) -> String {
    format!("{IMAGES_DIR}/{THUMB_DIR}/{label}_thumb.png")
}

/// Express `target` relative to the directory `base`.
///
/// Both paths must be of the same kind (both absolute or both relative to
/// the same directory). Walks up with `..` where needed.
pub fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().filter(|c| *c != Component::CurDir).collect();
    let base: Vec<Component> = base.components().filter(|c| *c != Component::CurDir).collect();

    let common = target
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for c in &target[common..] {
        rel.push(c.as_os_str());
    }
    rel
}

/// Render a relative path as a Markdown/URL link with forward slashes.
pub fn link_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// File stem as an owned string (empty when the path has none).
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
