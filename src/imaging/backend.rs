//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the thumbnailer
//! needs: identify and thumbnail. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests use the
//! recording [`MockBackend`](tests::MockBackend).

use super::params::ThumbnailParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
pub trait ImageBackend {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize the source and paste it centered on a canvas of the box size.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Backend that answers `identify` from a queue and only records
    /// thumbnail requests.
    #[derive(Default)]
    pub struct MockBackend {
        sizes: RefCell<Vec<Dimensions>>,
        log: RefCell<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(PathBuf),
        Thumbnail {
            source: PathBuf,
            output: PathBuf,
            scaled: (u32, u32),
            canvas: (u32, u32),
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue of sizes, handed out last first.
        pub fn with_dimensions(sizes: Vec<Dimensions>) -> Self {
            Self {
                sizes: RefCell::new(sizes),
                log: RefCell::default(),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.log.borrow().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.log.borrow_mut().push(RecordedOp::Identify(path.to_path_buf()));
            self.sizes.borrow_mut().pop().ok_or_else(|| {
                BackendError::ProcessingFailed(format!("no size queued for {}", path.display()))
            })
        }

        fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
            self.log.borrow_mut().push(RecordedOp::Thumbnail {
                source: params.source.clone(),
                output: params.output.clone(),
                scaled: (params.width, params.height),
                canvas: (params.box_width, params.box_height),
            });
            Ok(())
        }
    }

    #[test]
    fn identify_pops_queued_sizes() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 640,
            height: 480,
        }]);

        let dims = backend.identify(Path::new("images/example_a_0.png")).unwrap();
        assert_eq!((dims.width, dims.height), (640, 480));
        assert_eq!(
            backend.get_operations(),
            [RecordedOp::Identify(PathBuf::from("images/example_a_0.png"))]
        );
        assert!(backend.identify(Path::new("images/example_a_1.png")).is_err());
    }
}
