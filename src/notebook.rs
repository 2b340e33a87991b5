//! Typed model of the Jupyter notebook file format (nbformat 4).
//!
//! A notebook is an ordered list of cells plus a metadata mapping. Only the
//! parts the gallery pipeline reads are typed; everything else is carried in
//! `extra` maps so that a read → write cycle does not lose kernel metadata,
//! widget state, or cell ids.
//!
//! ## Gallery metadata
//!
//! Notebook-level metadata may carry per-notebook gallery settings. They are
//! typed here once instead of being looked up by name at each use site:
//!
//! ```json
//! {
//!   "metadata": {
//!     "code_example": "import numpy as np",
//!     "supplementary_files": ["data.csv"],
//!     "other_supplementary_files": ["logo.png"],
//!     "thumbnail_figure": 1,
//!     "url": "https://github.com/org/repo/blob/main/examples/example_basic.ipynb"
//!   }
//! }
//! ```
//!
//! ## Multiline strings
//!
//! nbformat stores text either as one string or as a list of lines. Both are
//! accepted on read; writes always use the list form, one entry per line with
//! line endings kept, which is what Jupyter itself writes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid notebook {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A whole notebook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default = "default_nbformat_minor")]
    pub nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
    4
}

fn default_nbformat_minor() -> u32 {
    4
}

/// Selects the image used for a notebook's gallery thumbnail.
///
/// - an integer picks one of the extracted output images (negative values
///   count from the end)
/// - a string is the path of an image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThumbnailSelector {
    Index(i64),
    Path(PathBuf),
}

/// Notebook-level metadata with the gallery keys typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplementary_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_supplementary_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_figure: Option<ThumbnailSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotebookMetadata {
    /// Language of the notebook's kernel, if recorded.
    pub fn language(&self) -> Option<&str> {
        self.extra
            .get("language_info")
            .and_then(|info| info.get("name"))
            .or_else(|| {
                self.extra
                    .get("kernelspec")
                    .and_then(|spec| spec.get("language"))
            })
            .and_then(Value::as_str)
    }
}

/// One notebook cell, tagged by `cell_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown(TextCell),
    Code(CodeCell),
    Raw(TextCell),
}

/// Narrative (markdown) or raw cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: CellMetadata,
    #[serde(with = "multiline")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

/// Executable cell with its produced outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: CellMetadata,
    #[serde(with = "multiline")]
    pub source: String,
    #[serde(default)]
    pub execution_count: Option<u32>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

/// Cell metadata with `tags` typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output metadata with `tags` typed (used for single-output removal).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single produced output of a code cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: String,
        #[serde(with = "multiline")]
        text: String,
        #[serde(default, skip_serializing_if = "is_default_metadata")]
        metadata: OutputMetadata,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: OutputMetadata,
    },
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: OutputMetadata,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
        #[serde(default, skip_serializing_if = "is_default_metadata")]
        metadata: OutputMetadata,
    },
}

fn is_default_metadata(metadata: &OutputMetadata) -> bool {
    metadata == &OutputMetadata::default()
}

impl Output {
    pub fn metadata(&self) -> &OutputMetadata {
        match self {
            Output::Stream { metadata, .. }
            | Output::DisplayData { metadata, .. }
            | Output::ExecuteResult { metadata, .. }
            | Output::Error { metadata, .. } => metadata,
        }
    }

    /// The MIME bundle of rich outputs; `None` for streams and errors.
    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl Cell {
    pub fn source(&self) -> &str {
        match self {
            Cell::Markdown(c) | Cell::Raw(c) => &c.source,
            Cell::Code(c) => &c.source,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Cell::Markdown(c) | Cell::Raw(c) => &c.metadata.tags,
            Cell::Code(c) => &c.metadata.tags,
        }
    }

    pub fn is_markdown(&self) -> bool {
        matches!(self, Cell::Markdown(_))
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Cell::Code(_))
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Cell::Markdown(TextCell {
            source: source.into(),
            ..TextCell::default()
        })
    }

    pub fn code(source: impl Into<String>) -> Self {
        Cell::Code(CodeCell {
            source: source.into(),
            ..CodeCell::default()
        })
    }
}

impl Notebook {
    /// An empty notebook in the current nbformat version.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            metadata: NotebookMetadata::default(),
            nbformat: default_nbformat(),
            nbformat_minor: default_nbformat_minor(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, NotebookError> {
        let content = fs::read_to_string(path).map_err(|source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| NotebookError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), NotebookError> {
        let io_err = |source| NotebookError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut json = serde_json::to_string_pretty(self).map_err(|source| {
            NotebookError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        json.push('\n');
        fs::write(path, json).map_err(io_err)
    }

    /// Drop every output and execution count (what "Clear All Outputs" does).
    pub fn clear_outputs(&mut self) {
        for cell in &mut self.cells {
            if let Cell::Code(code) = cell {
                code.outputs.clear();
                code.execution_count = None;
            }
        }
    }

    /// Index of the first executable cell.
    pub fn first_code_cell(&self) -> Option<usize> {
        self.cells.iter().position(Cell::is_code)
    }
}

/// Concatenate a MIME bundle value that may be a string or a list of lines.
pub fn mime_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(lines) => lines.iter().filter_map(Value::as_str).collect(),
        other => other.to_string(),
    }
}

mod multiline {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Lines(Vec<String>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Repr::deserialize(d)? {
            Repr::One(s) => s,
            Repr::Lines(lines) => lines.concat(),
        })
    }

    pub fn serialize<S: Serializer>(text: &str, s: S) -> Result<S::Ok, S::Error> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        lines.serialize(s)
    }
}
