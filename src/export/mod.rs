//! Collaborators the transform unit delegates to.
//!
//! | Concern | Trait | Production implementation |
//! |---|---|---|
//! | **Execute** a notebook | [`Executor`] | [`JupyterExecutor`] (`jupyter nbconvert --execute`) |
//! | **Render** a notebook to Markdown | [`DocumentExporter`] | [`MarkdownExporter`] |
//! | **Export** a plain script | [`ScriptExporter`] | [`PythonScriptExporter`] |
//! | **Inject** client assets | [`AssetInjector`] | [`BokehAssets`] |
//! | **Link** to a public viewer | [`nbviewer_link`] | |
//!
//! Each trait is the seam tests use to replace the real thing: a scripted
//! executor needs no Jupyter installation.

mod assets;
mod execute;
mod markdown;
mod script;

pub use assets::{AssetInjector, BokehAssets, DEFAULT_BOKEH_VERSION, nbviewer_link};
pub use execute::{ExecutionError, ExecutionOutcome, Executor, JupyterExecutor, first_error};
pub use markdown::MarkdownExporter;
pub use script::{PythonScriptExporter, rewrite_magics};

#[cfg(test)]
pub(crate) use execute::tests::ScriptedExecutor;

use crate::notebook::Notebook;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid base64 in output {name}: {source}")]
    Decode {
        name: String,
        source: base64::DecodeError,
    },
}

/// A rendered document and the binary outputs it references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportedDocument {
    /// Document text; binary outputs are referenced by their key.
    pub text: String,
    /// Extracted binary outputs keyed by the name used in `text`.
    pub outputs: BTreeMap<String, Vec<u8>>,
}

/// Turns a notebook into a rendered document.
pub trait DocumentExporter {
    fn export(&self, nb: &Notebook) -> Result<ExportedDocument, ExportError>;
}

/// Turns a notebook into a plain script.
pub trait ScriptExporter {
    fn export_script(&self, nb: &Notebook) -> Result<String, ExportError>;

    /// File extension of produced scripts (without the dot).
    fn extension(&self) -> &str;
}
