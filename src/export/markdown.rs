//! Notebook → Markdown (MyST) document exporter.
//!
//! Markdown cells are copied verbatim. Code cells become fenced blocks whose
//! info string is the kernel's lexer name (`ipython3` for Python), followed
//! by one block per output:
//!
//! | Output | Rendered as |
//! |---|---|
//! | stream, `text/plain` | ```` ```text ```` block |
//! | `image/png`, `image/jpeg`, `image/svg+xml` | `![png](output_<cell>_<n>.png)`, bytes in [`ExportedDocument::outputs`] |
//! | `text/html`, `text/markdown`, `text/latex` | inserted raw |
//! | error | traceback without terminal colors, in a `text` block |
//!
//! Rich outputs use the first MIME type present in [`MIME_PRIORITY`].

use super::{DocumentExporter, ExportError, ExportedDocument};
use crate::notebook::{Cell, Notebook, Output, mime_text};
use base64::Engine;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Order in which rich output representations are preferred.
pub const MIME_PRIORITY: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/svg+xml",
    "text/html",
    "text/markdown",
    "text/latex",
    "text/plain",
];

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

/// Renders notebooks as Markdown with extracted binary outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownExporter;

impl DocumentExporter for MarkdownExporter {
    fn export(&self, nb: &Notebook) -> Result<ExportedDocument, ExportError> {
        let lang = input_language(nb);
        let mut outputs = BTreeMap::new();
        let mut blocks: Vec<String> = Vec::new();

        for (ci, cell) in nb.cells.iter().enumerate() {
            match cell {
                Cell::Markdown(text) | Cell::Raw(text) => {
                    if !text.source.trim().is_empty() {
                        blocks.push(text.source.trim_end().to_string());
                    }
                }
                Cell::Code(code) => {
                    if !code.source.trim().is_empty() {
                        blocks.push(fenced(lang, &code.source));
                    }
                    for (oi, output) in code.outputs.iter().enumerate() {
                        if let Some(block) = render_output(ci, oi, output, &mut outputs)? {
                            blocks.push(block);
                        }
                    }
                }
            }
        }

        let mut text = blocks.join("\n\n");
        text.push('\n');
        Ok(ExportedDocument { text, outputs })
    }
}

/// Info string for input blocks.
fn input_language(nb: &Notebook) -> &str {
    match nb.metadata.language() {
        None | Some("python") => "ipython3",
        Some(other) => other,
    }
}

fn render_output(
    cell: usize,
    index: usize,
    output: &Output,
    files: &mut BTreeMap<String, Vec<u8>>,
) -> Result<Option<String>, ExportError> {
    match output {
        Output::Stream { text, .. } if !text.trim().is_empty() => Ok(Some(fenced("text", text))),
        Output::Stream { .. } => Ok(None),
        Output::Error { traceback, .. } => {
            let trace = ANSI_ESCAPE.replace_all(&traceback.join("\n"), "").into_owned();
            Ok(Some(fenced("text", &trace)))
        }
        Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
            render_mime_bundle(cell, index, data, files)
        }
    }
}

fn render_mime_bundle(
    cell: usize,
    index: usize,
    data: &Map<String, Value>,
    files: &mut BTreeMap<String, Vec<u8>>,
) -> Result<Option<String>, ExportError> {
    let Some((mime, value)) = MIME_PRIORITY
        .iter()
        .find_map(|m| data.get(*m).map(|v| (*m, v)))
    else {
        return Ok(None);
    };

    let payload = mime_text(value);
    let block = match mime {
        "image/png" | "image/jpeg" | "image/svg+xml" => {
            let ext = match mime {
                "image/png" => "png",
                "image/jpeg" => "jpg",
                _ => "svg",
            };
            let name = format!("output_{cell}_{index}.{ext}");
            let bytes = if ext == "svg" {
                payload.into_bytes()
            } else {
                let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
                base64::engine::general_purpose::STANDARD
                    .decode(cleaned)
                    .map_err(|source| ExportError::Decode {
                        name: name.clone(),
                        source,
                    })?
            };
            files.insert(name.clone(), bytes);
            format!("![{ext}]({name})")
        }
        "text/plain" => fenced("text", &payload),
        _ => payload.trim_end().to_string(),
    };
    Ok(Some(block))
}

/// Fence `body` with enough backticks that no run inside can close it.
fn fenced(info: &str, body: &str) -> String {
    let longest = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{info}\n{}\n{fence}", body.trim_end_matches('\n'))
}
