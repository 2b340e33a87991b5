//! Notebook → plain Python script exporter.
//!
//! Produces what `jupyter nbconvert --to python` produces: markdown cells as
//! `#` comments, code cells under an `# In[n]:` marker, and IPython syntax
//! (`%magic`, `%%cell_magic`, `!shell`) rewritten to the equivalent
//! `get_ipython()` calls so the file is valid Python.

use super::{ExportError, ScriptExporter};
use crate::notebook::{Cell, Notebook};

/// Exports notebooks as Python scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonScriptExporter;

impl ScriptExporter for PythonScriptExporter {
    fn export_script(&self, nb: &Notebook) -> Result<String, ExportError> {
        let mut chunks = vec!["#!/usr/bin/env python\n# coding: utf-8".to_string()];

        for cell in &nb.cells {
            match cell {
                Cell::Markdown(text) => {
                    let commented: Vec<String> = text
                        .source
                        .trim_end()
                        .lines()
                        .map(|l| format!("# {l}").trim_end().to_string())
                        .collect();
                    chunks.push(commented.join("\n"));
                }
                Cell::Code(code) => {
                    let count = code
                        .execution_count
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| " ".to_string());
                    chunks.push(format!(
                        "# In[{count}]:\n\n\n{}",
                        rewrite_magics(code.source.trim_end())
                    ));
                }
                Cell::Raw(_) => {}
            }
        }

        let mut script = chunks.join("\n\n");
        script.push('\n');
        Ok(script)
    }

    fn extension(&self) -> &str {
        "py"
    }
}

/// Rewrite IPython-only syntax in a code cell to `get_ipython()` calls.
pub fn rewrite_magics(source: &str) -> String {
    let first = source.lines().position(|l| !l.trim().is_empty());
    if let Some(idx) = first {
        let lines: Vec<&str> = source.lines().collect();
        if let Some(magic) = lines[idx].trim_start().strip_prefix("%%") {
            let (name, args) = split_magic(magic);
            let body = lines[idx + 1..].join("\n");
            return format!(
                "get_ipython().run_cell_magic({}, {}, {})",
                py_quote(name),
                py_quote(args),
                py_quote(&body)
            );
        }
    }

    source
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            if let Some(magic) = trimmed.strip_prefix('%') {
                let (name, args) = split_magic(magic);
                format!(
                    "{indent}get_ipython().run_line_magic({}, {})",
                    py_quote(name),
                    py_quote(args)
                )
            } else if let Some(cmd) = trimmed.strip_prefix('!') {
                format!("{indent}get_ipython().system({})", py_quote(cmd.trim()))
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_magic(magic: &str) -> (&str, &str) {
    match magic.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (magic.trim(), ""),
    }
}

/// Single-quoted Python string literal.
fn py_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
