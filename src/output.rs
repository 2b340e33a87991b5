//! CLI output formatting for builds and surveys.
//!
//! # Information-First Display
//!
//! Every entity (gallery directory, notebook) leads with its semantic
//! identity: a positional index and its title or label. Filesystem paths
//! are secondary context on indented lines, so the output reads as a content
//! inventory that can still be traced back to files.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! gallery_gallery (1 notebook) → gallery/index.md
//!     001 Demo → gallery/example_demo.md
//!         Source: examples/example_demo.ipynb
//!         Thumbnail: gallery/images/thumb/gallery_gallery_example_demo.ipynb_thumb.png
//!     gallery_gallery_plots (2 notebooks) → gallery/plots/index.md
//!         001 Sine wave → gallery/plots/example_sine.md
//!             Source: examples/plots/example_sine.ipynb
//!             Execution failed: cell 2 raised ValueError: boom
//!
//! Failures
//!     execute: examples/plots/example_sine.ipynb
//!         cell 2 raised ValueError: boom
//!
//! Built 2 index pages, 3 notebooks, 1 failure
//! ```
//!
//! ## Check
//!
//! ```text
//! gallery_gallery ← examples/README.md
//!     001 example_demo.ipynb
//! gallery_gallery_plots ← examples/plots/README.md
//!     001 example_sine.ipynb
//!
//! 2 gallery directories, 2 notebooks
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: paths are shown relative to `base` and nothing is
//! read from disk.

use crate::gallery::{BuildReport, Failure, GalleryNode, PlannedDir};
use crate::transform::TransformResult;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Gallery directory header: label and notebook count.
///
/// ```text
/// gallery_gallery_plots (2 notebooks)
/// ```
fn node_header(label: &str, count: usize) -> String {
    format!("{} ({})", label, plural(count, "notebook"))
}

/// Notebook line: titled notebooks show the title, untitled the file name.
///
/// ```text
/// 001 Sine wave
/// 002 (example_untitled.ipynb)
/// ```
fn notebook_line(index: usize, title: &str, filename: &str) -> String {
    if title.is_empty() {
        format!("{} ({})", format_index(index), filename)
    } else {
        format!("{} {}", format_index(index), title)
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn shown(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Build output
// ============================================================================

/// Format a finished build: the node tree, absorbed failures and totals.
pub fn format_build_report(report: &BuildReport, base: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    // Explicit stack, children pushed in reverse to print in order
    let mut stack: Vec<(&GalleryNode, usize)> = report.roots.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        lines.push(format!(
            "{}{} → {}",
            indent(depth),
            node_header(&node.label, node.results.len()),
            shown(&node.index, base)
        ));
        for (i, result) in node.results.iter().enumerate() {
            lines.extend(format_result(i + 1, result, depth + 1, base));
        }
        stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        for failure in &report.failures {
            lines.extend(format_failure(failure, base));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Built {}, {}, {}",
        plural(report.pages.len(), "index page"),
        plural(report.results().len(), "notebook"),
        plural(report.failures.len(), "failure")
    ));
    lines
}

fn format_result(index: usize, result: &TransformResult, depth: usize, base: &Path) -> Vec<String> {
    let pad = indent(depth);
    let mut lines = vec![format!(
        "{}{} → {}",
        pad,
        notebook_line(index, &result.title, &file_name(&result.source)),
        shown(&result.document, base)
    )];
    lines.push(format!("{pad}    Source: {}", shown(&result.source, base)));
    if !result.description.is_empty() {
        lines.push(format!("{pad}    {}", truncate_desc(&result.description, 60)));
    }
    lines.push(format!("{pad}    Thumbnail: {}", shown(&result.thumbnail, base)));
    if let Some(error) = &result.execution_error {
        lines.push(format!("{pad}    Execution failed: {error}"));
    }
    lines
}

fn format_failure(failure: &Failure, base: &Path) -> Vec<String> {
    vec![
        format!("    {}: {}", failure.stage, shown(&failure.path, base)),
        format!("        {}", failure.message),
    ]
}

/// Print build output to stdout.
pub fn print_build_report(report: &BuildReport, base: &Path) {
    for line in format_build_report(report, base) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the directories and notebooks a build would process.
pub fn format_survey(planned: &[PlannedDir], failures: &[Failure], base: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for dir in planned {
        lines.push(format!("{} ← {}", dir.label, shown(&dir.readme, base)));
        for (i, nb) in dir.notebooks.iter().enumerate() {
            lines.push(format!("    {} {}", format_index(i + 1), file_name(nb)));
        }
    }

    if !failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        for failure in failures {
            lines.extend(format_failure(failure, base));
        }
    }

    let notebooks: usize = planned.iter().map(|d| d.notebooks.len()).sum();
    let dirs = match planned.len() {
        1 => "1 gallery directory".to_string(),
        n => format!("{n} gallery directories"),
    };
    lines.push(String::new());
    lines.push(format!("{dirs}, {}", plural(notebooks, "notebook")));
    lines
}

/// Print check output to stdout.
pub fn print_survey(planned: &[PlannedDir], failures: &[Failure], base: &Path) {
    for line in format_survey(planned, failures, base) {
        println!("{}", line);
    }
}
