//! Content filtering for exported documents and scripts.
//!
//! Three jobs, all pure text transforms:
//!
//! - [`filter_document`] removes IPython shell directives (`%matplotlib inline`,
//!   `%%time`, ...) from the `ipython` code blocks of a rendered Markdown
//!   document, dropping blocks that end up empty, and optionally injects a
//!   prelude (asset include tags) once before the first surviving block.
//! - [`comment_disabled_calls`] comments out `get_ipython()` calls in an
//!   exported Python script so it can be run outside IPython.
//! - [`extract_summary`] pulls a title and a one-paragraph description out of
//!   the leading markdown cells of a notebook for gallery tiles.
//!
//! Code blocks are located with pulldown-cmark's offset iterator, so fences
//! inside other blocks or of unusual length are handled the same way a
//! renderer would see them. Output blocks (`text`, images, HTML) are never
//! touched.

use crate::notebook::{Cell, Notebook};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Info strings of code blocks holding notebook input.
static INPUT_INFO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ipython\d*$").unwrap());

/// `get_ipython()` calls produced by nbconvert for magics and shell escapes.
static DISABLED_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?P<indent>[ \t]*)(?P<call>get_ipython\(\)\.(?:magic|run_line_magic|run_cell_magic|system|getoutput)\b.*)$",
    )
    .unwrap()
});

/// Remove shell-directive lines from input code blocks.
///
/// Equivalent to [`filter_document`] without a prelude.
pub fn strip_shell_directives(doc: &str) -> String {
    filter_document(doc, None)
}

/// Remove shell-directive lines from input code blocks and inject `prelude`.
///
/// A block whose remaining content is blank is dropped together with its
/// fences. The prelude goes immediately before the first block that
/// survives; if input blocks existed but none survived it is appended to the
/// end. A document without input blocks is returned unchanged.
pub fn filter_document(doc: &str, prelude: Option<&str>) -> String {
    let blocks = input_blocks(doc);
    if blocks.is_empty() {
        return doc.to_string();
    }

    let mut prelude = prelude.filter(|p| !p.is_empty());
    let mut out = String::with_capacity(doc.len());
    let mut cursor = 0;

    for block in blocks {
        out.push_str(&doc[cursor..block.start]);
        match strip_block(&doc[block.clone()]) {
            Some(kept) => {
                if let Some(p) = prelude.take() {
                    push_prelude(&mut out, p);
                }
                out.push_str(&kept);
                cursor = block.end;
            }
            None => {
                // Swallow the newline that terminated the dropped block
                let terminated = doc[..block.end].ends_with('\n');
                cursor = if !terminated && doc[block.end..].starts_with('\n') {
                    block.end + 1
                } else {
                    block.end
                };
            }
        }
    }

    if let Some(p) = prelude {
        push_prelude(&mut out, p);
    }
    out.push_str(&doc[cursor..]);
    out
}

fn push_prelude(out: &mut String, prelude: &str) {
    out.push_str(prelude);
    if !prelude.ends_with('\n') {
        out.push('\n');
    }
}

/// Byte ranges of fenced `ipython` blocks, fences included.
fn input_blocks(doc: &str) -> Vec<Range<usize>> {
    Parser::new(doc)
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if info
                    .split_whitespace()
                    .next()
                    .is_some_and(|lang| INPUT_INFO.is_match(lang)) =>
            {
                Some(range)
            }
            _ => None,
        })
        .collect()
}

/// Filter one fenced block. `None` means nothing but directives was left.
fn strip_block(block: &str) -> Option<String> {
    let lines: Vec<&str> = block.split_inclusive('\n').collect();
    let (opening, rest) = lines.split_first()?;

    let closing_idx = rest
        .iter()
        .rposition(|l| is_fence(l))
        .filter(|&i| i + 1 == rest.len() || rest[i + 1..].iter().all(|l| l.trim().is_empty()));
    let (content, closing) = match closing_idx {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, &[][..]),
    };

    let kept: Vec<&str> = content
        .iter()
        .copied()
        .filter(|l| !l.trim_start().starts_with('%'))
        .collect();
    if kept.iter().all(|l| l.trim().is_empty()) {
        return None;
    }

    let mut out = String::with_capacity(block.len());
    out.push_str(opening);
    kept.iter().for_each(|l| out.push_str(l));
    closing.iter().for_each(|l| out.push_str(l));
    Some(out)
}

fn is_fence(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 3 && (t.chars().all(|c| c == '`') || t.chars().all(|c| c == '~'))
}

/// Comment out `get_ipython()` call lines, keeping their text after `# `.
pub fn comment_disabled_calls(script: &str) -> String {
    DISABLED_CALL
        .replace_all(script, "${indent}# ${call}")
        .into_owned()
}

/// Title and description of a notebook for its gallery tile.
///
/// Only the first cell is considered for the title and it must be markdown;
/// otherwise both strings are empty. When the first cell yields no
/// description and the second cell is markdown, the description comes from
/// the second cell.
pub fn extract_summary(nb: &Notebook) -> (String, String) {
    let Some(Cell::Markdown(first)) = nb.cells.first() else {
        return (String::new(), String::new());
    };

    let (title, mut description) = split_header(&first.source, true);
    if description.is_empty()
        && let Some(Cell::Markdown(second)) = nb.cells.get(1)
    {
        description = split_header(&second.source, false).1;
    }
    (title, description)
}

/// Split markdown `text` into a heading and its first paragraph.
///
/// Supports ATX headings (`# Title`) and setext headings (a title line with
/// an `===`/`---` underline, optionally with an overline too). With
/// `with_title` false nothing is consumed as a heading and the whole text is
/// searched for the paragraph.
pub fn split_header(text: &str, with_title: bool) -> (String, String) {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    if lines.is_empty() {
        return (String::new(), String::new());
    }

    let is_rule = |l: &str| l.starts_with('=') || l.starts_with('-');

    let title = if !with_title {
        String::new()
    } else if lines[0].starts_with('#') {
        lines.remove(0).trim_start_matches('#').trim().to_string()
    } else {
        if is_rule(lines[0]) {
            lines.remove(0);
        }
        let title = if lines.is_empty() {
            String::new()
        } else {
            lines.remove(0).trim().to_string()
        };
        if lines.first().is_some_and(|l| is_rule(l)) {
            lines.remove(0);
        }
        title
    };

    if lines.is_empty() {
        return (title, String::new());
    }
    let rest = lines.join("\n");
    let paragraph = rest.trim_start().split("\n\n").next().unwrap_or_default();
    (title, paragraph.replace('\n', " "))
}
