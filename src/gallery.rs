//! Gallery aggregation: directory trees of notebooks → nested index pages.
//!
//! A directory becomes a gallery node only when it contains a README
//! (`README.md`, `README.rst` or `README.txt`, in that order of preference).
//! Directories without one are skipped together with everything below them.
//!
//! ## Traversal
//!
//! Each examples tree is walked depth-first with an explicit stack of frames.
//! A frame owns its directory's remaining subdirectories (sorted by name), so
//! every subdirectory is visited exactly once and in order, and a directory's
//! index is written only after all of its children have been written:
//!
//! ```text
//! examples/                 gallery/
//! ├── README.md             ├── index.md            (written last)
//! ├── example_a.ipynb   →   ├── example_a.{ipynb,md,py}
//! ├── plots/                ├── plots/
//! │   ├── README.md         │   ├── index.md        (written first)
//! │   └── example_b.ipynb   │   └── example_b.{ipynb,md,py}
//! └── scratch/              └── _static/no_image.png
//!     └── example_c.ipynb       (no README: ignored)
//! ```
//!
//! ## Index pages
//!
//! An index page holds, in order: its reference target, the README verbatim,
//! a toctree of its notebooks and child indexes, a tile per notebook, and one
//! rubric per child listing that child's own tiles.
//!
//! Failures are absorbed per notebook or per directory and collected in the
//! [`BuildReport`]; siblings are still processed.

use crate::config::{ConfigError, GalleryConfig};
use crate::imaging::placeholder::PLACEHOLDER_PATH;
use crate::imaging::write_placeholder;
use crate::naming::{link_path, reference_label, relative_path, stem_of};
use crate::transform::{Collaborators, NotebookProcessor, TransformRequest, TransformResult};
use maud::{Markup, PreEscaped, html};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// README names that mark a gallery directory, most preferred first.
pub const README_NAMES: &[&str] = &["README.md", "README.rst", "README.txt"];

/// Name of the index page written into every gallery directory.
pub const INDEX_FILE: &str = "index.md";

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pipeline stage a failure was absorbed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Directory,
    Read,
    Execute,
    Transform,
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Directory => "directory",
            Stage::Read => "read",
            Stage::Execute => "execute",
            Stage::Transform => "transform",
            Stage::Index => "index",
        })
    }
}

/// A failure that was logged and skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub path: PathBuf,
    pub stage: Stage,
    pub message: String,
}

/// One written gallery directory.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryNode {
    pub label: String,
    pub input: PathBuf,
    pub output: PathBuf,
    /// The written index page.
    pub index: PathBuf,
    /// Notebooks directly in this directory, in file name order.
    pub results: Vec<TransformResult>,
    pub children: Vec<GalleryNode>,
}

impl GalleryNode {
    /// This node's results followed by all descendants' results.
    pub fn flatten(&self) -> Vec<&TransformResult> {
        let mut all: Vec<&TransformResult> = self.results.iter().collect();
        for child in &self.children {
            all.extend(child.flatten());
        }
        all
    }
}

/// Everything a build produced.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// One root node per examples tree that had a README.
    pub roots: Vec<GalleryNode>,
    /// Index pages in the order they were written (children first).
    pub pages: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl BuildReport {
    /// Every transform result, flattened across all roots.
    pub fn results(&self) -> Vec<&TransformResult> {
        self.roots.iter().flat_map(GalleryNode::flatten).collect()
    }

    fn fail(&mut self, path: &Path, stage: Stage, message: impl ToString) {
        self.failures.push(Failure {
            path: path.to_path_buf(),
            stage,
            message: message.to_string(),
        });
    }
}

/// A directory that would become a gallery node.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDir {
    pub input: PathBuf,
    pub output: PathBuf,
    pub label: String,
    pub readme: PathBuf,
    pub notebooks: Vec<PathBuf>,
}

/// What one directory contains, sorted by name.
#[derive(Debug, Default)]
struct Listing {
    readme: Option<PathBuf>,
    notebooks: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

/// One directory being processed; finalized once `pending` is exhausted.
struct Frame {
    input: PathBuf,
    output: PathBuf,
    readme: String,
    results: Vec<TransformResult>,
    pending: std::vec::IntoIter<PathBuf>,
    children: Vec<GalleryNode>,
}

/// Paths shared by every directory of one examples tree.
struct TreeRoots<'p> {
    examples: &'p Path,
    /// Labels are computed from output paths relative to this directory.
    label_base: &'p Path,
    /// Canonical gallery root, never walked as input.
    guard: Option<PathBuf>,
}

/// Builds galleries for every configured examples tree.
pub struct Gallery<'a> {
    config: &'a GalleryConfig,
    services: Collaborators<'a>,
    pattern: Regex,
    execute: bool,
}

impl<'a> Gallery<'a> {
    pub fn new(config: &'a GalleryConfig, services: Collaborators<'a>) -> Result<Self, GalleryError> {
        config.validate()?;
        Ok(Self {
            config,
            services,
            pattern: config.pattern_regex()?,
            execute: true,
        })
    }

    /// Disable execution for every notebook regardless of configuration.
    pub fn without_execution(mut self) -> Self {
        self.execute = false;
        self
    }

    /// Process every `(examples dir, gallery dir)` pair.
    pub fn build(&self) -> BuildReport {
        let mut report = BuildReport::default();
        for (examples, gallery) in self.config.gallery_pairs() {
            self.build_tree(&examples, &gallery, &mut report);
        }
        report
    }

    /// Process one examples tree into `gallery`.
    pub fn build_tree(&self, examples: &Path, gallery: &Path, report: &mut BuildReport) {
        if !examples.is_dir() {
            warn!(path = %examples.display(), "examples directory not found");
            report.fail(examples, Stage::Directory, "examples directory not found");
            return;
        }
        if let Err(source) = fs::create_dir_all(gallery) {
            error!(path = %gallery.display(), error = %source, "cannot create gallery directory");
            report.fail(gallery, Stage::Directory, source);
            return;
        }

        let [w, h] = self.config.thumbnails.size;
        let placeholder = write_placeholder(gallery, (w, h)).unwrap_or_else(|e| {
            warn!(error = %e, "placeholder thumbnail not written");
            gallery.join(PLACEHOLDER_PATH)
        });
        let processor = NotebookProcessor::new(self.services, placeholder, self.config);
        let roots = TreeRoots {
            examples,
            label_base: gallery.parent().unwrap_or(Path::new("")),
            guard: gallery.canonicalize().ok(),
        };

        let Some(root) = self.visit(examples, gallery, &roots, &processor, report) else {
            warn!(path = %examples.display(), "examples directory is not a gallery node");
            return;
        };
        let mut stack = vec![root];

        while let Some(top) = stack.last_mut() {
            if let Some(sub) = top.pending.next() {
                let output = match sub.file_name() {
                    Some(name) => top.output.join(name),
                    None => continue,
                };
                if let Some(frame) = self.visit(&sub, &output, &roots, &processor, report) {
                    stack.push(frame);
                }
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let node = self.finalize(frame, &roots, report);
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => report.roots.push(node),
            }
        }
    }

    /// Directories that would become gallery nodes, in traversal order,
    /// without writing anything.
    pub fn survey(&self) -> (Vec<PlannedDir>, Vec<Failure>) {
        let mut planned = Vec::new();
        let mut report = BuildReport::default();

        for (examples, gallery) in self.config.gallery_pairs() {
            if !examples.is_dir() {
                report.fail(&examples, Stage::Directory, "examples directory not found");
                continue;
            }
            let roots = TreeRoots {
                examples: &examples,
                label_base: gallery.parent().unwrap_or(Path::new("")),
                guard: gallery.canonicalize().ok(),
            };
            let mut stack = vec![(examples.clone(), gallery.clone())];
            while let Some((input, output)) = stack.pop() {
                let listing = match self.list(&input, &roots) {
                    Ok(listing) => listing,
                    Err(e) => {
                        report.fail(&input, Stage::Directory, e);
                        continue;
                    }
                };
                let Some(readme) = listing.readme else { continue };
                for sub in listing.subdirs.iter().rev() {
                    if let Some(name) = sub.file_name() {
                        stack.push((sub.clone(), output.join(name)));
                    }
                }
                planned.push(PlannedDir {
                    label: label_for(&output, &roots),
                    input,
                    output,
                    readme,
                    notebooks: listing.notebooks,
                });
            }
        }
        (planned, report.failures)
    }

    /// Enter a directory: process its notebooks and return its frame, or
    /// `None` when it is not a gallery node.
    fn visit(
        &self,
        input: &Path,
        output: &Path,
        roots: &TreeRoots<'_>,
        processor: &NotebookProcessor<'_>,
        report: &mut BuildReport,
    ) -> Option<Frame> {
        let listing = match self.list(input, roots) {
            Ok(listing) => listing,
            Err(e) => {
                error!(path = %input.display(), error = %e, "cannot list directory");
                report.fail(input, Stage::Directory, e);
                return None;
            }
        };
        let Some(readme_path) = listing.readme else {
            debug!(path = %input.display(), "no README, skipping directory");
            return None;
        };
        let readme = match fs::read_to_string(&readme_path) {
            Ok(text) => text,
            Err(e) => {
                error!(path = %readme_path.display(), error = %e, "cannot read README");
                report.fail(&readme_path, Stage::Directory, e);
                return None;
            }
        };
        if let Err(e) = fs::create_dir_all(output) {
            error!(path = %output.display(), error = %e, "cannot create output directory");
            report.fail(output, Stage::Directory, e);
            return None;
        }

        let results = listing
            .notebooks
            .iter()
            .filter_map(|nb| self.process(nb, output, roots, processor, report))
            .collect();

        Some(Frame {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            readme,
            results,
            pending: listing.subdirs.into_iter(),
            children: Vec::new(),
        })
    }

    fn process(
        &self,
        source: &Path,
        output_dir: &Path,
        roots: &TreeRoots<'_>,
        processor: &NotebookProcessor<'_>,
        report: &mut BuildReport,
    ) -> Option<TransformResult> {
        let name = source.file_name()?;
        let destination = output_dir.join(name);
        let key = link_path(source.strip_prefix(roots.examples).unwrap_or(source));
        let mut overrides = self.config.overrides_for(&key);
        overrides.execute &= self.execute;

        let request = match TransformRequest::prepare(
            source,
            &destination,
            label_for(&destination, roots),
            overrides,
        ) {
            Ok(request) => request,
            Err(e) => {
                error!(notebook = %source.display(), error = %e, "cannot read notebook");
                report.fail(source, Stage::Read, e);
                return None;
            }
        };

        info!(notebook = %key, "processing");
        let started = Instant::now();
        match processor.transform(&request) {
            Ok(result) => {
                if let Some(message) = &result.execution_error {
                    report.fail(source, Stage::Execute, message);
                }
                debug!(
                    notebook = %key,
                    seconds = started.elapsed().as_secs_f64(),
                    "transformed"
                );
                Some(result)
            }
            Err(e) => {
                error!(notebook = %source.display(), error = %e, "transform failed");
                report.fail(source, Stage::Transform, e);
                None
            }
        }
    }

    /// Write the index page of a finished frame.
    fn finalize(&self, frame: Frame, roots: &TreeRoots<'_>, report: &mut BuildReport) -> GalleryNode {
        let label = label_for(&frame.output, roots);
        let index = frame.output.join(INDEX_FILE);
        let page = render_index(
            &label,
            &frame.readme,
            &frame.results,
            &frame.children,
            &frame.output,
            &self.config.link_extension,
        );
        match fs::write(&index, page) {
            Ok(()) => {
                info!(index = %index.display(), notebooks = frame.results.len(), "wrote index");
                report.pages.push(index.clone());
            }
            Err(e) => {
                error!(index = %index.display(), error = %e, "cannot write index");
                report.fail(&index, Stage::Index, e);
            }
        }
        GalleryNode {
            label,
            input: frame.input,
            output: frame.output,
            index,
            results: frame.results,
            children: frame.children,
        }
    }

    fn list(&self, dir: &Path, roots: &TreeRoots<'_>) -> Result<Listing, walkdir::Error> {
        let mut listing = Listing::default();
        let mut readmes = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                let is_output = roots.guard.is_some() && path.canonicalize().ok() == roots.guard;
                if !is_output {
                    listing.subdirs.push(path);
                }
            } else if let Some(rank) = README_NAMES.iter().position(|r| *r == name) {
                readmes.push((rank, path));
            } else if self.pattern.is_match(&name) {
                listing.notebooks.push(path);
            }
        }

        listing.readme = readmes.into_iter().min_by_key(|(rank, _)| *rank).map(|(_, p)| p);
        Ok(listing)
    }
}

/// Reference label of an output path, relative to the gallery root's parent.
fn label_for(output: &Path, roots: &TreeRoots<'_>) -> String {
    reference_label(output.strip_prefix(roots.label_base).unwrap_or(output))
}

/// Render an index page.
pub fn render_index(
    label: &str,
    readme: &str,
    results: &[TransformResult],
    children: &[GalleryNode],
    output_dir: &Path,
    link_extension: &str,
) -> String {
    let mut page = format!("({label})=\n\n{}\n\n", readme.trim_end());

    page.push_str("```{toctree}\n");
    for result in results {
        page.push_str(&stem_of(&result.document));
        page.push('\n');
    }
    for child in children {
        let rel = relative_path(&child.index.with_extension(""), output_dir);
        page.push_str(&link_path(&rel));
        page.push('\n');
    }
    page.push_str("```\n\n");

    push_tiles(&mut page, results, output_dir, link_extension);

    for child in children {
        page.push_str(&format!("```{{rubric}} {{ref}}`{}`\n```\n\n", child.label));
        push_tiles(&mut page, &child.results, output_dir, link_extension);
    }

    page.truncate(page.trim_end().len());
    page.push('\n');
    page
}

fn push_tiles(page: &mut String, results: &[TransformResult], output_dir: &Path, ext: &str) {
    for result in results {
        page.push_str(&tile(result, output_dir, ext).into_string());
        page.push_str("\n\n");
    }
    page.push_str(&clear_div().into_string());
    page.push_str("\n\n");
}

/// Gallery tile for one notebook: its code example, or its thumbnail.
///
/// Rendered on a single line so the Markdown parser keeps it as one HTML
/// block.
pub fn tile(result: &TransformResult, output_dir: &Path, link_extension: &str) -> Markup {
    let href = link_path(&relative_path(
        &result.document.with_extension(link_extension),
        output_dir,
    ));
    let title = if result.title.is_empty() {
        stem_of(&result.document)
    } else {
        result.title.clone()
    };

    html! {
        div.sphx-glr-thumbContainer tooltip=(result.description) {
            @if let Some(code) = &result.code_example {
                pre { code.language-python { (single_line(code)) } }
            } @else {
                img src=(link_path(&relative_path(&result.thumbnail, output_dir))) alt=(title);
            }
            p { a.reference.internal href=(href) { (title) } }
        }
    }
}

/// Escaped text with newlines as character references.
fn single_line(text: &str) -> PreEscaped<String> {
    PreEscaped(html! { (text) }.into_string().replace('\n', "&#10;"))
}

fn clear_div() -> Markup {
    html! { div style="clear:both" {} }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(dir: &Path, stem: &str, title: &str) -> TransformResult {
        TransformResult {
            source: PathBuf::from(format!("/in/{stem}.ipynb")),
            notebook: dir.join(format!("{stem}.ipynb")),
            script: dir.join(format!("{stem}.py")),
            document: dir.join(format!("{stem}.md")),
            images: vec![],
            thumbnail: dir.join(format!("images/thumb/gallery_{stem}_thumb.png")),
            title: title.into(),
            description: format!("About {title}"),
            code_example: None,
            reference: format!("gallery_{stem}"),
            execution_error: None,
        }
    }

    #[test]
    fn thumbnail_tile_links_document() {
        let out = Path::new("/site/gallery");
        let markup = tile(&result(out, "example_a", "Alpha & co"), out, "html").into_string();
        assert_eq!(
            markup,
            "<div class=\"sphx-glr-thumbContainer\" tooltip=\"About Alpha &amp; co\">\
             <img src=\"images/thumb/gallery_example_a_thumb.png\" alt=\"Alpha &amp; co\">\
             <p><a class=\"reference internal\" href=\"example_a.html\">Alpha &amp; co</a></p></div>"
        );
    }

    #[test]
    fn code_tile_keeps_single_line() {
        let out = Path::new("/site/gallery");
        let mut r = result(out, "example_c", "Code");
        r.code_example = Some("x = 1\n\ny = x < 2".into());
        let markup = tile(&r, out, "html").into_string();
        assert!(markup.contains("<pre><code class=\"language-python\">x = 1&#10;&#10;y = x &lt; 2</code></pre>"));
        assert!(!markup.contains('\n'));
        assert!(!markup.contains("<img"));
    }

    #[test]
    fn untitled_notebook_uses_file_stem() {
        let out = Path::new("/g");
        let markup = tile(&result(out, "example_z", ""), out, "html").into_string();
        assert!(markup.contains(">example_z</a>"));
    }

    #[test]
    fn index_lists_own_and_child_tiles() {
        let out = Path::new("/site/gallery");
        let sub = out.join("plots");
        let child = GalleryNode {
            label: "gallery_gallery_plots".into(),
            input: PathBuf::from("/in/plots"),
            output: sub.clone(),
            index: sub.join("index.md"),
            results: vec![result(&sub, "example_b", "Beta")],
            children: vec![],
        };
        let page = render_index(
            "gallery_gallery",
            "# Examples\n\nAll of them.\n",
            &[result(out, "example_a", "Alpha")],
            &[child],
            out,
            "html",
        );

        assert!(page.starts_with("(gallery_gallery)=\n\n# Examples\n\nAll of them.\n\n"));
        assert!(page.contains("```{toctree}\nexample_a\nplots/index\n```\n"));
        assert!(page.contains("```{rubric} {ref}`gallery_gallery_plots`\n```"));
        assert!(page.contains("href=\"plots/example_b.html\""));
        assert!(page.contains("src=\"plots/images/thumb/gallery_example_b_thumb.png\""));
        assert_eq!(page.matches("<div style=\"clear:both\"></div>").count(), 2);
        assert!(page.ends_with("</div>\n"));

        let own = page.find("example_a.html").unwrap();
        let rubric = page.find("{rubric}").unwrap();
        let child_tile = page.find("plots/example_b.html").unwrap();
        assert!(own < rubric && rubric < child_tile);
    }

    fn node(label: &str, results: Vec<TransformResult>, children: Vec<GalleryNode>) -> GalleryNode {
        GalleryNode {
            label: label.into(),
            input: PathBuf::new(),
            output: PathBuf::new(),
            index: PathBuf::new(),
            results,
            children,
        }
    }

    #[test]
    fn flatten_orders_parent_before_descendants() {
        let leaf = node("c", vec![result(Path::new("/c"), "example_c", "C")], vec![]);
        let mid = node("b", vec![result(Path::new("/b"), "example_b", "B")], vec![leaf]);
        let root = node("a", vec![result(Path::new("/a"), "example_a", "A")], vec![mid]);
        let titles: Vec<&str> = root.flatten().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Execute.to_string(), "execute");
        assert_eq!(Stage::Index.to_string(), "index");
    }
}
