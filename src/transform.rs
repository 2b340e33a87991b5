//! The notebook transform unit: one notebook in, a set of artifacts out.
//!
//! ## Artifacts
//!
//! For `examples/example_basic.ipynb` rendered into `gallery/`:
//!
//! ```text
//! gallery/
//! ├── example_basic.ipynb             # distributable notebook (outputs cleared on request)
//! ├── example_basic.md                # rendered document with download section
//! ├── example_basic.py                # plain script, shell calls commented out
//! └── images/
//!     ├── example_basic_0.png         # extracted figures, in document order
//!     └── thumb/
//!         └── gallery_gallery_example_basic.ipynb_thumb.png
//! ```
//!
//! ## Stages
//!
//! 1. Insert a warning-silencing cell before the first code cell (execution only)
//! 2. Execute in the notebook's source directory; a raising cell is recorded, not fatal
//! 3. Apply tag-based removal to a copy used for the document only
//! 4. Render the document, strip shell directives, inject client assets once
//! 5. Rename extracted figures to `images/<stem>_<n>.<ext>` and write them
//! 6. Prepend the reference target, append the download section
//! 7. Copy supplementary files and list the downloadable ones
//! 8. Clear outputs on request and write the distributable notebook
//! 9. Export the script and comment out `get_ipython()` calls
//! 10. Pick and scale the thumbnail, falling back to the placeholder

use crate::config::{GalleryConfig, NotebookOverrides, TagsConfig};
use crate::export::{
    AssetInjector, DocumentExporter, ExportError, Executor, ScriptExporter, nbviewer_link,
};
use crate::filter::{comment_disabled_calls, extract_summary, filter_document};
use crate::imaging::{ImageBackend, ThumbnailOutcome, is_thumbnail_candidate, make_thumbnail};
use crate::naming::{IMAGES_DIR, image_name, stem_of, thumb_name};
use crate::notebook::{Cell, Notebook, NotebookError, ThumbnailSelector};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Source of the cell that routes Python warnings into a silenced logger.
pub const SILENCE_WARNINGS: &str = "import logging\n\
                                    logging.captureWarnings(True)\n\
                                    logging.getLogger('py.warnings').setLevel(logging.ERROR)";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Notebook(#[from] NotebookError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> TransformError + '_ {
    move |source| TransformError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the thumbnail comes from, resolved before processing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailChoice {
    /// Index into the extracted figures; negative counts from the end.
    Figure(i64),
    /// An image file copied to `copy_to` and scaled from there.
    File { source: PathBuf, copy_to: PathBuf },
}

/// Everything one transform needs, fixed before it starts.
///
/// Configuration overrides win over notebook metadata; metadata fills what
/// the configuration leaves unset.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Cross-reference label of the rendered document.
    pub reference: String,
    pub notebook: Notebook,
    pub execute: bool,
    pub clear: bool,
    pub code_example: Option<String>,
    pub supplementary_files: Vec<String>,
    pub other_supplementary_files: Vec<String>,
    pub thumbnail: Option<ThumbnailChoice>,
    /// Public viewer URL for the notebook, if its source URL is known.
    pub viewer_url: Option<String>,
}

impl TransformRequest {
    /// Read the source notebook and resolve per-notebook settings.
    pub fn prepare(
        source: &Path,
        destination: &Path,
        reference: String,
        overrides: NotebookOverrides,
    ) -> Result<Self, TransformError> {
        let notebook = Notebook::read(source)?;
        let meta = &notebook.metadata;
        let source_dir = parent_dir(source);
        let dest_dir = parent_dir(destination);

        let thumbnail = match (overrides.thumbnail_figure, &meta.thumbnail_figure) {
            (Some(ThumbnailSelector::Index(i)), _) => Some(ThumbnailChoice::Figure(i)),
            (Some(ThumbnailSelector::Path(p)), _) => Some(ThumbnailChoice::File {
                copy_to: dest_dir.join(file_name(&p)),
                source: p,
            }),
            (None, Some(ThumbnailSelector::Index(i))) => Some(ThumbnailChoice::Figure(*i)),
            (None, Some(ThumbnailSelector::Path(p))) => Some(ThumbnailChoice::File {
                source: source_dir.join(p),
                copy_to: dest_dir.join(IMAGES_DIR).join(file_name(p)),
            }),
            (None, None) => None,
        };

        let url = overrides.url.or_else(|| meta.url.clone());

        Ok(Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            reference,
            execute: overrides.execute,
            clear: overrides.clear,
            code_example: overrides.code_example.or_else(|| meta.code_example.clone()),
            supplementary_files: overrides
                .supplementary_files
                .or_else(|| meta.supplementary_files.clone())
                .unwrap_or_default(),
            other_supplementary_files: overrides
                .other_supplementary_files
                .or_else(|| meta.other_supplementary_files.clone())
                .unwrap_or_default(),
            thumbnail,
            viewer_url: url.as_deref().and_then(nbviewer_link),
            notebook,
        })
    }
}

/// Artifacts and summary of one transformed notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformResult {
    pub source: PathBuf,
    /// Distributable notebook.
    pub notebook: PathBuf,
    pub script: PathBuf,
    /// Rendered Markdown document.
    pub document: PathBuf,
    /// Extracted figures in document order.
    pub images: Vec<PathBuf>,
    /// Scaled thumbnail, or the placeholder.
    pub thumbnail: PathBuf,
    pub title: String,
    pub description: String,
    pub code_example: Option<String>,
    pub reference: String,
    /// First execution failure, if the notebook did not run cleanly.
    pub execution_error: Option<String>,
}

/// What the execution stage hands on to the later stages.
struct Execution {
    notebook: Notebook,
    error: Option<String>,
    /// The executor returned no notebook; `notebook` is the one as loaded.
    aborted: bool,
}

impl Execution {
    fn skipped(notebook: Notebook) -> Self {
        Self {
            notebook,
            error: None,
            aborted: false,
        }
    }
}

/// External services a [`NotebookProcessor`] delegates to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub executor: &'a dyn Executor,
    pub exporter: &'a dyn DocumentExporter,
    pub script_exporter: &'a dyn ScriptExporter,
    /// Client assets for rendered documents; `None` injects nothing.
    pub assets: Option<&'a dyn AssetInjector>,
    pub backend: &'a dyn ImageBackend,
}

/// Runs [`TransformRequest`]s through every stage.
pub struct NotebookProcessor<'a> {
    services: Collaborators<'a>,
    placeholder: PathBuf,
    thumbnail_box: (u32, u32),
    disable_warnings: bool,
    tags: TagsConfig,
}

impl<'a> NotebookProcessor<'a> {
    pub fn new(services: Collaborators<'a>, placeholder: PathBuf, config: &GalleryConfig) -> Self {
        let [w, h] = config.thumbnails.size;
        Self {
            services,
            placeholder,
            thumbnail_box: (w, h),
            disable_warnings: config.disable_warnings,
            tags: config.tags.clone(),
        }
    }

    pub fn transform(&self, req: &TransformRequest) -> Result<TransformResult, TransformError> {
        let dest_dir = parent_dir(&req.destination);
        fs::create_dir_all(dest_dir.join(IMAGES_DIR)).map_err(io_at(&dest_dir))?;
        let stem = stem_of(&req.destination);

        let Execution {
            notebook: mut executed,
            error: execution_error,
            aborted,
        } = self.execute(req);

        let for_document = if self.tags.is_empty() {
            executed.clone()
        } else {
            remove_tagged(&executed, &self.tags)
        };

        // Document
        let exported = self.services.exporter.export(&for_document)?;
        let prelude = self
            .services
            .assets
            .and_then(|assets| assets.prelude(&exported.text));
        let mut text = filter_document(&exported.text, prelude.as_deref());

        let images = write_figures(&mut text, &exported.outputs, &stem, &dest_dir)?;

        let script_name = format!("{stem}.{}", self.services.script_exporter.extension());
        let notebook_name = file_name(&req.destination);
        let mut document = format!("({})=\n\n{}", req.reference, text.trim_end());
        if aborted && let Some(message) = &execution_error {
            document.push_str(&failure_block(message));
        }
        document.push_str(&download_section(
            &script_name,
            req.clear.then_some(notebook_name.as_str()),
            req.viewer_url.as_deref(),
        ));

        let source_dir = parent_dir(&req.source);
        for name in req
            .supplementary_files
            .iter()
            .chain(&req.other_supplementary_files)
        {
            copy_if_absent(&source_dir.join(name), &dest_dir.join(name))?;
        }
        document.push_str(&data_download(&req.supplementary_files));

        let document_path = dest_dir.join(format!("{stem}.md"));
        document.push('\n');
        fs::write(&document_path, document).map_err(io_at(&document_path))?;

        // Distributable notebook and script
        if req.clear {
            executed.clear_outputs();
        }
        executed.write(&req.destination)?;

        let script = comment_disabled_calls(&self.services.script_exporter.export_script(&executed)?);
        let script_path = dest_dir.join(&script_name);
        fs::write(&script_path, script).map_err(io_at(&script_path))?;

        let thumbnail = self.thumbnail(req, &images, &dest_dir);
        let (title, description) = extract_summary(&req.notebook);

        Ok(TransformResult {
            source: req.source.clone(),
            notebook: req.destination.clone(),
            script: script_path,
            document: document_path,
            images,
            thumbnail,
            title,
            description,
            code_example: req.code_example.clone(),
            reference: req.reference.clone(),
            execution_error,
        })
    }

    /// Run the notebook if requested. Failures never abort the transform:
    /// the notebook as far as it ran (or as loaded) is returned with the error.
    fn execute(&self, req: &TransformRequest) -> Execution {
        if !req.execute {
            return Execution::skipped(req.notebook.clone());
        }

        let mut run = req.notebook.clone();
        let injected = match run.first_code_cell() {
            Some(i) if self.disable_warnings => {
                run.cells.insert(i, Cell::code(SILENCE_WARNINGS));
                Some(i)
            }
            _ => None,
        };

        info!(notebook = %req.source.display(), "executing");
        let started = Instant::now();
        let workdir = parent_dir(&req.source);

        match self.services.executor.execute(&run, &workdir) {
            Ok(outcome) => {
                let mut executed = outcome.notebook;
                if let Some(i) = injected
                    && executed.cells.get(i).is_some_and(|c| c.source() == SILENCE_WARNINGS)
                {
                    executed.cells.remove(i);
                }
                let error = outcome.error.map(|e| {
                    error!(notebook = %req.source.display(), error = %e, "error while executing");
                    e.to_string()
                });
                if error.is_none() {
                    info!(
                        notebook = %req.source.display(),
                        seconds = started.elapsed().as_secs(),
                        "done"
                    );
                }
                Execution {
                    notebook: executed,
                    error,
                    aborted: false,
                }
            }
            Err(e) => {
                error!(notebook = %req.source.display(), error = %e, "execution failed");
                Execution {
                    notebook: req.notebook.clone(),
                    error: Some(e.to_string()),
                    aborted: true,
                }
            }
        }
    }

    /// Explicit selector first, then the last image-like figure, then the
    /// placeholder.
    fn thumbnail(&self, req: &TransformRequest, images: &[PathBuf], dest_dir: &Path) -> PathBuf {
        let output = dest_dir.join(thumb_name(&req.reference));

        let explicit = match &req.thumbnail {
            Some(ThumbnailChoice::Figure(i)) => match pick_figure(images, *i) {
                Some(path) => Some(path.clone()),
                None => {
                    warn!(
                        notebook = %req.source.display(),
                        index = i,
                        figures = images.len(),
                        "thumbnail figure out of range"
                    );
                    None
                }
            },
            Some(ThumbnailChoice::File { source, copy_to }) => {
                match copy_file(source, copy_to) {
                    Ok(()) => Some(copy_to.clone()),
                    Err(e) => {
                        warn!(notebook = %req.source.display(), error = %e, "thumbnail file not copied");
                        return self.placeholder.clone();
                    }
                }
            }
            None => None,
        };

        if let Some(candidate) = explicit {
            return self
                .scale(&candidate, &output)
                .unwrap_or_else(|| self.placeholder.clone());
        }

        images
            .iter()
            .rev()
            .filter(|p| is_thumbnail_candidate(p))
            .find_map(|candidate| self.scale(candidate, &output))
            .unwrap_or_else(|| {
                debug!(notebook = %req.source.display(), "no figure for thumbnail, using placeholder");
                self.placeholder.clone()
            })
    }

    fn scale(&self, candidate: &Path, output: &Path) -> Option<PathBuf> {
        match make_thumbnail(self.services.backend, candidate, output, self.thumbnail_box) {
            Ok(ThumbnailOutcome::Written) => Some(output.to_path_buf()),
            Ok(ThumbnailOutcome::Unchanged) => Some(candidate.to_path_buf()),
            Err(e) => {
                warn!(image = %candidate.display(), error = %e, "thumbnail failed");
                None
            }
        }
    }
}

fn pick_figure(images: &[PathBuf], index: i64) -> Option<&PathBuf> {
    let idx = if index < 0 {
        images.len().checked_sub(index.unsigned_abs() as usize)?
    } else {
        index as usize
    };
    images.get(idx)
}

/// A copy of `nb` with tag-driven removals applied.
fn remove_tagged(nb: &Notebook, tags: &TagsConfig) -> Notebook {
    let mut out = nb.clone();
    out.cells
        .retain(|cell| !cell.tags().iter().any(|t| tags.remove_cell.contains(t)));

    for cell in &mut out.cells {
        let Cell::Code(code) = cell else { continue };
        let has = |set: &BTreeSet<String>| code.metadata.tags.iter().any(|t| set.contains(t));
        let (drop_outputs, drop_input) = (has(&tags.remove_all_outputs), has(&tags.remove_input));
        if drop_outputs {
            code.outputs.clear();
        }
        if drop_input {
            code.source.clear();
        }
        code.outputs.retain(|output| {
            !output
                .metadata()
                .tags
                .iter()
                .any(|t| tags.remove_single_output.contains(t))
        });
    }
    out
}

/// Rename extracted outputs in order of first reference, rewrite the
/// references in `text` and write the files. Returns the written paths.
fn write_figures(
    text: &mut String,
    outputs: &BTreeMap<String, Vec<u8>>,
    stem: &str,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, TransformError> {
    let mut ordered: Vec<(&String, &Vec<u8>)> = outputs.iter().collect();
    ordered.sort_by_key(|(name, _)| text.find(&format!("({name})")).unwrap_or(usize::MAX));

    let mut written = Vec::with_capacity(ordered.len());
    for (n, (original, bytes)) in ordered.into_iter().enumerate() {
        let ext = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let name = image_name(stem, n, ext);
        *text = text.replace(&format!("({original})"), &format!("({name})"));

        let path = dest_dir.join(&name);
        fs::write(&path, bytes).map_err(io_at(&path))?;
        written.push(path);
    }
    Ok(written)
}

/// Error text of a run that produced no notebook, shown where outputs would be.
fn failure_block(message: &str) -> String {
    format!("\n\n**Execution failed:**\n\n```text\n{}\n```", message.trim_end())
}

fn download_section(script: &str, notebook: Option<&str>, viewer: Option<&str>) -> String {
    let mut s = format!("\n\n**Download python file:** {{download}}`{script}`");
    if let Some(nb) = notebook {
        s.push_str(&format!("\n\n**Download IPython notebook:** {{download}}`{nb}`"));
    }
    if let Some(url) = viewer {
        s.push_str(&format!("\n\n**View the notebook in the** [Jupyter nbviewer]({url})"));
    }
    s
}

fn data_download(files: &[String]) -> String {
    match files {
        [] => String::new(),
        [one] => format!("\n\n**Download supplementary data:** {{download}}`{one}`"),
        many => {
            let items: Vec<String> = many.iter().map(|f| format!("- {{download}}`{f}`")).collect();
            format!("\n\n**Download supplementary data:**\n\n{}", items.join("\n"))
        }
    }
}

fn copy_if_absent(source: &Path, target: &Path) -> Result<(), TransformError> {
    if target.exists() {
        return Ok(());
    }
    copy_file(source, target)
}

fn copy_file(source: &Path, target: &Path) -> Result<(), TransformError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_at(parent))?;
    }
    fs::copy(source, target).map_err(io_at(source))?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
