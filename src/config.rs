//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `gallery.toml`. Stock defaults are
//! serialized to a TOML table, the user file is merged on top key-by-key, and
//! the result is deserialized with unknown keys rejected and then validated.
//! Every error surfaces before any directory is walked.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! examples_dirs = ["examples"]   # Input trees (relative to this file)
//! gallery_dirs = []              # Output trees; empty = basename of each input
//! pattern = "example_.+\\.ipynb" # Matched at the start of each file name
//! disable_warnings = true        # Silence Python warnings during execution
//! preprocess = true              # true/false or a list of notebooks to execute
//! dont_preprocess = []           # true/false or a list of notebooks not to execute
//! clear = true                   # Clear outputs of the downloadable notebook
//! dont_clear = []
//! insert_bokeh = false           # true or a version string
//! insert_bokeh_widgets = false
//! link_extension = "html"        # Extension of rendered documents in tile links
//!
//! [code_examples]                # Per-notebook overrides, keyed by path
//! "sub/example_a.ipynb" = "import numpy as np"
//!
//! [execution]
//! command = "jupyter"
//! timeout = 300                  # Seconds per cell
//! run_limit = 3600               # Seconds per notebook run, 0 for none
//!
//! [thumbnails]
//! size = [400, 280]
//!
//! [tags]
//! remove_cell = []
//! remove_all_outputs = []
//! remove_input = []
//! remove_single_output = []
//! ```
//!
//! Per-notebook keys are the notebook's path relative to its examples
//! directory, with forward slashes.
//!
//! Unknown keys are rejected to catch typos early.

use crate::export::DEFAULT_BOKEH_VERSION;
use crate::notebook::ThumbnailSelector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "gallery.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `gallery.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Input directory trees holding notebooks and READMEs.
    pub examples_dirs: Vec<PathBuf>,
    /// Output directory trees, one per input tree.
    pub gallery_dirs: Vec<PathBuf>,
    /// Notebook file name pattern (anchored at the start of the name).
    pub pattern: String,
    pub disable_warnings: bool,
    pub preprocess: Selection,
    pub dont_preprocess: Selection,
    pub clear: Selection,
    pub dont_clear: Selection,
    pub code_examples: BTreeMap<String, String>,
    pub supplementary_files: BTreeMap<String, Vec<String>>,
    pub other_supplementary_files: BTreeMap<String, Vec<String>>,
    pub thumbnail_figures: BTreeMap<String, ThumbnailSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<UrlSource>,
    pub insert_bokeh: AssetVersion,
    pub insert_bokeh_widgets: AssetVersion,
    pub link_extension: String,
    pub execution: ExecutionConfig,
    pub thumbnails: ThumbnailsConfig,
    pub tags: TagsConfig,
    /// Directory relative paths are resolved against (the config file's).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            examples_dirs: vec![PathBuf::from("examples")],
            gallery_dirs: Vec::new(),
            pattern: r"example_.+\.ipynb".to_string(),
            disable_warnings: true,
            preprocess: Selection::All(true),
            dont_preprocess: Selection::Only(Vec::new()),
            clear: Selection::All(true),
            dont_clear: Selection::Only(Vec::new()),
            code_examples: BTreeMap::new(),
            supplementary_files: BTreeMap::new(),
            other_supplementary_files: BTreeMap::new(),
            thumbnail_figures: BTreeMap::new(),
            urls: None,
            insert_bokeh: AssetVersion::Enabled(false),
            insert_bokeh_widgets: AssetVersion::Enabled(false),
            link_extension: "html".to_string(),
            execution: ExecutionConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            tags: TagsConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

/// `true`/`false` for every notebook, or an explicit list of notebooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    All(bool),
    Only(Vec<String>),
}

impl Selection {
    /// Whether the notebook at `rel` (relative to its examples dir) is selected.
    pub fn selects(&self, rel: &str) -> bool {
        match self {
            Selection::All(all) => *all,
            Selection::Only(list) => list.iter().any(|p| p == rel),
        }
    }
}

/// Where notebook source URLs come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlSource {
    /// Base URL; the notebook's relative path is appended.
    Base(String),
    /// Explicit URL per notebook.
    PerFile(BTreeMap<String, String>),
}

impl UrlSource {
    pub fn url_for(&self, rel: &str) -> Option<String> {
        match self {
            UrlSource::Base(base) if base.ends_with('/') => Some(format!("{base}{rel}")),
            UrlSource::Base(base) => Some(format!("{base}/{rel}")),
            UrlSource::PerFile(map) => map.get(rel).cloned(),
        }
    }
}

/// An optional client asset bundle: off, on with the default version, or a
/// pinned version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetVersion {
    Enabled(bool),
    Version(String),
}

impl AssetVersion {
    /// The version to include, if the bundle is enabled.
    pub fn version(&self) -> Option<&str> {
        match self {
            AssetVersion::Enabled(false) => None,
            AssetVersion::Enabled(true) => Some(DEFAULT_BOKEH_VERSION),
            AssetVersion::Version(v) => Some(v),
        }
    }
}

/// Notebook execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Jupyter launcher (`<command> nbconvert --execute ...`).
    pub command: String,
    /// Timeout in seconds for one cell.
    pub timeout: u64,
    /// Seconds after which a whole run is killed; `0` for no limit.
    pub run_limit: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command: "jupyter".to_string(),
            timeout: 300,
            run_limit: 3600,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Box size as `[width, height]`; every thumbnail is exactly this size.
    pub size: [u32; 2],
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self { size: [400, 280] }
    }
}

/// Tag names driving content removal in rendered documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagsConfig {
    /// Cells removed entirely.
    pub remove_cell: BTreeSet<String>,
    /// Cells whose outputs are removed.
    pub remove_all_outputs: BTreeSet<String>,
    /// Cells whose source is removed.
    pub remove_input: BTreeSet<String>,
    /// Individual outputs removed, matched on the output's own tags.
    pub remove_single_output: BTreeSet<String>,
}

impl TagsConfig {
    pub fn is_empty(&self) -> bool {
        self.remove_cell.is_empty()
            && self.remove_all_outputs.is_empty()
            && self.remove_input.is_empty()
            && self.remove_single_output.is_empty()
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        self.remove_cell
            .iter()
            .chain(&self.remove_all_outputs)
            .chain(&self.remove_input)
            .chain(&self.remove_single_output)
    }
}

/// Per-notebook settings after applying the configuration's selections and
/// override tables. Notebook metadata fills whatever is left unset here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotebookOverrides {
    pub execute: bool,
    pub clear: bool,
    pub code_example: Option<String>,
    pub supplementary_files: Option<Vec<String>>,
    pub other_supplementary_files: Option<Vec<String>>,
    pub thumbnail_figure: Option<ThumbnailSelector>,
    pub url: Option<String>,
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pattern_regex()?;
        if self.examples_dirs.is_empty() {
            return Err(ConfigError::Validation(
                "examples_dirs must not be empty".into(),
            ));
        }
        if !self.gallery_dirs.is_empty() && self.gallery_dirs.len() != self.examples_dirs.len() {
            return Err(ConfigError::Validation(format!(
                "gallery_dirs has {} entries but examples_dirs has {}",
                self.gallery_dirs.len(),
                self.examples_dirs.len()
            )));
        }
        if self.thumbnails.size[0] == 0 || self.thumbnails.size[1] == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size values must be non-zero".into(),
            ));
        }
        if self.execution.timeout == 0 {
            return Err(ConfigError::Validation(
                "execution.timeout must be non-zero".into(),
            ));
        }
        if self.execution.run_limit != 0 && self.execution.run_limit < self.execution.timeout {
            return Err(ConfigError::Validation(format!(
                "execution.run_limit ({}) must be 0 or at least execution.timeout ({})",
                self.execution.run_limit, self.execution.timeout
            )));
        }
        if self.execution.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "execution.command must not be empty".into(),
            ));
        }
        if self.link_extension.is_empty() {
            return Err(ConfigError::Validation(
                "link_extension must not be empty".into(),
            ));
        }
        if self.tags.all().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "tag names must not be empty".into(),
            ));
        }
        for (nb, selector) in &self.thumbnail_figures {
            if let ThumbnailSelector::Path(p) = selector
                && p.as_os_str().is_empty()
            {
                return Err(ConfigError::Validation(format!(
                    "thumbnail_figures.\"{nb}\" is an empty path"
                )));
            }
        }
        Ok(())
    }

    /// The notebook name pattern, anchored at the start of the file name.
    pub fn pattern_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&format!("^(?:{})", self.pattern))?)
    }

    /// Resolve a configured path against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// `(examples dir, gallery dir)` pairs to build, both resolved.
    pub fn gallery_pairs(&self) -> Vec<(PathBuf, PathBuf)> {
        self.examples_dirs
            .iter()
            .enumerate()
            .map(|(i, examples)| {
                let gallery = match self.gallery_dirs.get(i) {
                    Some(g) => g.clone(),
                    None => examples
                        .file_name()
                        .map(PathBuf::from)
                        .unwrap_or_else(|| PathBuf::from("gallery")),
                };
                (self.resolve(examples), self.resolve(&gallery))
            })
            .collect()
    }

    /// Settings for the notebook at `rel` (relative to its examples dir).
    pub fn overrides_for(&self, rel: &str) -> NotebookOverrides {
        NotebookOverrides {
            execute: self.preprocess.selects(rel) && !self.dont_preprocess.selects(rel),
            clear: self.clear.selects(rel) && !self.dont_clear.selects(rel),
            code_example: self.code_examples.get(rel).cloned(),
            supplementary_files: self.supplementary_files.get(rel).cloned(),
            other_supplementary_files: self.other_supplementary_files.get(rel).cloned(),
            thumbnail_figure: self.thumbnail_figures.get(rel).map(|sel| match sel {
                ThumbnailSelector::Path(p) => ThumbnailSelector::Path(self.resolve(p)),
                index => index.clone(),
            }),
            url: self.urls.as_ref().and_then(|u| u.url_for(rel)),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock defaults.
/// Relative paths in the config resolve against the file's directory.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    let mut config = resolve_config(base, overlay)?;
    config.base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(config)
}

/// Returns a fully-commented stock `gallery.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# nb-gallery configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.
#
# Paths are relative to this file. Per-notebook tables are keyed by the
# notebook's path relative to its examples directory, e.g. "sub/example_a.ipynb".

# Directory trees to turn into galleries. Only directories containing a
# README.md, README.rst or README.txt become gallery pages.
examples_dirs = ["examples"]

# Where to write each gallery. Empty means the basename of each examples dir.
gallery_dirs = []

# Regular expression matched against the start of every file name.
pattern = "example_.+\\.ipynb"

# Silence Python warnings while executing notebooks.
disable_warnings = true

# ---------------------------------------------------------------------------
# Execution and output clearing
# ---------------------------------------------------------------------------
# true/false for every notebook, or a list of notebooks. A notebook runs when
# selected by `preprocess` and not selected by `dont_preprocess`.
preprocess = true
dont_preprocess = []

# Same rule for clearing the outputs of the downloadable notebook.
clear = true
dont_clear = []

# ---------------------------------------------------------------------------
# Bokeh client assets
# ---------------------------------------------------------------------------
# true (built-in version) or a version string such as "3.4.1". The include
# tags are only added to documents that mention bokeh.
insert_bokeh = false
insert_bokeh_widgets = false

# Extension the rendered documents will have when tiles link to them.
link_extension = "html"

# Source URL of every notebook, used for the nbviewer link. Either a base URL
# (the notebook path is appended) or a table of per-notebook URLs.
# urls = "https://github.com/org/repo/blob/main/examples"

# ---------------------------------------------------------------------------
# Per-notebook overrides (notebook metadata is used when absent)
# ---------------------------------------------------------------------------
[code_examples]
# "example_basic.ipynb" = "import numpy as np"

[supplementary_files]
# "example_basic.ipynb" = ["data.csv"]

[other_supplementary_files]
# "example_basic.ipynb" = ["logo.png"]

[thumbnail_figures]
# Index into the extracted figures (negative counts from the end) or a path.
# "example_basic.ipynb" = 1

# ---------------------------------------------------------------------------
# Notebook execution
# ---------------------------------------------------------------------------
[execution]
# Jupyter launcher; runs `<command> nbconvert --to notebook --execute`.
command = "jupyter"

# Seconds a single cell may run. A cell that exceeds it is interrupted and
# shows up as an error output; the remaining cells still run.
timeout = 300

# Seconds after which a whole notebook run is killed and the notebook is
# rendered without outputs. 0 disables the limit.
run_limit = 3600

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Box [width, height]. Figures are scaled to fit and centered on white.
size = [400, 280]

# ---------------------------------------------------------------------------
# Tag-based removal in rendered documents (scripts keep everything)
# ---------------------------------------------------------------------------
[tags]
remove_cell = []
remove_all_outputs = []
remove_input = []
remove_single_output = []
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = GalleryConfig::default();
        assert_eq!(config.examples_dirs, vec![PathBuf::from("examples")]);
        assert_eq!(config.pattern, r"example_.+\.ipynb");
        assert!(config.disable_warnings);
        assert_eq!(config.thumbnails.size, [400, 280]);
        assert_eq!(config.execution.timeout, 300);
        assert_eq!(config.link_extension, "html");
        assert!(config.tags.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
pattern = "demo_.*"

[tags]
remove_cell = ["hide"]
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.pattern, "demo_.*");
        assert!(config.tags.remove_cell.contains("hide"));
        // Defaults preserved
        assert_eq!(config.thumbnails.size, [400, 280]);
        assert_eq!(config.execution.command, "jupyter");
    }

    // =========================================================================
    // Selection and override tests
    // =========================================================================

    #[test]
    fn selection_bool_and_list() {
        assert!(Selection::All(true).selects("a.ipynb"));
        assert!(!Selection::All(false).selects("a.ipynb"));
        let only = Selection::Only(vec!["sub/a.ipynb".into()]);
        assert!(only.selects("sub/a.ipynb"));
        assert!(!only.selects("a.ipynb"));
    }

    #[test]
    fn overrides_combine_allow_and_deny() {
        let toml = r#"
dont_preprocess = ["slow.ipynb"]
clear = ["keep_clear.ipynb"]
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();

        assert!(config.overrides_for("fast.ipynb").execute);
        assert!(!config.overrides_for("slow.ipynb").execute);
        assert!(config.overrides_for("keep_clear.ipynb").clear);
        assert!(!config.overrides_for("fast.ipynb").clear);
    }

    #[test]
    fn dont_preprocess_true_disables_everything() {
        let config: GalleryConfig = toml::from_str("dont_preprocess = true").unwrap();
        assert!(!config.overrides_for("any.ipynb").execute);
    }

    #[test]
    fn per_notebook_tables() {
        let toml = r#"
[code_examples]
"example_a.ipynb" = "plot()"

[supplementary_files]
"example_a.ipynb" = ["data.csv"]

[thumbnail_figures]
"example_a.ipynb" = -1
"example_b.ipynb" = "pics/cover.png"
"#;
        let mut config: GalleryConfig = toml::from_str(toml).unwrap();
        config.base_dir = PathBuf::from("/docs");

        let a = config.overrides_for("example_a.ipynb");
        assert_eq!(a.code_example.as_deref(), Some("plot()"));
        assert_eq!(a.supplementary_files, Some(vec!["data.csv".to_string()]));
        assert_eq!(a.thumbnail_figure, Some(ThumbnailSelector::Index(-1)));

        let b = config.overrides_for("example_b.ipynb");
        assert_eq!(
            b.thumbnail_figure,
            Some(ThumbnailSelector::Path(PathBuf::from("/docs/pics/cover.png")))
        );
        assert_eq!(b.code_example, None);
    }

    #[test]
    fn urls_as_base_string() {
        let config: GalleryConfig =
            toml::from_str(r#"urls = "https://github.com/o/r/blob/main/examples""#).unwrap();
        assert_eq!(
            config.overrides_for("sub/example_a.ipynb").url.as_deref(),
            Some("https://github.com/o/r/blob/main/examples/sub/example_a.ipynb")
        );
    }

    #[test]
    fn urls_as_table() {
        let toml = r#"
[urls]
"example_a.ipynb" = "https://example.org/a.ipynb"
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.overrides_for("example_a.ipynb").url.as_deref(),
            Some("https://example.org/a.ipynb")
        );
        assert_eq!(config.overrides_for("example_b.ipynb").url, None);
    }

    #[test]
    fn asset_version_forms() {
        assert_eq!(AssetVersion::Enabled(false).version(), None);
        assert_eq!(
            AssetVersion::Enabled(true).version(),
            Some(DEFAULT_BOKEH_VERSION)
        );
        assert_eq!(
            AssetVersion::Version("3.4.1".into()).version(),
            Some("3.4.1")
        );
        let config: GalleryConfig = toml::from_str(r#"insert_bokeh = "2.4.3""#).unwrap();
        assert_eq!(config.insert_bokeh.version(), Some("2.4.3"));
    }

    #[test]
    fn gallery_pairs_default_to_basename() {
        let config = GalleryConfig {
            examples_dirs: vec![PathBuf::from("../notebooks")],
            base_dir: PathBuf::from("/site/docs"),
            ..GalleryConfig::default()
        };
        assert_eq!(
            config.gallery_pairs(),
            vec![(
                PathBuf::from("/site/docs/../notebooks"),
                PathBuf::from("/site/docs/notebooks")
            )]
        );
    }

    #[test]
    fn gallery_pairs_use_explicit_dirs() {
        let config = GalleryConfig {
            examples_dirs: vec![PathBuf::from("in")],
            gallery_dirs: vec![PathBuf::from("out")],
            ..GalleryConfig::default()
        };
        assert_eq!(
            config.gallery_pairs(),
            vec![(PathBuf::from("in"), PathBuf::from("out"))]
        );
    }

    #[test]
    fn pattern_is_anchored_at_start() {
        let re = GalleryConfig::default().pattern_regex().unwrap();
        assert!(re.is_match("example_basic.ipynb"));
        assert!(!re.is_match("my_example_basic.ipynb"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.thumbnails.size, [400, 280]);
        assert_eq!(config.base_dir, tmp.path());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
examples_dirs = ["nbs"]
gallery_dirs = ["gallery"]

[execution]
timeout = 60
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.execution.timeout, 60);
        // Unspecified values should be defaults
        assert_eq!(config.execution.command, "jupyter");
        assert_eq!(
            config.gallery_pairs(),
            vec![(tmp.path().join("nbs"), tmp.path().join("gallery"))]
        );
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<GalleryConfig, _> = toml::from_str("paterns = []");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let toml_str = r#"
[tags]
remove_cells = ["x"]
"#;
        let result: Result<GalleryConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(GalleryConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_bad_pattern() {
        let config = GalleryConfig {
            pattern: "example_(".into(),
            ..GalleryConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));
    }

    #[test]
    fn validate_gallery_dirs_length() {
        let config = GalleryConfig {
            examples_dirs: vec!["a".into(), "b".into()],
            gallery_dirs: vec!["x".into()],
            ..GalleryConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gallery_dirs"));
    }

    #[test]
    fn validate_zero_thumbnail_size() {
        let mut config = GalleryConfig::default();
        config.thumbnails.size = [0, 280];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_timeout() {
        let mut config = GalleryConfig::default();
        config.execution.timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_run_limit_below_cell_timeout() {
        let mut config = GalleryConfig::default();
        config.execution.timeout = 600;
        config.execution.run_limit = 300;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        config.execution.run_limit = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_empty_tag_name() {
        let mut config = GalleryConfig::default();
        config.tags.remove_input.insert(" ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_thumbnail_path() {
        let mut config = GalleryConfig::default();
        config
            .thumbnail_figures
            .insert("a.ipynb".into(), ThumbnailSelector::Path(PathBuf::new()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[thumbnails]\nsize = [400, 0]\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("timeout = 300").unwrap();
        let overlay: toml::Value = toml::from_str("timeout = 60").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("timeout").unwrap().as_integer(), Some(60));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[execution]
command = "jupyter"
timeout = 300
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[execution]\ntimeout = 10\n").unwrap();
        let merged = merge_toml(base, overlay);
        let execution = merged.get("execution").unwrap();
        assert_eq!(execution.get("timeout").unwrap().as_integer(), Some(10));
        // command preserved from base
        assert_eq!(execution.get("command").unwrap().as_str(), Some("jupyter"));
    }

    #[test]
    fn merge_toml_list_replaces_bool() {
        let base: toml::Value = toml::from_str("preprocess = true").unwrap();
        let overlay: toml::Value = toml::from_str(r#"preprocess = ["a.ipynb"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert!(merged.get("preprocess").unwrap().is_array());
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str(
            r#"
insert_bokeh = true

[thumbnails]
size = [200, 140]
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.thumbnails.size, [200, 140]);
        assert_eq!(config.insert_bokeh, AssetVersion::Enabled(true));
        // Other fields preserved from defaults
        assert_eq!(config.execution.timeout, 300);
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["execution", "thumbnails", "tags", "code_examples", "pattern"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
        assert!(val.get("urls").is_none());
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: GalleryConfig = toml::from_str(stock_config_toml()).unwrap();
        let default = GalleryConfig::default();
        assert_eq!(config.pattern, default.pattern);
        assert_eq!(config.examples_dirs, default.examples_dirs);
        assert_eq!(config.preprocess, default.preprocess);
        assert_eq!(config.dont_clear, default.dont_clear);
        assert_eq!(config.thumbnails.size, default.thumbnails.size);
        assert_eq!(config.execution.timeout, default.execution.timeout);
        assert_eq!(config.tags, default.tags);
        config.validate().unwrap();
    }
}
