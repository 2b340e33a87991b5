//! # nb-gallery
//!
//! Turns a directory tree of Jupyter notebooks into a browsable gallery for a
//! documentation build. Each notebook becomes a Markdown page with its figures
//! extracted, a Python script, a cleaned notebook download and a thumbnail;
//! each directory with a README becomes an index page of thumbnail tiles.
//!
//! # Pipeline
//!
//! ```text
//! examples/ ──► walk (README'd dirs only)
//!                 │
//!                 ├─► per notebook: execute → strip tags → export → extract
//!                 │   figures → write .md/.py/.ipynb → pick thumbnail
//!                 │
//!                 └─► per directory (after its children): index.md
//! ```
//!
//! Notebook failures are recorded in the [`gallery::BuildReport`] and never
//! abort the walk. Only configuration errors stop a build before it starts.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `gallery.toml` loading, merge over stock defaults, validation, per-notebook overrides |
//! | [`notebook`] | nbformat v4 document model (read, write, clear outputs) |
//! | [`export`] | Execution, Markdown and script exporters, client asset injection |
//! | [`filter`] | Post-export cleanup: shell directives, summary extraction, disabled calls |
//! | [`naming`] | Reference labels, image and thumbnail names, relative links |
//! | [`imaging`] | Thumbnail rendering behind the [`imaging::ImageBackend`] trait |
//! | [`transform`] | One notebook through every stage |
//! | [`gallery`] | Tree walk, index pages, build report |
//! | [`output`] | CLI output formatting of build reports and surveys |
//!
//! # Design Decisions
//!
//! ## External Services Behind Traits
//!
//! Running a kernel and converting notebooks are Jupyter's job. The
//! [`export::Executor`] seam shells out to `jupyter nbconvert`; tests use a
//! scripted executor so the whole pipeline runs without Python installed.
//!
//! ## Maud For Tiles
//!
//! Gallery tiles are HTML embedded in Markdown. They are built with
//! [Maud](https://maud.lambda.xyz/) so titles and tooltips are escaped
//! and the markup stays on one line, which Markdown needs to keep a raw
//! HTML block intact.

pub mod config;
pub mod export;
pub mod filter;
pub mod gallery;
pub mod imaging;
pub mod naming;
pub mod notebook;
pub mod output;
pub mod transform;
