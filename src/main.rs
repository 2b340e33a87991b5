use clap::{Parser, Subcommand};
use nb_gallery::config::{self, CONFIG_FILE, GalleryConfig};
use nb_gallery::export::{AssetInjector, BokehAssets, JupyterExecutor, MarkdownExporter, PythonScriptExporter};
use nb_gallery::gallery::Gallery;
use nb_gallery::imaging::RustBackend;
use nb_gallery::output;
use nb_gallery::transform::Collaborators;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("NB_GALLERY_ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("NB_GALLERY_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "nb-gallery")]
#[command(about = "Gallery generator for Jupyter notebooks")]
#[command(long_about = "\
Gallery generator for Jupyter notebooks

Every directory with a README becomes a gallery page; every notebook in it
matching the pattern becomes a rendered Markdown page with a thumbnail.

Layout:

  examples/
  ├── README.md                    # Gallery intro (required)
  ├── example_basics.ipynb         # Notebook → basics page + thumbnail tile
  ├── data.csv                     # Supplementary file (listed in gallery.toml)
  ├── plotting/
  │   ├── README.md                # Sub-gallery, linked from the parent index
  │   └── example_lines.ipynb
  └── scratch/                     # No README → skipped with its subtree

Outputs per notebook (in the mirrored gallery directory):
  <name>.md, <name>.py, <name>.ipynb, images/<name>_<n>.<ext>,
  images/thumb/<label>_thumb.png

Run 'nb-gallery gen-config' to generate a documented gallery.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert every gallery directory and write the index pages
    Build {
        /// Skip notebook execution, even where the config asks for it
        #[arg(long)]
        no_execute: bool,
    },
    /// List the gallery directories and notebooks a build would process
    Check,
    /// Print a stock gallery.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { no_execute } => {
            let config = config::load_config(&cli.config)?;
            let executor = executor_for(&config);
            let assets = BokehAssets::new(
                config.insert_bokeh.version(),
                config.insert_bokeh_widgets.version(),
            );
            let injector: Option<&dyn AssetInjector> = if assets.is_enabled() {
                Some(&assets)
            } else {
                None
            };
            let backend = RustBackend::new();
            let services = Collaborators {
                executor: &executor,
                exporter: &MarkdownExporter,
                script_exporter: &PythonScriptExporter,
                assets: injector,
                backend: &backend,
            };

            let mut gallery = Gallery::new(&config, services)?;
            if no_execute {
                gallery = gallery.without_execution();
            }
            let report = gallery.build();
            output::print_build_report(&report, &config.base_dir);
            if !report.failures.is_empty() {
                println!("==> Build finished with failures");
            }
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            let executor = executor_for(&config);
            let backend = RustBackend::new();
            let services = Collaborators {
                executor: &executor,
                exporter: &MarkdownExporter,
                script_exporter: &PythonScriptExporter,
                assets: None,
                backend: &backend,
            };
            let gallery = Gallery::new(&config, services)?;
            let (planned, failures) = gallery.survey();
            output::print_survey(&planned, &failures, &config.base_dir);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn executor_for(config: &GalleryConfig) -> JupyterExecutor {
    let execution = &config.execution;
    let executor = JupyterExecutor::new(
        execution.command.clone(),
        Duration::from_secs(execution.timeout),
    );
    match execution.run_limit {
        0 => executor,
        limit => executor.with_run_limit(Duration::from_secs(limit)),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the `-v` count.
fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
