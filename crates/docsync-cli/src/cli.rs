//! # CLI Structure and Argument Parsing
//!
//! The command-line interface for `docsync`, built with `clap` derive macros.
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Reconcile every page of a site model and write contentFile back
//! docsync sync --pages model/pages.json --languages en,ru
//!
//! # Machine-readable change report
//! docsync sync --pages model/pages.json --format json
//!
//! # Inspect how a source URL is understood
//! docsync parse https://github.com/bem/bem-method/tree/bem-info-data/method/index/index.en.md
//!
//! # Start from an empty cache
//! docsync clear --yes
//! ```
//!
//! Global options (`--config`, `--cache-dir`, `--verbose`, `--quiet`,
//! `--no-color`) apply to every command.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::cli_args::FormatArg;

/// Main CLI structure for the `docsync` command
#[derive(Parser, Clone, Debug)]
#[command(name = "docsync")]
#[command(version)]
#[command(
    about = "docsync - keep repository-hosted documentation in sync with a local cache",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Path to configuration file (overrides autodiscovery). Also via `DOCSYNC_CONFIG`.
    #[arg(long, global = true, value_name = "FILE", env = "DOCSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides the configured `cache.dir`)
    #[arg(long = "cache-dir", global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Reconcile pages against their repository sources
    Sync {
        /// JSON file holding an array of pages
        #[arg(long, value_name = "FILE")]
        pages: PathBuf,

        /// Languages to process, in priority order (defaults to `run.languages`)
        #[arg(short = 'l', long, value_delimiter = ',', value_name = "LANG")]
        languages: Vec<String>,

        /// Where to write the updated pages (defaults to the input file)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Pages processed at once (defaults to `run.concurrency`)
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Parse a repository source URL and print its components
    Parse {
        /// Source URL, e.g. `https://github.com/owner/repo/tree/ref/path.md`
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Delete every cached record and content body
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
