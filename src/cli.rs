//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Acquire books from a large catalog, one qualifying record at a time.
///
/// Bookfetch scans a line-delimited catalog, keeps well-rated records that
/// match a query, looks their ISBN up in a bibliographic index and downloads
/// at most one EPUB and one PDF per record. Runs resume where the previous
/// one stopped.
#[derive(Parser, Debug)]
#[command(name = "bookfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// State database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the catalog and download qualifying books
    Run(RunArgs),
    /// Manage the avoided-keyword set
    Keywords {
        #[command(subcommand)]
        command: KeywordsCommand,
    },
    /// Show the scan cursor and attempted-record count for a query
    Status(StatusArgs),
}

/// Options for `bookfetch run`. Unset options fall back to the config file,
/// then to built-in defaults.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Case-sensitive substring a title must contain
    #[arg(long)]
    pub query: String,

    /// Maximum qualifying records to attempt this run
    #[arg(short = 'n', long)]
    pub max_attempts: Option<u32>,

    /// Existing directory to write downloads into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Line-delimited JSON catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Known catalog line count (skips counting the file)
    #[arg(long)]
    pub catalog_lines: Option<u64>,

    /// Largest file to download, in bytes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub size_ceiling: Option<u64>,

    /// Search index mirror base URL
    #[arg(long)]
    pub search_mirror: Option<String>,

    /// Download link mirror base URL
    #[arg(long)]
    pub download_mirror: Option<String>,

    /// Request-phase timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub request_timeout: Option<u64>,

    /// Timeout for index and download-page fetches in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub page_timeout: Option<u64>,

    /// Proxy for all requests (e.g. socks5h://127.0.0.1:9050)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// `bookfetch keywords` subcommands.
#[derive(Subcommand, Debug)]
pub enum KeywordsCommand {
    /// Add keywords to the avoided set
    Add {
        /// Case-sensitive title tokens
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Remove keywords from the avoided set
    Remove {
        /// Keywords to remove
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// List avoided keywords
    List,
}

/// Options for `bookfetch status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Query whose cursor to show
    #[arg(long)]
    pub query: String,
}
