//! Application configuration loading and CLI/file/default merging.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bookfetch_core::download::{
    DEFAULT_DOWNLOAD_MIRROR, LINK_PAGE_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS,
};
use bookfetch_core::filter::{DEFAULT_MIN_AVERAGE_RATING, DEFAULT_MIN_RATINGS_COUNT};
use bookfetch_core::search::{DEFAULT_SEARCH_MIRROR, DEFAULT_SIZE_CEILING_BYTES};

use crate::cli::RunArgs;

/// Default per-run attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
/// Default download directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./books";
/// Default catalog path.
pub const DEFAULT_CATALOG_PATH: &str = "./goodreads_books.json";
/// Default state database path.
pub const DEFAULT_DB_PATH: &str = "./bookfetch.db";

/// File configuration; every key is optional and mirrors a CLI option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Default per-run attempt budget.
    pub max_attempts: Option<u32>,
    /// Default download directory; must already exist.
    pub output_dir: Option<PathBuf>,
    /// Path to the line-delimited JSON catalog.
    pub catalog: Option<PathBuf>,
    /// Known catalog line count, skipping the counting pass.
    pub catalog_lines: Option<u64>,
    /// State database path.
    pub db: Option<PathBuf>,
    /// Largest file to download, in bytes.
    pub size_ceiling: Option<u64>,
    /// Search index mirror base URL.
    pub search_mirror: Option<String>,
    /// Download link mirror base URL.
    pub download_mirror: Option<String>,
    /// Download request-phase timeout in seconds (1..=3600).
    pub request_timeout_secs: Option<u64>,
    /// Index and download-page fetch timeout in seconds (1..=3600).
    pub page_timeout_secs: Option<u64>,
    /// Proxy URL for all requests.
    pub proxy: Option<String>,
    /// `false` disables progress bars.
    pub progress: Option<bool>,
    /// Minimum ratings count a record needs to qualify.
    pub min_ratings_count: Option<u64>,
    /// Minimum average rating a record needs to qualify (0..=5).
    pub min_average_rating: Option<f64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("page_timeout_secs", self.page_timeout_secs),
        ] {
            if let Some(timeout) = value
                && !(1..=3600).contains(&timeout)
            {
                bail!("Invalid config value for `{key}`: {timeout}. Expected range: 1..=3600");
            }
        }
        if self.size_ceiling == Some(0) {
            bail!("Invalid config value for `size_ceiling`: 0. Expected a positive byte count");
        }
        if let Some(rating) = self.min_average_rating
            && !(0.0..=5.0).contains(&rating)
        {
            bail!("Invalid config value for `min_average_rating`: {rating}. Expected range: 0..=5");
        }
        Ok(())
    }
}

/// Fully resolved settings for `bookfetch run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Topical title substring.
    pub query: String,
    /// Attempt budget for this run.
    pub max_attempts: u32,
    /// Download directory.
    pub output_dir: PathBuf,
    /// Catalog path.
    pub catalog: PathBuf,
    /// `None` means the catalog is counted at startup.
    pub catalog_lines: Option<u64>,
    /// State database path.
    pub db: PathBuf,
    /// Inclusive size ceiling in bytes.
    pub size_ceiling: u64,
    /// Search index mirror base URL.
    pub search_mirror: String,
    /// Download link mirror base URL.
    pub download_mirror: String,
    /// Bound on a download's request phase, up to response headers.
    pub request_timeout: Duration,
    /// Bound on each index or download-page fetch, body included.
    pub page_timeout: Duration,
    /// Explicit proxy; `None` keeps reqwest's environment handling.
    pub proxy: Option<String>,
    /// Draw progress bars when stderr is a terminal.
    pub progress: bool,
    /// Qualification threshold on ratings count.
    pub min_ratings_count: u64,
    /// Qualification threshold on average rating.
    pub min_average_rating: f64,
}

impl RunSettings {
    /// Merges CLI values over file values over defaults.
    #[must_use]
    pub fn resolve(args: &RunArgs, db: Option<&Path>, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            query: args.query.clone(),
            max_attempts: args
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            output_dir: args
                .output_dir
                .clone()
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            catalog: args
                .catalog
                .clone()
                .or(file.catalog)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH)),
            catalog_lines: args.catalog_lines.or(file.catalog_lines),
            db: resolve_db_path(db, file.db.as_deref()),
            size_ceiling: args
                .size_ceiling
                .or(file.size_ceiling)
                .unwrap_or(DEFAULT_SIZE_CEILING_BYTES),
            search_mirror: args
                .search_mirror
                .clone()
                .or(file.search_mirror)
                .unwrap_or_else(|| DEFAULT_SEARCH_MIRROR.to_string()),
            download_mirror: args
                .download_mirror
                .clone()
                .or(file.download_mirror)
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_MIRROR.to_string()),
            request_timeout: Duration::from_secs(
                args.request_timeout
                    .or(file.request_timeout_secs)
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            page_timeout: Duration::from_secs(
                args.page_timeout
                    .or(file.page_timeout_secs)
                    .unwrap_or(LINK_PAGE_TIMEOUT_SECS),
            ),
            proxy: args.proxy.clone().or(file.proxy),
            progress: !args.no_progress && file.progress.unwrap_or(true),
            min_ratings_count: file.min_ratings_count.unwrap_or(DEFAULT_MIN_RATINGS_COUNT),
            min_average_rating: file
                .min_average_rating
                .unwrap_or(DEFAULT_MIN_AVERAGE_RATING),
        }
    }
}

/// Database path for any subcommand: CLI, then file, then default.
#[must_use]
pub fn resolve_db_path(cli: Option<&Path>, file: Option<&Path>) -> PathBuf {
    cli.or(file)
        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), Path::to_path_buf)
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bookfetch/config.toml`
/// 2. `$HOME/.config/bookfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("bookfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bookfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_attempts out of range for u32"))
                    .with_context(invalid)?;
                cfg.max_attempts = Some(n);
            }
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "catalog" => {
                cfg.catalog = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "catalog_lines" => {
                cfg.catalog_lines = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "db" => {
                cfg.db = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "size_ceiling" => {
                cfg.size_ceiling = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "search_mirror" => {
                cfg.search_mirror = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "download_mirror" => {
                cfg.download_mirror = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "page_timeout_secs" => {
                cfg.page_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "proxy" => {
                cfg.proxy = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "progress" => {
                cfg.progress = Some(parse_boolean(value).with_context(invalid)?);
            }
            "min_ratings_count" => {
                cfg.min_ratings_count = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "min_average_rating" => {
                cfg.min_average_rating = Some(parse_float(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f64> {
    let value = raw_value.trim().parse::<f64>()?;
    if !value.is_finite() {
        bail!("Expected a finite number");
    }
    Ok(value)
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
