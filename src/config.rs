//! Configuration loading and layering.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML config file,
//! environment variables (including `.env`), command-line flags. Clap merges
//! the last two, so this module only has to put the file underneath them.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use concall_core::{DateFilter, ListingCredentials, LlmConfig, PipelineConfig, RetryPolicy};
use concall_core::discovery::DEFAULT_LISTING_BASE_URL;
use concall_core::extract::DEFAULT_TRANSCRIPT_LANGUAGE;
use serde::Deserialize;

use crate::cli::Args;

/// Default directory for per-record JSON files.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default processed-identity state file.
pub const DEFAULT_DEDUP_PATH: &str = "processed_companies.json";

const MAX_DELAY_MS: u64 = 60_000;

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Manifest of sources; when set the listing site is not used.
    pub manifest: Option<PathBuf>,
    /// Listing site base URL.
    pub listing_url: Option<String>,
    /// Publication date filter: `any`, `yesterday` or `YYYY-MM-DD`.
    pub date: Option<String>,
    /// OpenAI-compatible endpoint base URL.
    pub llm_endpoint: Option<String>,
    /// Model name.
    pub llm_model: Option<String>,
    /// Characters of source text sent to the model.
    pub max_content_chars: Option<u32>,
    /// Analysis attempts per item.
    pub max_attempts: Option<u32>,
    /// Delay between analysis attempts in milliseconds.
    pub retry_delay_ms: Option<u64>,
    /// Delay between items in milliseconds.
    pub item_delay_ms: Option<u64>,
    /// Stop after this many items were done or failed.
    pub max_items: Option<u64>,
    /// Directory for per-record JSON files.
    pub output_dir: Option<PathBuf>,
    /// Aggregate CSV file.
    pub csv: Option<PathBuf>,
    /// Result API endpoint.
    pub api_url: Option<String>,
    /// Processed-identity state file.
    pub dedup_path: Option<PathBuf>,
    /// Directory for temporary document files.
    pub scratch_dir: Option<PathBuf>,
    /// Preferred caption language.
    pub transcript_language: Option<String>,
}

impl FileConfig {
    /// Validates config values against the same ranges as the CLI.
    pub fn validate(&self) -> Result<()> {
        if let Some(chars) = self.max_content_chars
            && !(500..=200_000).contains(&chars)
        {
            bail!(
                "Invalid config value for `max_content_chars`: {chars}. Expected range: 500..=200000"
            );
        }
        if let Some(attempts) = self.max_attempts
            && !(1..=10).contains(&attempts)
        {
            bail!("Invalid config value for `max_attempts`: {attempts}. Expected range: 1..=10");
        }
        validate_delay_ms("retry_delay_ms", self.retry_delay_ms)?;
        validate_delay_ms("item_delay_ms", self.item_delay_ms)?;
        if self.max_items == Some(0) {
            bail!("Invalid config value for `max_items`: 0. Expected at least 1");
        }
        if let Some(date) = &self.date {
            DateFilter::parse(date)
                .map_err(|e| anyhow::anyhow!("Invalid config value for `date`: {e}"))?;
        }
        Ok(())
    }
}

fn validate_delay_ms(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if value > MAX_DELAY_MS {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..={MAX_DELAY_MS}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, if one could be determined.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/concall/config.toml`
/// 2. `$HOME/.config/concall/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("concall")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("concall")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config: Some(config),
            })
        }
        _ => Ok(LoadedConfig { path, config: None }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Where the run's sources come from.
#[derive(Debug, Clone)]
pub enum SourceSettings {
    Manifest(PathBuf),
    Listing {
        base_url: String,
        credentials: Option<ListingCredentials>,
        filter: DateFilter,
    },
}

/// Which sinks receive records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSettings {
    pub json_dir: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub sources: SourceSettings,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputSettings,
    pub dedup_path: PathBuf,
    pub scratch_dir: Option<PathBuf>,
    pub transcript_language: String,
    pub dry_run: bool,
}

impl Settings {
    /// Layers CLI/env values over the file config over defaults.
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Result<Self> {
        let file = file.cloned().unwrap_or_default();

        let sources = match args.manifest.clone().or(file.manifest) {
            Some(path) => SourceSettings::Manifest(path),
            None => {
                let date = args.date.clone().or(file.date);
                let filter = match date.as_deref() {
                    Some(raw) => DateFilter::parse(raw).map_err(|e| anyhow::anyhow!(e))?,
                    None => DateFilter::Any,
                };
                let credentials = match (&args.screener_username, &args.screener_password) {
                    (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                        Some(ListingCredentials::new(user, pass))
                    }
                    _ => None,
                };
                SourceSettings::Listing {
                    base_url: args
                        .listing_url
                        .clone()
                        .or(file.listing_url)
                        .unwrap_or_else(|| DEFAULT_LISTING_BASE_URL.to_string()),
                    credentials,
                    filter,
                }
            }
        };

        let mut llm = LlmConfig::default();
        if let Some(endpoint) = args.llm_endpoint.clone().or(file.llm_endpoint) {
            llm.endpoint = endpoint;
        }
        if let Some(model) = args.llm_model.clone().or(file.llm_model) {
            llm.model = model;
        }
        if let Some(chars) = args.max_content_chars.or(file.max_content_chars) {
            llm.max_content_chars = chars as usize;
        }
        let llm = llm.with_env_api_key();

        let mut pipeline = PipelineConfig::default();
        let retry_delay = args
            .retry_delay_ms
            .or(file.retry_delay_ms)
            .map_or(pipeline.retry.delay(), Duration::from_millis);
        let max_attempts = args
            .max_attempts
            .or(file.max_attempts)
            .unwrap_or(pipeline.retry.max_attempts());
        pipeline.retry = RetryPolicy::new(max_attempts, retry_delay);
        if let Some(ms) = args.item_delay_ms.or(file.item_delay_ms) {
            pipeline.item_delay = Duration::from_millis(ms);
        }
        if let Some(max) = args.max_items.or(file.max_items) {
            pipeline.max_items = Some(usize::try_from(max).context("max_items out of range")?);
        }

        let mut output = OutputSettings {
            json_dir: args.output_dir.clone().or(file.output_dir),
            csv: args.csv.clone().or(file.csv),
            api_url: args.api_url.clone().or(file.api_url),
            api_token: args.api_token.clone(),
        };
        if output.json_dir.is_none() && output.csv.is_none() && output.api_url.is_none() {
            output.json_dir = Some(PathBuf::from(DEFAULT_OUTPUT_DIR));
        }

        Ok(Self {
            sources,
            llm,
            pipeline,
            output,
            dedup_path: args
                .dedup_path
                .clone()
                .or(file.dedup_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEDUP_PATH)),
            scratch_dir: args.scratch_dir.clone().or(file.scratch_dir),
            transcript_language: args
                .transcript_language
                .clone()
                .or(file.transcript_language)
                .unwrap_or_else(|| DEFAULT_TRANSCRIPT_LANGUAGE.to_string()),
            dry_run: args.dry_run,
        })
    }
}
