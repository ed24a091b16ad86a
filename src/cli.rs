//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Turn earnings-call disclosures into structured financial event records.
///
/// Sources come from a manifest file (`--manifest`) or, by default, from the
/// concall listing site using SCREENER_USERNAME / SCREENER_PASSWORD. The LLM
/// key is read from CONCALL_LLM_API_KEY or GROQ_API_KEY.
#[derive(Parser, Debug)]
#[command(name = "concall")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/concall/config.toml)
    #[arg(long, env = "CONCALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Read sources from a JSON manifest instead of the listing site
    #[arg(short = 'm', long)]
    pub manifest: Option<PathBuf>,

    /// List discovered sources and exit without processing
    #[arg(long)]
    pub dry_run: bool,

    /// Listing site username
    #[arg(long, env = "SCREENER_USERNAME")]
    pub screener_username: Option<String>,

    /// Listing site password
    #[arg(long, env = "SCREENER_PASSWORD", hide_env_values = true)]
    pub screener_password: Option<String>,

    /// Listing site base URL
    #[arg(long, env = "CONCALL_LISTING_URL")]
    pub listing_url: Option<String>,

    /// Publication date to keep: any, yesterday or YYYY-MM-DD
    #[arg(short = 'd', long)]
    pub date: Option<String>,

    /// OpenAI-compatible endpoint base URL
    #[arg(long, env = "CONCALL_LLM_ENDPOINT")]
    pub llm_endpoint: Option<String>,

    /// Model name
    #[arg(long, env = "CONCALL_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Characters of source text sent to the model (500-200000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(500..=200_000))]
    pub max_content_chars: Option<u32>,

    /// Analysis attempts per item (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Delay between analysis attempts in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub retry_delay_ms: Option<u64>,

    /// Delay between items in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub item_delay_ms: Option<u64>,

    /// Stop after this many items were done or failed
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_items: Option<u64>,

    /// Directory for one JSON file per record
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Aggregate CSV file for this run
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Result API endpoint receiving one POST per record
    #[arg(long, env = "CONCALL_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for the result API
    #[arg(long, env = "CONCALL_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Processed-identity state file
    #[arg(long)]
    pub dedup_path: Option<PathBuf>,

    /// Directory for temporary document files
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Preferred caption language for transcripts
    #[arg(long)]
    pub transcript_language: Option<String>,
}
