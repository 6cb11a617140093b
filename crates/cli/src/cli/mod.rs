pub mod config;
pub mod search;

use clap::{Args, Parser, Subcommand};
use sr_domain::Error;

/// SearchRelay — run async searches with a client deadline and clean
/// cancellation.
#[derive(Debug, Parser)]
#[command(name = "searchrelay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a search and print every response as a JSON line.
    Search(SearchArgs),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Query body as JSON, e.g. '{"query":{"match_all":{}}}'.
    pub query: String,
    /// Index or pattern to search (defaults to `backend.index`).
    #[arg(long)]
    pub index: Option<String>,
    /// Fixed wait between polls, overriding the adaptive policy.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// Client deadline; 0 disables it.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Keep waiting past the deadline once the search is known to be slow.
    #[arg(long)]
    pub run_beyond_timeout: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `SR_CONFIG` (or
/// `searchrelay.toml` by default).  Returns the parsed [`Config`] and the
/// path that was used.
///
/// [`Config`]: sr_domain::config::Config
pub fn load_config() -> anyhow::Result<(sr_domain::config::Config, String)> {
    let config_path =
        std::env::var("SR_CONFIG").unwrap_or_else(|_| "searchrelay.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

/// Parse `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: &str) -> sr_domain::Result<sr_domain::config::Config> {
    if !std::path::Path::new(path).exists() {
        return Ok(sr_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|e| Error::Config(format!("parsing {path}: {e}")))
}
