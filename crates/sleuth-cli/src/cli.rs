//! CLI argument definitions for sleuth.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `search` | Run one search across every configured provider |
//! | `providers` | List providers with availability and breaker state |
//! | `health` | Summarize overall system health |
//! | `breakers` | Show circuit breaker snapshots |
//! | `recommend` | Suggest next steps for an error message |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML configuration file |
//! | `--demo` | `false` | Use in-memory demo providers |
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! sleuth --demo search --type phone +15550100
//! sleuth --config sleuth.toml providers --format table
//! sleuth recommend "connection reset by peer" --type email
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sleuth_core::SearchType;

/// Multi-provider personal-data search with anonymized sources.
#[derive(Debug, Parser)]
#[command(name = "sleuth", author, version, about)]
pub struct Cli {
    /// TOML configuration file with orchestrator settings and providers.
    #[arg(long, global = true, env = "SLEUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Replace configured providers with in-memory demo providers.
    #[arg(long, global = true, default_value_t = false)]
    pub demo: bool,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Human-readable key/value layout.
    Table,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search every active provider for one identifier.
    ///
    ///   sleuth --demo search --type phone +15550100
    ///   sleuth --demo search --type email someone@example.com
    Search(SearchArgs),

    /// List providers in priority order.
    Providers,

    /// Report overall health and whether degraded service is possible.
    Health,

    /// Show circuit breaker state for every provider.
    Breakers,

    /// Print recovery suggestions for an error message.
    Recommend(RecommendArgs),
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Identifier kind: phone, email, tax_id, national_id, passport.
    #[arg(long = "type", value_parser = parse_search_type)]
    pub search_type: SearchType,

    /// Value to look up.
    pub value: String,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// Error text to classify.
    pub message: String,

    /// Search type the error was raised for.
    #[arg(long = "type", value_parser = parse_search_type)]
    pub search_type: Option<SearchType>,
}

fn parse_search_type(value: &str) -> Result<SearchType, String> {
    value.parse::<SearchType>().map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sleuth",
            "search",
            "--type",
            "tax-id",
            "7707083893",
            "--demo",
            "--pretty",
        ])
        .expect("valid arguments");

        assert!(cli.demo);
        assert!(cli.pretty);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.search_type, SearchType::TaxId);
                assert_eq!(args.value, "7707083893");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_search_type() {
        let result = Cli::try_parse_from(["sleuth", "search", "--type", "fax", "123"]);
        assert!(result.is_err());
    }
}
