//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for council results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every round's drafts and verdicts
    Full,
    /// Only the final synthesis
    Synthesis,
    /// JSON output
    Json,
}

impl From<OutputFormat> for council_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Full => council_domain::OutputFormat::Full,
            OutputFormat::Synthesis => council_domain::OutputFormat::Synthesis,
            OutputFormat::Json => council_domain::OutputFormat::Json,
        }
    }
}

/// Session storage backend selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageChoice {
    Memory,
    Sqlite,
}

/// CLI arguments for debate-council
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Debate council - worker personas draft, a judge scores and synthesizes")]
#[command(long_about = r#"
Debate council runs a panel of worker personas and a judge on your question.

Each round:
1. Drafting: every worker persona answers the question concurrently
2. Judging:  the judge scores the drafts (0-100), critiques them and
             writes a synthesized answer
3. Decision: the session concludes when the judge says stop, the score
             reaches the threshold, or the round cap is hit; otherwise
             the critique is fed back to the workers

Configuration files are loaded from (in priority order):
1. COUNCIL_* environment variables (e.g. COUNCIL_COUNCIL__MAX_ROUNDS=5)
2. --config <path>     Explicit config file
3. ./council.toml      Project-level config
4. ~/.config/debate-council/config.toml   Global config

Example:
  council ask "Is remote work better than office work?"
  council ask --output full --max-rounds 2 "Should we rewrite it in Rust?"
  council chat
  council serve --bind 0.0.0.0:5000
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format [default: synthesis, or [output].format from config]
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Also write diagnostic logs to daily files in this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Append a JSONL transcript of every draft and verdict to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub transcript: Option<PathBuf>,

    /// Maximum rounds per turn
    #[arg(long, value_name = "N", global = true)]
    pub max_rounds: Option<u32>,

    /// Judge score (0-100) that ends the session
    #[arg(long, value_name = "SCORE", global = true, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub threshold: Option<u32>,

    /// Model for the worker personas
    #[arg(long, value_name = "MODEL", global = true)]
    pub worker_model: Option<String>,

    /// Model for the judge
    #[arg(long, value_name = "MODEL", global = true)]
    pub judge_model: Option<String>,

    /// Session storage backend
    #[arg(long, value_enum, global = true)]
    pub storage: Option<StorageChoice>,

    /// SQLite database file (implies --storage sqlite)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Wait for complete drafts instead of streaming them
    #[arg(long, global = true)]
    pub no_stream: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one question to consensus
    Ask {
        /// The question to put to the council
        query: String,

        /// Continue or follow up on a stored session
        #[arg(long, value_name = "ID")]
        session: Option<i64>,
    },
    /// Interactive chat; each line follows up on the previous answer
    Chat,
    /// List concluded sessions, or show one session in detail
    History {
        /// Session to show with every draft and verdict
        #[arg(value_name = "ID")]
        session: Option<i64>,
    },
    /// Serve the council over HTTP with Server-Sent Events
    Serve {
        /// Address to listen on [default: [server].bind from config]
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_with_global_flags() {
        let cli = Cli::try_parse_from([
            "council",
            "ask",
            "Is remote work better?",
            "--output",
            "full",
            "-vv",
            "--max-rounds",
            "2",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Command::Ask {
                query: "Is remote work better?".to_string(),
                session: None,
            })
        );
        assert_eq!(cli.output, Some(OutputFormat::Full));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.max_rounds, Some(2));
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["council", "--show-config"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.show_config);
    }

    #[test]
    fn test_threshold_range_checked() {
        assert!(Cli::try_parse_from(["council", "--threshold", "101", "chat"]).is_err());
        let cli = Cli::try_parse_from(["council", "--threshold", "75", "chat"]).unwrap();
        assert_eq!(cli.threshold, Some(75));
    }

    #[test]
    fn test_history_detail() {
        let cli = Cli::try_parse_from(["council", "history", "7"]).unwrap();
        assert_eq!(cli.command, Some(Command::History { session: Some(7) }));
    }

    #[test]
    fn test_output_format_maps_to_domain() {
        assert_eq!(
            council_domain::OutputFormat::from(OutputFormat::Json),
            council_domain::OutputFormat::Json
        );
    }
}
