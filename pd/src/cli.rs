//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// PartyDaemon - reactive multi-agent party planner
#[derive(Parser)]
#[command(
    name = "pd",
    about = "Reactive multi-agent coordination for incremental party planning",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a party from a set of facts and print the resulting session
    Run {
        /// Fact about the party (repeatable)
        #[arg(short, long = "input", value_name = "TEXT", required = true)]
        inputs: Vec<String>,

        /// Tag applied to every input (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Remove the input at this position (0-based) after the first pass settles
        #[arg(long, value_name = "INDEX")]
        remove: Option<usize>,

        /// How long the session must stay unchanged to count as settled
        #[arg(long, default_value = "300")]
        settle_ms: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show how a piece of text would be classified
    Classify {
        /// Text to classify
        text: String,

        /// Tag to classify along with the text (repeatable)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// List the event topic catalog
    Topics,

    /// Show and validate the agent dependency graph
    Graph,
}

/// Output format for session output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Where the binary writes its log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("partydaemon")
        .join("logs")
        .join("partydaemon.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "pd", "run", "-i", "jungle theme", "--input", "20 kids", "--tag", "birthday", "-f", "json",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                inputs, tags, format, ..
            } => {
                assert_eq!(inputs, vec!["jungle theme".to_string(), "20 kids".to_string()]);
                assert_eq!(tags, vec!["birthday".to_string()]);
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["pd", "topics", "-l", "debug", "--config", "pd.yml"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("pd.yml")));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
