//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Endpoint and credential overrides shared by every command.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// GraphQL HTTP endpoint
    #[arg(long, global = true, env = "FIELDLINK_API_URL")]
    pub api_url: Option<String>,

    /// GraphQL WebSocket endpoint for subscriptions
    #[arg(long, global = true, env = "FIELDLINK_WS_URL")]
    pub ws_url: Option<String>,

    /// API token id (sent as x-token-id)
    #[arg(long, global = true, env = "FIELDLINK_TOKEN_ID", hide_env_values = true)]
    pub token_id: Option<String>,

    /// API token secret (sent as x-token-value)
    #[arg(long, global = true, env = "FIELDLINK_TOKEN_VALUE", hide_env_values = true)]
    pub token_value: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "fieldlink")]
#[command(author, version, about = "Ingest fieldlink telemetry into a local database", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// SQLite database path
    #[arg(long, global = true, env = "FIELDLINK_DB")]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "FIELDLINK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch devices, tracks and detections and store them
    Fetch {
        /// Look-back window in hours
        #[arg(long, default_value = "24")]
        hours: u32,
    },

    /// Create a sample event
    Event,

    /// Stream live detections
    Subscribe(SubscribeArgs),

    /// Report stored detection analytics
    Analytics(AnalyticsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SubscribeArgs {
    /// Only detections at or above this confidence
    #[arg(long, default_value = "0.7")]
    pub min_confidence: f64,

    /// Only detections from this device
    #[arg(long)]
    pub device: Option<String>,

    /// Only detections of this type
    #[arg(long = "type")]
    pub detection_type: Option<String>,

    /// Store each detection as it arrives
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyticsArgs {
    /// Look-back window in days
    #[arg(long, default_value = "30")]
    pub days: u32,

    /// Maximum number of detection points
    #[arg(long, default_value = "1000")]
    pub limit: u32,

    /// List detection points instead of the daily summary
    #[arg(long)]
    pub points: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_defaults_to_one_day() {
        let cli = Cli::try_parse_from(["fieldlink", "fetch"]).unwrap();
        assert!(matches!(cli.command, Commands::Fetch { hours: 24 }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fieldlink",
            "fetch",
            "--hours",
            "6",
            "--db",
            "/tmp/x.db",
            "--token-id",
            "abc",
            "-q",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Fetch { hours: 6 }));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(cli.connection.token_id.as_deref(), Some("abc"));
        assert!(cli.quiet);
    }

    #[test]
    fn test_subscribe_filters() {
        let cli = Cli::try_parse_from([
            "fieldlink",
            "subscribe",
            "--min-confidence",
            "0.9",
            "--device",
            "dev-1",
            "--type",
            "PERSON",
            "--save",
        ])
        .unwrap();
        let Commands::Subscribe(args) = cli.command else {
            panic!("expected subscribe");
        };
        assert_eq!(args.min_confidence, 0.9);
        assert_eq!(args.device.as_deref(), Some("dev-1"));
        assert_eq!(args.detection_type.as_deref(), Some("PERSON"));
        assert!(args.save);
    }

    #[test]
    fn test_subscribe_default_confidence() {
        let cli = Cli::try_parse_from(["fieldlink", "subscribe"]).unwrap();
        let Commands::Subscribe(args) = cli.command else {
            panic!("expected subscribe");
        };
        assert_eq!(args.min_confidence, 0.7);
        assert!(!args.save);
    }

    #[test]
    fn test_analytics_format() {
        let cli =
            Cli::try_parse_from(["fieldlink", "analytics", "--format", "csv", "--days", "7"]).unwrap();
        let Commands::Analytics(args) = cli.command else {
            panic!("expected analytics");
        };
        assert_eq!(args.format, OutputFormat::Csv);
        assert_eq!(args.days, 7);
        assert_eq!(args.limit, 1000);
        assert!(!args.points);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["fieldlink", "analytics", "--format", "html"]).is_err());
    }
}
