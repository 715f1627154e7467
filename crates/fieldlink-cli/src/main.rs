use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fieldlink_cli::cli::{Cli, Commands};
use fieldlink_cli::commands::{cmd_analytics, cmd_event, cmd_fetch, cmd_subscribe};
use fieldlink_cli::config::Config;
use fieldlink_core::{ClientConfig, GraphqlClient, SubscriptionClient};
use fieldlink_store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so reports on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let client_config = config.client_config(&cli.connection);

    match &cli.command {
        Commands::Fetch { hours } => {
            let client = http_client(&client_config)?;
            let store = open_store(&cli, &config)?;
            cmd_fetch(&client, &store, *hours).await?;
        }
        Commands::Event => {
            let client = http_client(&client_config)?;
            cmd_event(&client).await?;
        }
        Commands::Subscribe(args) => {
            warn_missing_token(&client_config);
            let client = SubscriptionClient::new(&client_config)
                .context("Invalid subscription configuration")?;
            let store = if args.save {
                Some(open_store(&cli, &config)?)
            } else {
                None
            };
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            cmd_subscribe(&client, store.as_ref(), args, shutdown).await?;
        }
        Commands::Analytics(args) => {
            let store = open_store(&cli, &config)?;
            cmd_analytics(&store, args)?;
        }
    }

    Ok(())
}

fn http_client(config: &ClientConfig) -> Result<GraphqlClient> {
    warn_missing_token(config);
    GraphqlClient::new(config).context("Invalid client configuration")
}

fn open_store(cli: &Cli, config: &Config) -> Result<Store> {
    let path = config.db_path(cli.db.as_deref());
    Store::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn warn_missing_token(config: &ClientConfig) {
    if config.token_id.is_empty() || config.token_value.is_empty() {
        warn!("No API token configured; set --token-id/--token-value or FIELDLINK_TOKEN_ID/FIELDLINK_TOKEN_VALUE");
    }
}
