//! Daily economic-metrics job and dashboard feed
//!
//! Run with: `econdaily --help`
//!
//! Set RUST_LOG to control log level, e.g. `RUST_LOG=econdaily=debug`.

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use econdaily::alerting::{AlertSink, LogAlertSink, WebhookAlertSink};
use econdaily::config::AppConfig;
use econdaily::export::write_csv;
use econdaily::fred::FredClient;
use econdaily::pipeline::Pipeline;
use econdaily::reconcile::RowStore;
use econdaily::sentiment::SentimentInput;
use econdaily::server::{run_server, ServerConfig};
use econdaily::sqlite_store::SqliteRowStore;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "econdaily")]
#[command(about = "Daily economic metrics: align, append, serve", long_about = None)]
struct Cli {
    /// KEY=VALUE file overriding the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, align and append new dates (default)
    Run(RunArgs),
    /// Start the dashboard feed
    Serve,
    /// Write persisted rows to stdout as CSV
    Export,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// JSON file with already-scored posts and mention counts
    #[arg(long)]
    sentiment: Option<PathBuf>,

    /// Last day of the daily window (default: today, UTC)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::from_kv_file(path)?,
        None => AppConfig::from_env()?,
    };

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Serve => run_server(ServerConfig::from(&config)).await?,
        Command::Export => {
            let store = SqliteRowStore::new(&config.database_path, config.schema.clone())?;
            store.verify_layout()?;
            write_csv(&store.load_rows(None)?, std::io::stdout().lock())?;
        }
        Command::Run(args) => match &config.alert_webhook {
            Some(url) => run(&config, &args, &WebhookAlertSink::new(url.as_str())?).await?,
            None => run(&config, &args, &LogAlertSink).await?,
        },
    }

    Ok(())
}

async fn run<A: AlertSink>(
    config: &AppConfig,
    args: &RunArgs,
    sink: &A,
) -> Result<(), Box<dyn std::error::Error>> {
    let sentiment = match &args.sentiment {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Some(serde_json::from_str::<SentimentInput>(&raw)?)
        }
        None => None,
    };

    let source = FredClient::with_config(config.require_api_key()?, config.fred.clone())?;
    let mut store = SqliteRowStore::new(&config.database_path, config.schema.clone())?;
    store.create_table()?;
    store.verify_layout()?;

    let today = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let report = Pipeline::new(&config.schema, &config.pipeline)
        .run(&source, sentiment.as_ref(), &mut store, sink, today)
        .await?;

    println!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["econdaily"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_run_flags() {
        let cli = Cli::try_parse_from([
            "econdaily",
            "run",
            "--date",
            "2024-03-11",
            "--sentiment",
            "posts.json",
            "--config",
            "secrets.env",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("secrets.env")));
        match cli.command {
            Some(Command::Run(args)) => {
                assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 3, 11));
                assert_eq!(args.sentiment, Some(PathBuf::from("posts.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_bad_input() {
        assert!(Cli::try_parse_from(["econdaily", "run", "--date", "11/03/2024"]).is_err());
        assert!(Cli::try_parse_from(["econdaily", "backfill"]).is_err());
        assert!(Cli::try_parse_from(["econdaily", "serve", "--date", "2024-03-11"]).is_err());
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["econdaily", "serve", "-c", "prod.env"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));
        assert_eq!(cli.config, Some(PathBuf::from("prod.env")));
    }
}
