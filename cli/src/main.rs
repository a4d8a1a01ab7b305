//! Rivalwatch CLI
//!
//! Command-line interface for the Rivalwatch activity monitor. Bot commands
//! are executed by the API server and the rendered reply is printed.
//!
//! # Usage
//!
//! ```bash
//! rivalwatch --help
//! rivalwatch health
//! rivalwatch history --timeframe 6h
//! rivalwatch compare --metric users
//! ```

#![deny(unsafe_code)]

mod client;

use clap::{Parser, Subcommand, ValueEnum};
use client::ApiClient;
use shared::commands::{BotCommand, CompareMetric};
use shared::query::Timeframe;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Rivalwatch CLI - compare the activity of two communities
#[derive(Parser)]
#[command(name = "rivalwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "RIVALWATCH_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API server health
    Health,
    /// Current per-capita activity comparison
    Activity,
    /// Average and peak activity over a timeframe
    History {
        /// Lookback: 1h, 6h, 24h or 7d
        #[arg(short, long, default_value = "24h")]
        timeframe: Timeframe,
    },
    /// Compare one metric side by side
    Compare {
        #[arg(short, long, value_enum)]
        metric: Metric,
    },
    /// Status of the reporting processes
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Metric {
    Messages,
    Users,
    #[value(alias = "per_capita")]
    Percapita,
}

impl From<Metric> for CompareMetric {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Messages => Self::Messages,
            Metric::Users => Self::Users,
            Metric::Percapita => Self::PerCapita,
        }
    }
}

impl Commands {
    /// The bot command this subcommand runs, if any.
    fn bot_command(&self) -> Option<BotCommand> {
        match self {
            Self::Health => None,
            Self::Activity => Some(BotCommand::Activity),
            Self::History { timeframe } => Some(BotCommand::History {
                timeframe: *timeframe,
            }),
            Self::Compare { metric } => Some(BotCommand::Compare {
                metric: (*metric).into(),
            }),
            Self::Status => Some(BotCommand::Status),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Rivalwatch CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for usage information");
        return Ok(ExitCode::SUCCESS);
    };

    let client = ApiClient::new(&cli.api_url);

    let Some(bot_command) = command.bot_command() else {
        let health = client.health().await?;
        println!("{} {} is {}", health.service, health.version, health.status);
        for process in &health.processes {
            let stale = if process.suspect { " [stale]" } else { "" };
            println!(
                "  {} ({}): {}{stale}",
                process.status.name, process.status.id, process.status.status
            );
        }
        return Ok(ExitCode::SUCCESS);
    };

    let reply = client.execute(bot_command).await?;
    println!("{}", reply.text);
    Ok(if reply.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
