mod infra;
mod output;

use agar_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use agar_core::{
    ConferenceCatalog, ConferenceId, ConferenceRecord, ConferenceStatus, StoredConference,
};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infra::app_state::AppState;
use crate::infra::startup::{shutdown_background_jobs, start_background_jobs};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "agar-server")]
#[command(about = "Keeps conference lifecycle status in step with the clock")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file (overrides AGAR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the reconciliation job until interrupted (default)
    Serve,
    /// Run a single reconciliation pass and print what changed
    Reconcile {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored and resolved status for one conference
    Inspect {
        /// Conference document id
        id: String,
        /// Keep printing the countdown until it reaches zero
        #[arg(long)]
        follow: bool,
    },
    /// List conferences grouped into live, upcoming, and ended
    Catalog {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;
    let state = AppState::from_config(config).context("failed to initialize conference store")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&state).await,
        Command::Reconcile { json } => run_reconcile(&state, json).await,
        Command::Inspect { id, follow } => run_inspect(&state, &id, follow).await,
        Command::Catalog { json } => run_catalog(&state, json).await,
    }
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let ConfigLoad { config, warnings } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    Ok(config)
}

async fn run_server(state: &AppState) -> anyhow::Result<()> {
    start_background_jobs(state).await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    shutdown_background_jobs(state).await;
    Ok(())
}

async fn run_reconcile(state: &AppState, json: bool) -> anyhow::Result<()> {
    let report = state
        .job
        .run_once()
        .await
        .context("reconciliation failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", output::render_report(&report));
    }
    Ok(())
}

async fn run_catalog(state: &AppState, json: bool) -> anyhow::Result<()> {
    let entries = state
        .store
        .list_conferences()
        .await
        .context("failed to list conferences")?;
    let now = state.clock.now();
    let catalog = ConferenceCatalog::classify(entries, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        println!("{}", output::render_catalog(&catalog, now));
    }
    Ok(())
}

async fn run_inspect(state: &AppState, id: &str, follow: bool) -> anyhow::Result<()> {
    let record = fetch_record(state, &ConferenceId::from(id)).await?;
    println!("{}", output::render_inspection(&record, state.clock.now()));

    if follow {
        follow_countdown(state, &record).await?;
    }
    Ok(())
}

async fn fetch_record(state: &AppState, id: &ConferenceId) -> anyhow::Result<ConferenceRecord> {
    let entry = state
        .store
        .get_conference(id)
        .await
        .with_context(|| format!("failed to read conference {id}"))?
        .with_context(|| format!("conference {id} not found"))?;

    match entry {
        StoredConference::Valid(record) => Ok(record),
        StoredConference::Malformed(malformed) => {
            bail!("conference {} is malformed: {}", malformed.id, malformed.reason)
        }
    }
}

/// Live conferences count down to their end, upcoming ones to their start.
fn countdown_target(
    record: &ConferenceRecord,
    status: ConferenceStatus,
) -> Option<(&'static str, Option<chrono::DateTime<chrono::Utc>>)> {
    match status {
        ConferenceStatus::Live => Some(("ends in", record.end_time)),
        ConferenceStatus::Upcoming => Some(("starts in", record.start_time)),
        ConferenceStatus::Ended => None,
    }
}

async fn follow_countdown(state: &AppState, record: &ConferenceRecord) -> anyhow::Result<()> {
    let status = record.reconcile(state.clock.now());
    let Some((label, target)) = countdown_target(record, status) else {
        println!("conference has ended; nothing to count down");
        return Ok(());
    };
    if target.is_none() {
        println!("no boundary recorded; nothing to count down");
        return Ok(());
    }

    let mut countdown = state.countdowns.subscribe(target);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            update = countdown.next() => match update {
                Some(remaining) => println!("{label} {remaining}"),
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    countdown.stop();
    Ok(())
}
