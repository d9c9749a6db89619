// src/main.rs
//
// cardvault admin CLI
//
// Thin shell over AppState: every command goes through the same services
// a front end would use.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cardvault::app::AppConfig;
use cardvault::application::{AppState, ErrorResponse};
use cardvault::db::{get_connection, get_database_stats, verify_database_integrity};
use cardvault::domain::{ExternalCardRecord, MatchMethod};
use cardvault::error::{AppError, AppResult};
use cardvault::events::AcquisitionProgressed;
use cardvault::infrastructure::CancellationSignal;
use cardvault::services::{AcquisitionOutcome, ReconciliationOutcome};

#[derive(Debug, Parser)]
#[command(name = "cardvault", version, about = "Card dataset cache and identity reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show dataset state, freshness and storage usage
    Status,

    /// Download the bulk dataset (only when absent or stale, unless forced)
    Refresh {
        #[arg(long)]
        force: bool,
    },

    /// Search printings by name
    Search {
        name: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Resolve a catalog card to its reference printing
    Resolve {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        set: String,
        #[arg(long)]
        number: Option<String>,
    },

    /// Print the price history of a reference printing
    Prices { reference_id: String },

    /// Show mapping cache statistics
    Mappings,

    /// Remove every stored card mapping
    ClearMappings,

    /// Remove the stored bulk dataset
    ClearDataset,

    /// Verify database integrity and print table statistics
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("reading configuration")?;
    let state = AppState::initialize(&config)
        .with_context(|| format!("opening data directory {}", config.data_dir.display()))?;

    if let Err(e) = run(cli.command, &state).await {
        eprintln!("error: {}", ErrorResponse::from_app_error(e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Command, state: &AppState) -> AppResult<()> {
    match command {
        Command::Status => status(state),
        Command::Refresh { force } => refresh(state, force).await,
        Command::Search { name, limit } => search(state, &name, limit),
        Command::Resolve { id, name, set, number } => {
            let card = ExternalCardRecord::new(id, name, set, number.unwrap_or_default());
            resolve(state, &card)
        }
        Command::Prices { reference_id } => prices(state, &reference_id),
        Command::Mappings => mappings(state),
        Command::ClearMappings => {
            let removed = state.clear_mappings()?;
            println!("Removed {} mappings", removed);
            Ok(())
        }
        Command::ClearDataset => {
            state.clear_dataset()?;
            println!("Dataset cleared");
            Ok(())
        }
        Command::Check => check(state),
    }
}

fn status(state: &AppState) -> AppResult<()> {
    let status = state.acquisition_service.check_status()?;
    let usage = state.storage_usage()?;

    println!("State:      {}", status.state);
    match &status.metadata {
        Some(meta) => {
            println!("Version:    {}", meta.version);
            println!("Ingested:   {}", meta.ingest_date.to_rfc3339());
            println!("Printings:  {} in {} sets", meta.total_printings, meta.total_sets);
            println!("Stale:      {}", if status.is_stale { "yes" } else { "no" });
        }
        None => println!("Dataset:    not downloaded"),
    }
    println!(
        "Storage:    {} dataset + {} cache bytes of {}",
        usage.dataset_bytes, usage.kv_bytes, state.config.quota_bytes
    );

    Ok(())
}

async fn refresh(state: &AppState, force: bool) -> AppResult<()> {
    let cancel = CancellationSignal::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    state.event_bus.subscribe(|event: &AcquisitionProgressed| {
        eprintln!("[{}] {:>3}% {}", event.stage, event.percent, event.message);
    });

    let service = Arc::clone(&state.acquisition_service);
    let outcome = if force {
        service.refresh(&cancel).await?
    } else {
        service.ensure_dataset(&cancel).await?
    };

    match outcome {
        AcquisitionOutcome::Ingested(report) => println!(
            "Stored dataset {} ({} printings, {} skipped)",
            report.metadata.version, report.metadata.total_printings, report.skipped_printings
        ),
        AcquisitionOutcome::Unchanged(meta) => {
            println!("Dataset {} unchanged", meta.version)
        }
        AcquisitionOutcome::AlreadyFresh(meta) => {
            println!("Dataset {} is up to date", meta.version)
        }
    }

    Ok(())
}

fn search(state: &AppState, name: &str, limit: usize) -> AppResult<()> {
    if !state.dataset.is_available()? {
        return Err(AppError::DatasetUnavailable);
    }

    let printings = state.dataset.search_by_name(name, limit)?;
    if printings.is_empty() {
        println!("No printings match '{}'", name);
    }
    for printing in printings {
        println!(
            "{:<38} {:<6} {:<6} {}",
            printing.reference_id, printing.set_code, printing.collector_number, printing.name
        );
    }

    Ok(())
}

fn resolve(state: &AppState, card: &ExternalCardRecord) -> AppResult<()> {
    match state.reconciliation_service.resolve_detailed(card) {
        ReconciliationOutcome::CacheHit(mapping) | ReconciliationOutcome::Matched(mapping) => {
            println!(
                "{} -> {} ({}, {})",
                mapping.external_id, mapping.reference_id, mapping.match_method, mapping.confidence
            );
            Ok(())
        }
        ReconciliationOutcome::NotFound => {
            println!("No reference printing found for {}", card.external_id);
            Ok(())
        }
        ReconciliationOutcome::DatasetUnavailable => Err(AppError::DatasetUnavailable),
    }
}

fn prices(state: &AppState, reference_id: &str) -> AppResult<()> {
    if state.dataset.lookup_by_reference_id(reference_id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let history = state.dataset.price_history(reference_id)?;
    if history.is_empty() {
        println!("No price history for {}", reference_id);
    }
    for point in history {
        println!("{}  {:.2}", point.date, point.price);
    }

    Ok(())
}

fn mappings(state: &AppState) -> AppResult<()> {
    let stats = state.mappings.stats()?;

    println!("Mappings:   {}", stats.total_mappings);
    for method in MatchMethod::ALL {
        println!("  {:<18} {}", method.to_string(), stats.count(method));
    }

    Ok(())
}

fn check(state: &AppState) -> AppResult<()> {
    let conn = get_connection(&state.pool)?;
    verify_database_integrity(&conn)?;
    let stats = get_database_stats(&conn)?;

    println!("Integrity:  ok");
    println!("File size:  {} bytes ({} pages)", stats.size_bytes, stats.page_count);
    println!("Sets:       {}", stats.set_count);
    println!("Printings:  {}", stats.printing_count);
    println!("KV entries: {}", stats.kv_entry_count);

    Ok(())
}
