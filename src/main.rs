use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use portwatch::pipeline::{Pipeline, SCAN_INTERVAL};
use portwatch::scanner::ScanEngine;
use portwatch::store::PgStore;
use portwatch::target;
use portwatch::types::ScanReport;

/// portwatch — TCP port monitoring agent and one-shot scanner.
#[derive(Debug, Parser)]
#[command(
    name = "portwatch",
    version,
    about = "Discovers open TCP ports and records them against server inventory.",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the polling agent against the store at $DATABASE_URL.
    Agent,
    /// Sweep one target address and print its open ports.
    Scan {
        /// IPv4 or IPv6 literal to sweep.
        target: String,

        /// Print the result as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Agent => run_agent().await,
        Command::Scan { target, json } => run_scan(&target, json).await,
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

async fn run_agent() -> Result<()> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let store = PgStore::connect(&url).await?;
    info!(
        interval_secs = SCAN_INTERVAL.as_secs(),
        "connected; polling for scan requests"
    );

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    Pipeline::new(store, ScanEngine::default())
        .run(SCAN_INTERVAL, cancel)
        .await;
    Ok(())
}

async fn run_scan(target: &str, json: bool) -> Result<()> {
    let ip = target::parse_target(target)?;
    let started = Instant::now();
    let open_ports = ScanEngine::default().scan(ip).await;
    let report = ScanReport {
        target: ip.to_string(),
        open_ports,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    if report.open_ports.is_empty() {
        println!(
            "No open ports on {} ({} ms)",
            report.target, report.duration_ms
        );
        return;
    }
    println!(
        "Open ports on {} ({} ms):",
        report.target, report.duration_ms
    );
    for port in &report.open_ports {
        println!("  {port}");
    }
}
