/*!
  Binary for the CLI of remora: rma
*/

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;
use remora::{
    error::Error,
    execution::{DiscoveryEngine, DiscoveryStatus, DiscoverySummary},
    inspector::memory::MemoryDatabase,
};

use crate::cli::CliApp;

/// Exit code for rejected parameters.
const EXIT_CONFIG_ERROR: i32 = 1;
/// Exit code for a backend failure before any rule was produced.
const EXIT_BACKEND_ERROR: i32 = 2;
/// Exit code for a run cancelled by the timeout.
const EXIT_CANCELLED: i32 = 3;

fn print_finished_message(summary: &DiscoverySummary, elapsed_ms: u128) {
    let headline = match summary.status {
        DiscoveryStatus::Cancelled => "Discovery cancelled",
        DiscoveryStatus::GraphEmpty => "No candidates in this database; discovery finished",
        _ => "Discovery completed",
    };
    println!(
        "{headline} in {}{}. Emitted {} rules.",
        elapsed_ms.to_string().green().bold(),
        "ms".green().bold(),
        summary.rules_emitted.to_string().green().bold(),
    );
    println!("   {0: <12} {1}", "Considered:", summary.rules_considered);
    if !summary.rules_skipped_by_reason.is_empty() {
        let skipped: Vec<String> = summary
            .rules_skipped_by_reason
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect();
        println!("   {0: <12} {1}", "Skipped:", skipped.join(", "));
    }
}

fn run(cli: CliApp) -> Result<i32, Error> {
    let started = Instant::now();

    let config = cli.discovery.discovery_config(cli.results_directory)?;

    log::info!("Loading database from {:?}", cli.data_directory);
    let database = MemoryDatabase::load_csv_directory(&cli.data_directory)?;

    let engine = DiscoveryEngine::initialize(&database, config)?;

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = cli.timeout {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(seconds));
            log::warn!("timeout of {seconds}s reached, stopping discovery");
            stop.store(true, Ordering::Relaxed);
        });
    }

    let mut stream = engine.rules_with_stop(stop);
    let limit = cli.limit.unwrap_or(usize::MAX);
    let mut emitted = 0usize;
    while emitted < limit {
        let Some(rule) = stream.next() else {
            break;
        };
        println!("{}", serde_json::to_string(&rule)?);
        emitted += 1;
    }

    let summary = stream.summary();
    print_finished_message(&summary, started.elapsed().as_millis());

    Ok(match summary.status {
        DiscoveryStatus::Cancelled => EXIT_CANCELLED,
        _ => 0,
    })
}

fn exit_code(error: &Error) -> i32 {
    match error {
        Error::Config(_) => EXIT_CONFIG_ERROR,
        _ => EXIT_BACKEND_ERROR,
    }
}

fn main() {
    let cli = CliApp::parse();

    cli.logging.initialize_logging();
    log::info!("Version: {}", clap::crate_version!());
    log::debug!("Data directory: {:?}", cli.data_directory);

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            log::error!("{} {error}", "error:".red().bold());
            std::process::exit(exit_code(&error));
        }
    }
}
