use anyhow::Context;
use clap::Parser;
use std::collections::HashMap;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use trailer_recovery::cli::Args;
use trailer_recovery::{
    probe, write_recovered, ParallelSearch, RecoveryReport, RepairSearch, SearchOutcome, SearchProgress,
    TruncatedBlob,
};

const EXIT_EXHAUSTED: u8 = 2;
const PROGRESS_LOG_EVERY: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn,trailer_recovery=info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> anyhow::Result<ExitCode> {
    args.validate().context("invalid arguments")?;
    let expected = args.expected_digest()?;
    let config = args.search_config()?;

    let blob = TruncatedBlob::open(&args.archive)
        .with_context(|| format!("failed to read {}", args.archive.display()))?;

    let (sender, receiver) = mpsc::channel(1024);
    let search = RepairSearch::new(blob, args.entry_name(), expected, config).with_progress(sender);
    let workers = ParallelSearch::new(&search).workers();
    let keyspace = search.keyspace().size();

    let reporter = std::thread::spawn(move || log_progress(receiver, keyspace));
    let report = search.run()?;
    let mut summary = RecoveryReport::new(&search, workers, &report);
    // Dropping the search closes the progress channel
    drop(search);
    if reporter.join().is_err() {
        warn!("progress reporter panicked");
    }

    let code = match &report.outcome {
        SearchOutcome::Succeeded(repair) => {
            debug!(entries = ?probe::entry_names(&repair.repaired), "repaired archive contents");
            if let Some(path) = args.output_path() {
                write_recovered(&path, &repair.repaired)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "repaired archive written");
                summary = summary.with_output_path(path);
            }

            if !args.json {
                println!("Repaired: trailer {} (candidate #{})", repair.candidate.to_hex(), repair.index);
                println!("  Entry:          {}", summary.entry_name);
                println!("  Content length: {} bytes", repair.content.len());
                println!(
                    "  Candidates:     {} ({:.0}/s)",
                    report.stats.candidates_evaluated,
                    report.stats.candidates_per_sec()
                );
                if let Some(path) = &summary.output_path {
                    println!("  Written to:     {}", path.display());
                }
            }
            ExitCode::SUCCESS
        }
        SearchOutcome::Exhausted => {
            if !args.json {
                println!(
                    "Could not repair the archive: no {}-byte trailer reproduces {} ({} candidates tried)",
                    summary.missing_bytes, summary.entry_name, report.stats.candidates_evaluated
                );
            }
            ExitCode::from(EXIT_EXHAUSTED)
        }
    };

    if args.json {
        println!("{}", summary.to_json()?);
    }

    Ok(code)
}

/// Periodically log overall progress until every sender is gone.
fn log_progress(mut receiver: Receiver<SearchProgress>, keyspace: u128) {
    let mut per_partition: HashMap<usize, u64> = HashMap::new();
    let mut last_log = Instant::now();

    while let Some(progress) = receiver.blocking_recv() {
        match progress {
            SearchProgress::PartitionStarted { .. } => {}
            SearchProgress::Evaluated { partition, evaluated }
            | SearchProgress::PartitionExhausted { partition, evaluated } => {
                per_partition.insert(partition, evaluated);
            }
            SearchProgress::Found { partition, index } => {
                info!(partition, index = %index, "match found, stopping workers");
            }
        }

        if last_log.elapsed() >= PROGRESS_LOG_EVERY {
            let done: u64 = per_partition.values().sum();
            let percent = done as f64 * 100.0 / keyspace as f64;
            info!("searched {} of {} candidates ({:.2}%)", done, keyspace, percent);
            last_log = Instant::now();
        }
    }
}
