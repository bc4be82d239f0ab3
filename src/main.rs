use anyhow::Result;
use clap::Parser;
use deriva::cli::{Cli, OutputFormat};
use deriva::detector::{DetectorConfig, DetectorSettings};
use deriva::json_output::JsonReport;
use deriva::payload::DetectorPayload;
use deriva::runner::{BatchOutcome, BatchRunner, DecodePolicy};
use deriva::source;
use deriva::store::{JsonFileStore, MemoryStore, StateStore};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Merge the settings file (if any) with explicit CLI overrides
fn resolve_settings(cli: &Cli) -> Result<DetectorSettings> {
    let mut settings = match &cli.config {
        Some(path) => DetectorSettings::from_toml(path)?,
        None => DetectorSettings::default(),
    };
    if let Some(min_data_points) = cli.min_data_points {
        settings.min_data_points = min_data_points;
    }
    if let Some(threshold) = cli.threshold {
        settings.threshold = threshold;
    }
    if let Some(short_span) = cli.short_span {
        settings.short_span = short_span;
    }
    if let Some(long_span) = cli.long_span {
        settings.long_span = long_span;
    }
    Ok(settings)
}

fn run_batch<S: StateStore>(
    store: S,
    cli: &Cli,
    config: DetectorConfig,
    payloads: Vec<DetectorPayload>,
) -> Result<(BatchOutcome, S)> {
    let policy = if cli.skip_corrupt_state {
        DecodePolicy::SkipEntity
    } else {
        DecodePolicy::ResetToEmpty
    };
    let mut runner = BatchRunner::new(store, config)
        .with_decode_policy(policy)
        .with_workers(cli.workers);
    let outcome = runner.process(payloads)?;
    Ok((outcome, runner.into_store()))
}

fn print_text_report(outcome: &BatchOutcome) {
    println!("=== Trend Detection Report ===");
    println!(
        "Payloads: {}  Entities: {}  Skipped: {}",
        outcome.payloads_processed, outcome.entities_processed, outcome.entities_skipped
    );
    if outcome.events.is_empty() {
        println!("No trend changes detected");
        return;
    }
    println!("Trend changes: {}", outcome.events.len());
    for event in &outcome.events {
        println!(
            "  {} {}:{}:{} score={:.4} value={} at {}",
            event.trend_type,
            event.project_id,
            event.group,
            event.fingerprint,
            event.score,
            event.value,
            event.timestamp.to_rfc3339()
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let settings = resolve_settings(&cli)?;
    let config = settings.build()?;
    let payloads = source::load_payloads(&cli.payloads)?;
    tracing::info!(
        payloads = payloads.len(),
        min_data_points = settings.min_data_points,
        threshold = settings.threshold,
        "starting trend detection pass"
    );

    let outcome = match &cli.state {
        Some(path) => {
            let store = JsonFileStore::open(path)?;
            let (outcome, store) = run_batch(store, &cli, config, payloads)?;
            store.flush()?;
            outcome
        }
        None => run_batch(MemoryStore::new(), &cli, config, payloads)?.0,
    };

    match cli.format {
        OutputFormat::Json => println!("{}", JsonReport::from_outcome(&outcome).render()?),
        OutputFormat::Text => print_text_report(&outcome),
    }

    Ok(())
}
