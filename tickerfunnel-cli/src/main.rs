//! TickerFunnel CLI: database setup, pipeline status, single stages and full runs.
//!
//! Commands:
//! - `init` — create the database (and a default config file if `--config` names a missing one)
//! - `status` — pipeline state for a date; the exit code encodes the state
//! - `sync`, `extract-prices`, `extract-metadata`, `build` — run one stage
//! - `run-all` — run every incomplete stage in order under a run record
//! - `reset` — delete one date's daily rows, scores, steps and sync marker

mod logging;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use logging::LogFormat;
use std::path::{Path, PathBuf};
use tickerfunnel_core::domain::Stage;
use tickerfunnel_core::store::Store;
use tickerfunnel_runner::{
    Collaborators, Orchestrator, PipelineConfig, PipelineStatus, RunOptions, RunSummary,
    StageReport,
};

#[derive(Parser)]
#[command(
    name = "tickerfunnel",
    about = "TickerFunnel: daily equity universe sync, two-pass extraction and search asset build"
)]
struct Cli {
    /// Pipeline config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `paths.db_path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Override `paths.output_dir`.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Pipeline date (YYYY-MM-DD). Defaults to today.
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    /// Base log level; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and apply migrations.
    Init,
    /// Show pipeline state. Exit codes: 0 complete, 1 needs run, 3 not initialised,
    /// 4 services unreachable, 5 interrupted, 6 failed, 7 partial.
    Status {
        /// Print JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sync the ticker universe from the exchange directory.
    Sync {
        /// Download again even if already synced today.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Pass 1: price and volume for every non-ETF ticker.
    ExtractPrices {
        /// Retry unpriced symbols even though the pass completed.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Pass 2: fundamentals for tickers passing the price/volume filter.
    ExtractMetadata {
        /// Retry skipped symbols even though the pass completed.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Score the filtered universe and write trie.json and metadata.json.
    Build {
        /// Rebuild even if scores and artifacts are current.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Run every stage that has not completed for the date.
    RunAll {
        /// Re-run stages that already completed.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Report state and pending work without fetching or writing.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Delete the date's daily rows, scores, steps and sync marker. Artifacts are kept.
    Reset {
        /// Actually delete (without this flag, only describes what would be removed).
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    let is_init = matches!(cli.command, Commands::Init);
    let config = load_config(&cli, is_init)?;
    let date = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Commands::Init => run_init(&config, cli.config.as_deref()),
        Commands::Status { json } => {
            let code = run_status(&config, date, json)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Sync { force } => run_single(&config, Stage::Sync, date, force),
        Commands::ExtractPrices { force } => run_single(&config, Stage::Prices, date, force),
        Commands::ExtractMetadata { force } => {
            run_single(&config, Stage::Fundamentals, date, force)
        }
        Commands::Build { force } => run_single(&config, Stage::Build, date, force),
        Commands::RunAll { force, dry_run } => run_all(
            &config,
            RunOptions {
                date,
                force,
                dry_run,
            },
        ),
        Commands::Reset { yes } => run_reset(&config, date, yes),
    }
}

/// Config file (or defaults), then command-line overrides, then validation.
fn load_config(cli: &Cli, is_init: bool) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) if path.is_file() => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        // init writes the defaults there
        Some(_) if is_init => PipelineConfig::default(),
        Some(path) => bail!("config file not found: {}", path.display()),
        None => PipelineConfig::default(),
    };

    if let Some(db) = &cli.db {
        config.paths.db_path = db.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.paths.output_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_store(config: &PipelineConfig) -> Result<Store> {
    let path = &config.paths.db_path;
    Store::open_existing(path)
        .with_context(|| format!("opening database {}", path.display()))?
        .with_context(|| {
            format!(
                "database {} is not initialised; run `tickerfunnel init` first",
                path.display()
            )
        })
}

fn collaborators(config: &PipelineConfig) -> Result<Collaborators> {
    Collaborators::http(config).context("building HTTP clients")
}

fn run_init(config: &PipelineConfig, config_path: Option<&Path>) -> Result<()> {
    let db_path = &config.paths.db_path;
    let store =
        Store::open(db_path).with_context(|| format!("creating database {}", db_path.display()))?;
    let version = store.schema_version()?;
    println!("Database: {} (schema v{version})", db_path.display());

    std::fs::create_dir_all(&config.paths.output_dir).with_context(|| {
        format!("creating output directory {}", config.paths.output_dir.display())
    })?;
    println!("Output directory: {}", config.paths.output_dir.display());

    if let Some(path) = config_path.filter(|p| !p.exists()) {
        std::fs::write(path, config.to_toml()?)
            .with_context(|| format!("writing config {}", path.display()))?;
        println!("Wrote default config: {}", path.display());
    }
    Ok(())
}

fn status_exit_code(status: PipelineStatus) -> i32 {
    match status {
        PipelineStatus::Completed => 0,
        PipelineStatus::Idle => 1,
        PipelineStatus::InProgress => 5,
        PipelineStatus::Failed => 6,
        PipelineStatus::Partial => 7,
    }
}

fn run_status(config: &PipelineConfig, date: NaiveDate, json: bool) -> Result<i32> {
    let Some(store) = Store::open_existing(&config.paths.db_path)
        .with_context(|| format!("opening database {}", config.paths.db_path.display()))?
    else {
        println!("Database not initialised: {}", config.paths.db_path.display());
        return Ok(3);
    };

    let collab = collaborators(config)?;
    let orch = Orchestrator::new(config, &store, &collab);
    let reach = orch.check_reachability();
    let states = orch.state_store();
    let state = states.get_state(date)?;
    let next = states.recommend_next_step(date)?;
    let last_success = states.last_successful_run()?;

    if json {
        let doc = serde_json::json!({
            "state": state,
            "next_step": next,
            "last_successful_run": last_success,
            "reachability": reach,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("Pipeline {date}: {}", state.status);
        if let Some(stage) = state.current_step {
            match state.progress {
                Some(p) => println!(
                    "  Current step: {stage} ({}/{}, {:.1}%)",
                    p.current,
                    p.total,
                    p.percent()
                ),
                None => println!("  Current step: {stage}"),
            }
        }
        if let Some(err) = &state.error_message {
            println!("  Error: {err}");
        }
        match next.stage {
            Some(stage) => println!("  Next: {stage} ({})", next.reason),
            None => println!("  Next: nothing ({})", next.reason),
        }
        match last_success {
            Some(d) => println!("  Last successful run: {d}"),
            None => println!("  Last successful run: never"),
        }
        println!(
            "  Services: listing {}, market data {}",
            reachable(reach.listing),
            reachable(reach.market_data)
        );
        println!();
        println!("{:<18} {:<12} {:>10}", "Step", "Status", "Processed");
        println!("{}", "-".repeat(42));
        for stage in Stage::ALL {
            match states.step_summary(stage, date)? {
                Some(step) => println!(
                    "{:<18} {:<12} {:>10}",
                    stage.step_name(),
                    step.status.as_str(),
                    step.tickers_processed
                ),
                None => println!("{:<18} {:<12} {:>10}", stage.step_name(), "-", "-"),
            }
        }
    }

    if !collab.probes.is_empty() && !reach.all_reachable() {
        return Ok(4);
    }
    Ok(status_exit_code(state.status))
}

fn reachable(ok: bool) -> &'static str {
    if ok {
        "reachable"
    } else {
        "unreachable"
    }
}

fn run_single(config: &PipelineConfig, stage: Stage, date: NaiveDate, force: bool) -> Result<()> {
    let store = open_store(config)?;
    let collab = collaborators(config)?;
    let report = Orchestrator::new(config, &store, &collab)
        .run_stage(stage, date, force)
        .with_context(|| format!("{stage} for {date}"))?;
    print_report(&report);
    if stage == Stage::Build && !report.no_op {
        println!("Artifacts: {}", config.paths.output_dir.display());
    }
    Ok(())
}

fn print_report(report: &StageReport) {
    if report.no_op {
        println!(
            "{}: nothing to do ({} already processed)",
            report.stage, report.processed
        );
        return;
    }
    println!(
        "{}: {} processed, {} written, {} skipped",
        report.stage, report.processed, report.written, report.skipped
    );
    if let Some(hash) = &report.artifact_hash {
        println!("  artifact hash: {hash}");
    }
}

fn run_all(config: &PipelineConfig, options: RunOptions) -> Result<()> {
    let store = open_store(config)?;
    let collab = collaborators(config)?;
    let summary = Orchestrator::new(config, &store, &collab)
        .run_all(options)
        .with_context(|| format!("pipeline run for {}", options.date))?;
    print_summary(&summary, options.dry_run);
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!(
        "Pipeline {} (was {})",
        summary.date, summary.initial_state.status
    );

    if dry_run {
        println!("Dry run: no requests made, nothing written");
        println!("{:<18} {:<10} {:>10}", "Step", "Done", "Pending");
        println!("{}", "-".repeat(40));
        for p in &summary.planned {
            println!(
                "{:<18} {:<10} {:>10}",
                p.stage.step_name(),
                if p.completed { "yes" } else { "no" },
                p.pending
            );
        }
        return;
    }

    for stage in &summary.skipped {
        println!("{stage}: already completed, skipped");
    }
    for report in &summary.stages {
        print_report(report);
        if let Some(ms) = summary.stage_timings_ms.get(report.stage.step_name()) {
            println!("  took {ms} ms");
        }
    }
    println!(
        "Requests: {} ({} failed, {} bytes)",
        summary.requests.requests, summary.requests.failures, summary.requests.bytes
    );
    if let Some(id) = summary.run_id {
        println!("Run record: #{id}");
    }
}

fn run_reset(config: &PipelineConfig, date: NaiveDate, yes: bool) -> Result<()> {
    if !yes {
        println!(
            "Would delete daily metrics, scores, pipeline steps and the sync marker for {date} \
             in {}.",
            config.paths.db_path.display()
        );
        println!("Artifacts in {} are kept.", config.paths.output_dir.display());
        println!("Run with --yes to actually delete.");
        return Ok(());
    }

    let store = open_store(config)?;
    let summary = store
        .reset_date(date)
        .with_context(|| format!("resetting {date}"))?;
    tracing::info!(
        date = %date,
        daily_metrics = summary.daily_metrics,
        scores = summary.scores,
        steps = summary.steps,
        sync_markers = summary.sync_markers,
        "reset complete"
    );
    println!(
        "Reset {date}: {} daily rows, {} scores, {} steps, {} sync markers deleted",
        summary.daily_metrics, summary.scores, summary.steps, summary.sync_markers
    );
    Ok(())
}
