mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::process;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, RunArgs};
use dotenv::dotenv;
use ihc_pipeline_core::{AppConfig, AttributionEngine, DateRange, RunResult, RunStatus};
use progress::CliReporter;
use tracing::{error, info, warn};

const EXIT_FAILURE: i32 = 1;
const EXIT_PARTIAL: i32 = 2;

fn main() {
    dotenv().ok();

    let code = {
        let _guard = logging::init_logger();
        dispatch()
    };

    process::exit(code);
}

fn dispatch() -> i32 {
    let mut config = match ihc_pipeline_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return EXIT_FAILURE;
        }
    };

    let args = Cli::parse();
    if let Some(db) = args.db {
        config.db_path = db;
    }

    match args.command {
        Some(Commands::Run(run_args)) => match run_pipeline(config, run_args) {
            Ok(RunStatus::Complete) => 0,
            Ok(RunStatus::Partial { .. }) => EXIT_PARTIAL,
            Err(err) => {
                error!("Error in attribution pipeline: {:#}", err);
                EXIT_FAILURE
            }
        },
        Some(Commands::InitDb) => match AttributionEngine::new(config).init_database() {
            Ok(()) => 0,
            Err(err) => {
                error!("Error creating tables: {}", err);
                EXIT_FAILURE
            }
        },
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", redacted(&config));
            0
        }
        Some(Commands::TruncateDb) => truncate_db(&config),
        None => {
            let _ = Cli::command().print_long_help();
            0
        }
    }
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(token) = &args.api_token {
        config.api_token = Some(token.clone());
    }
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(conv_type_id) = &args.conv_type_id {
        config.conv_type_id = conv_type_id.clone();
    }
    if args.prod {
        config.test_mode = false;
    }
}

fn run_pipeline(mut config: AppConfig, args: RunArgs) -> anyhow::Result<RunStatus> {
    apply_overrides(&mut config, &args);
    let range = DateRange::parse(args.start_date.as_deref(), args.end_date.as_deref())
        .context("invalid date range")?;
    if !config.test_mode {
        // Fail before touching the database when live scoring is misconfigured.
        config.scoring_config().context("live scoring requires --api-token")?;
    }

    let started = Instant::now();
    let engine = AttributionEngine::new(config);
    let reporter = CliReporter::new();
    let result = engine.run(&range, &reporter)?;

    print_summary(&result, &range, started.elapsed().as_secs_f64());
    Ok(result.status)
}

fn print_summary(result: &RunResult, range: &DateRange, total_secs: f64) {
    println!();
    info!(
        "Load: {}, Score: {}, DB: {}, Report: {}",
        format!("{:.2}s", result.load_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.scoring_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.db_write_duration.as_secs_f64()).green(),
        format!("{:.2}s", result.report_duration.as_secs_f64()).green(),
    );
    info!(
        "{} users, {} conversions attributed, {} attribution rows",
        format!("{}", result.journeys.users).cyan(),
        format!("{}", result.attributed_conversions).cyan(),
        format!("{}", result.attribution_rows).cyan(),
    );
    info!("Date range: {}", range.describe());
    info!("Channel report: {}", result.report_path.display());

    match &result.status {
        RunStatus::Complete => {
            info!("Attribution pipeline completed in {:.2}s", total_secs);
        }
        RunStatus::Partial { skipped_conversions } => {
            warn!(
                "Attribution pipeline finished in {:.2}s with {} conversions skipped by the scoring service",
                total_secs,
                format!("{}", skipped_conversions.len()).red(),
            );
        }
    }
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    if shown.api_token.is_some() {
        shown.api_token = Some("***".to_string());
    }
    shown
}

fn truncate_db(config: &AppConfig) -> i32 {
    match prompt_confirm(
        "Are you SURE you want to delete all attribution and reporting rows?",
        Some(false),
    ) {
        Ok(true) => match ihc_pipeline_core::storage::Database::open(&config.db_path) {
            Ok(db) => match db.truncate_derived() {
                Ok(()) => {
                    println!("Attribution and reporting tables truncated");
                    0
                }
                Err(e) => {
                    error!("Error truncating database: {}", e);
                    EXIT_FAILURE
                }
            },
            Err(e) => {
                error!("Error opening database: {}", e);
                EXIT_FAILURE
            }
        },
        _ => 0,
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
