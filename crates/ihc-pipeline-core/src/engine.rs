use crate::attribution::{build_journeys, heuristic, AttributionTable, BatchOrchestrator, JourneyStats};
use crate::config::{AppConfig, DateRange, ScoringConfig};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::report;
use crate::scoring::{HttpScoringClient, ScoringClient};
use crate::storage::Database;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct AttributionEngine {
    config: AppConfig,
}

/// Whether every submitted conversion made it through scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    /// Some batches were skipped after application-level errors from the
    /// scoring service. Their conversions are absent from the attribution table.
    Partial { skipped_conversions: Vec<String> },
}

#[derive(Debug)]
pub struct RunResult {
    pub load_duration: Duration,
    pub scoring_duration: Duration,
    pub db_write_duration: Duration,
    pub report_duration: Duration,
    pub sessions_loaded: usize,
    pub conversions_loaded: usize,
    pub journeys: JourneyStats,
    pub attributed_conversions: usize,
    pub attribution_rows: usize,
    pub report_rows: usize,
    pub report_path: PathBuf,
    pub status: RunStatus,
}

enum Scorer<'a> {
    Heuristic,
    Service(&'a dyn ScoringClient, &'a ScoringConfig),
}

struct Scored {
    table: AttributionTable,
    status: RunStatus,
}

impl AttributionEngine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.config.db_path = path.to_string();
        self
    }

    pub fn with_output_dir(mut self, path: &str) -> Self {
        self.config.output_dir = path.to_string();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Create any missing tables in the configured database.
    pub fn init_database(&self) -> Result<(), Error> {
        Database::open(&self.config.db_path)?;
        info!("Database tables ready at {}", self.config.db_path);
        Ok(())
    }

    /// Run the full attribution pipeline:
    /// 1. Load sessions and conversions for the date range
    /// 2. Build customer journeys
    /// 3. Score with the local heuristic (test mode) or the scoring service
    /// 4. Replace the attribution table
    /// 5. Regenerate channel reporting and export it to CSV
    pub fn run(&self, range: &DateRange, reporter: &dyn ProgressReporter) -> Result<RunResult, Error> {
        if self.config.test_mode {
            self.execute(range, Scorer::Heuristic, reporter)
        } else {
            let scoring = self.config.scoring_config()?;
            let client = HttpScoringClient::new(scoring.clone())?;
            self.execute(range, Scorer::Service(&client, &scoring), reporter)
        }
    }

    /// Run the pipeline through the batched path with the given client,
    /// regardless of `test_mode`. Batches are sized by `scoring.batch_size`.
    pub fn run_with_client(
        &self,
        range: &DateRange,
        client: &dyn ScoringClient,
        scoring: &ScoringConfig,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, Error> {
        self.execute(range, Scorer::Service(client, scoring), reporter)
    }

    fn execute(
        &self,
        range: &DateRange,
        scorer: Scorer<'_>,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunResult, Error> {
        info!("Starting attribution pipeline ({})", range.describe());
        let db = Database::open(&self.config.db_path)?;

        // Phase 1: Load
        info!("Getting data from database...");
        let load_start = Instant::now();
        let sessions = db.get_sessions(range)?;
        let conversions = db.get_conversions(range)?;
        let sessions_loaded = sessions.len();
        let conversions_loaded = conversions.len();
        reporter.on_load_complete(sessions_loaded, conversions_loaded);

        // Phase 2: Journeys
        info!("Building customer journeys...");
        let journeys = build_journeys(sessions, conversions);
        let journey_stats = JourneyStats::of(&journeys);
        let load_duration = load_start.elapsed();
        reporter.on_journeys_built(journey_stats.users, journey_stats.conversions);

        // Phase 3: Score
        let scoring_start = Instant::now();
        let scored = match scorer {
            Scorer::Heuristic => {
                info!("Scoring with the local heuristic (test mode)...");
                Scored {
                    table: heuristic::score_journeys(&journeys),
                    status: RunStatus::Complete,
                }
            }
            Scorer::Service(client, scoring) => {
                info!("Scoring through the attribution service...");
                let orchestrator = BatchOrchestrator::new(client, scoring)?;
                let outcome = orchestrator.run(&journeys, reporter)?;
                let status = if outcome.is_complete() {
                    RunStatus::Complete
                } else {
                    warn!(
                        "{} of {} conversions were skipped by the scoring service",
                        outcome.skipped_conversions.len(),
                        outcome.submitted_conversions.len()
                    );
                    RunStatus::Partial {
                        skipped_conversions: outcome.skipped_conversions,
                    }
                };
                Scored {
                    table: outcome.table,
                    status,
                }
            }
        };
        let scoring_duration = scoring_start.elapsed();
        reporter.on_scoring_complete(scored.table.len(), scoring_duration.as_secs_f64());

        // Phase 4: Write
        info!("Saving attribution results...");
        let db_start = Instant::now();
        let attribution_rows = db.replace_attribution(&scored.table)?;
        let db_write_duration = db_start.elapsed();
        debug!(
            "Attribution write completed in {:.2}s, {} rows",
            db_write_duration.as_secs_f64(),
            attribution_rows
        );
        reporter.on_db_write_complete(attribution_rows, db_write_duration.as_secs_f64());

        // Phase 5: Report
        info!("Generating channel reporting...");
        let report_start = Instant::now();
        let report_rows = db.generate_channel_reporting(range)?.len();
        let report_path =
            report::export_channel_reporting(&db, Path::new(&self.config.output_dir), range)?;
        let report_duration = report_start.elapsed();
        reporter.on_export_complete(&report_path.to_string_lossy());

        Ok(RunResult {
            load_duration,
            scoring_duration,
            db_write_duration,
            report_duration,
            sessions_loaded,
            conversions_loaded,
            journeys: journey_stats,
            attributed_conversions: scored.table.len(),
            attribution_rows,
            report_rows,
            report_path,
            status: scored.status,
        })
    }
}
