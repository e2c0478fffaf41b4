/// Trait for reporting pipeline progress.
///
/// CLI implements with tracing/indicatif, tests use `SilentReporter`.
/// All methods have default no-op implementations.
pub trait ProgressReporter {
    fn on_load_complete(&self, _sessions: usize, _conversions: usize) {}
    fn on_journeys_built(&self, _users: usize, _conversions: usize) {}
    fn on_batch_start(&self, _batch_index: usize, _total_batches: usize, _conversions: usize) {}
    fn on_batch_complete(&self, _batch_index: usize, _total_batches: usize, _skipped: bool) {}
    fn on_scoring_complete(&self, _scored_conversions: usize, _duration_secs: f64) {}
    fn on_db_write_complete(&self, _rows: usize, _duration_secs: f64) {}
    fn on_export_complete(&self, _path: &str) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
