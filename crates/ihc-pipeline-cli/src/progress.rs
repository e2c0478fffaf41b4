use ihc_pipeline_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;

/// CLI progress reporter.
///
/// A bar tracks scoring batches; the other phases print a one-line summary.
pub struct CliReporter {
    bar: RefCell<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: RefCell::new(None),
        }
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}

fn done(message: String) {
    eprintln!("  \x1b[32m✓\x1b[0m {}", message);
}

impl ProgressReporter for CliReporter {
    fn on_load_complete(&self, sessions: usize, conversions: usize) {
        done(format!("Loaded {} sessions and {} conversions", sessions, conversions));
    }

    fn on_journeys_built(&self, users: usize, conversions: usize) {
        done(format!(
            "Built journeys for {} users with {} creditable conversions",
            users, conversions
        ));
    }

    fn on_batch_start(&self, batch_index: usize, total_batches: usize, _conversions: usize) {
        let mut guard = self.bar.borrow_mut();
        let pb = guard.get_or_insert_with(|| {
            let pb = ProgressBar::new(total_batches as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "  {spinner:.cyan} Scoring [{bar:30.cyan/dim}] {pos}/{len} batches ({eta} remaining)",
            ) {
                pb.set_style(
                    style
                        .progress_chars("━╸─")
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
                );
            }
            pb.enable_steady_tick(std::time::Duration::from_millis(80));
            pb
        });
        pb.set_position(batch_index as u64);
    }

    fn on_batch_complete(&self, batch_index: usize, _total_batches: usize, skipped: bool) {
        if let Some(pb) = self.bar.borrow().as_ref() {
            if skipped {
                pb.println(format!("  \x1b[33m!\x1b[0m Batch {} skipped", batch_index + 1));
            }
            pb.set_position(batch_index as u64 + 1);
        }
    }

    fn on_scoring_complete(&self, scored_conversions: usize, duration_secs: f64) {
        self.finish_bar();
        done(format!(
            "Scoring complete: {} conversions in {:.2}s",
            scored_conversions, duration_secs
        ));
    }

    fn on_db_write_complete(&self, rows: usize, duration_secs: f64) {
        done(format!(
            "Database write complete: {} attribution records in {:.2}s",
            rows, duration_secs
        ));
    }

    fn on_export_complete(&self, path: &str) {
        done(format!("Channel report saved to {}", path));
    }
}
