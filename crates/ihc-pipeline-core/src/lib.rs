pub mod attribution;
pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod report;
pub mod scoring;
pub mod storage;

pub use attribution::AttributionTable;
pub use config::{AppConfig, DateRange, ScoringConfig};
pub use engine::{AttributionEngine, RunResult, RunStatus};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use scoring::{HttpScoringClient, ScoringClient};
