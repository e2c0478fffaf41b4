pub mod batch;
pub mod eligibility;
pub mod heuristic;
pub mod journey;
pub mod reconcile;

use std::collections::BTreeMap;

pub use batch::{BatchOrchestrator, OrchestrationReport};
pub use eligibility::is_eligible;
pub use journey::{build_journeys, Journey, JourneyMap, JourneyStats};

/// `conv_id -> session_id -> weight`. Ordered so that persisted output and
/// comparisons across runs are deterministic.
pub type AttributionTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Session id prefix of the synthetic record that stands for the conversion
/// itself in the scoring service wire format.
pub const CONVERSION_SESSION_PREFIX: &str = "conversion_";

pub fn conversion_session_id(conv_id: &str) -> String {
    format!("{}{}", CONVERSION_SESSION_PREFIX, conv_id)
}

pub fn is_conversion_session(session_id: &str) -> bool {
    session_id.starts_with(CONVERSION_SESSION_PREFIX)
}
