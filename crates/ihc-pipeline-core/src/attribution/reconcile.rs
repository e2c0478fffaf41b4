use super::{is_conversion_session, AttributionTable};
use crate::scoring::wire::ConversionCredit;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub conversions: usize,
    pub inserted: usize,
    pub pseudo_sessions_discarded: usize,
    /// Keys that already had a weight. Batches are disjoint by conversion so
    /// this should stay 0; anything else is a data-integrity anomaly.
    pub overwritten: usize,
}

/// Merge one batch's returned credit into `table`.
///
/// Entries without a conversion or session id are ignored, and the synthetic
/// `conversion_*` sessions are dropped. Existing keys are overwritten.
pub fn reconcile(credits: &[ConversionCredit], table: &mut AttributionTable) -> ReconcileStats {
    let mut stats = ReconcileStats::default();

    for credit in credits {
        let Some(conv_id) = credit.conversion_id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        stats.conversions += 1;

        for session in &credit.sessions {
            let Some(session_id) = session.session_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            if is_conversion_session(session_id) {
                stats.pseudo_sessions_discarded += 1;
                continue;
            }

            let previous = table
                .entry(conv_id.to_string())
                .or_default()
                .insert(session_id.to_string(), session.ihc);
            if previous.is_some() {
                warn!(
                    "Attribution for conversion {} session {} returned twice, keeping the latest",
                    conv_id, session_id
                );
                stats.overwritten += 1;
            } else {
                stats.inserted += 1;
            }
        }
    }

    stats
}
