use super::journey::{Journey, JourneyMap};
use super::AttributionTable;
use crate::storage::models::{Conversion, Session};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Channel label substring and the weight it earns.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRule {
    pub needle: &'static str,
    pub weight: f64,
}

impl ChannelRule {
    pub fn matches(&self, channel: &str) -> bool {
        channel.contains(self.needle)
    }
}

/// Evaluated in order; the first matching rule wins.
pub const CHANNEL_RULES: [ChannelRule; 4] = [
    ChannelRule { needle: "Email", weight: 1.2 },
    ChannelRule { needle: "Social", weight: 1.1 },
    ChannelRule { needle: "Search", weight: 1.3 },
    ChannelRule { needle: "Direct", weight: 0.8 },
];

pub const DEFAULT_CHANNEL_WEIGHT: f64 = 1.0;
pub const HOLDER_ENGAGEMENT_BONUS: f64 = 0.5;
pub const CLOSER_ENGAGEMENT_BONUS: f64 = 0.7;

pub fn channel_weight(channel: &str) -> f64 {
    CHANNEL_RULES
        .iter()
        .find(|rule| rule.matches(channel))
        .map_or(DEFAULT_CHANNEL_WEIGHT, |rule| rule.weight)
}

pub fn engagement_weight(session: &Session) -> f64 {
    let mut weight = 1.0;
    if session.holder_engagement {
        weight += HOLDER_ENGAGEMENT_BONUS;
    }
    if session.closer_engagement {
        weight += CLOSER_ENGAGEMENT_BONUS;
    }
    weight
}

/// Linear from `1/total` for the earliest eligible session to `1` for the latest.
pub fn recency_weight(index: usize, total: usize) -> f64 {
    (index + 1) as f64 / total as f64
}

/// Normalized weights for one conversion, or `None` when no session precedes it.
pub fn score_conversion(
    journey: &Journey,
    conversion: &Conversion,
) -> Option<BTreeMap<String, f64>> {
    let eligible: Vec<&Session> = journey.eligible_sessions(conversion).collect();
    if eligible.is_empty() {
        return None;
    }

    let total = eligible.len();
    let raw: Vec<(&str, f64)> = eligible
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let weight = recency_weight(i, total) * channel_weight(&s.channel) * engagement_weight(s);
            (s.session_id.as_str(), weight)
        })
        .collect();

    let sum: f64 = raw.iter().map(|(_, w)| w).sum();
    if sum <= 0.0 {
        return None;
    }

    Some(
        raw.into_iter()
            .map(|(id, w)| (id.to_string(), w / sum))
            .collect(),
    )
}

/// Score every retained conversion of every journey with the local heuristic.
pub fn score_journeys(journeys: &JourneyMap) -> AttributionTable {
    info!("Scoring journeys with the local heuristic");
    let mut table = AttributionTable::new();

    for journey in journeys.values() {
        for conversion in &journey.conversions {
            match score_conversion(journey, conversion) {
                Some(weights) => {
                    table.insert(conversion.conv_id.clone(), weights);
                }
                None => debug!(
                    "Conversion {} has no eligible sessions, skipping",
                    conversion.conv_id
                ),
            }
        }
    }

    info!("Generated heuristic attribution for {} conversions", table.len());
    table
}
