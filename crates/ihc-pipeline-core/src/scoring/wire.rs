//! JSON shapes exchanged with the attribution scoring service.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One (conversion, session) pair, or the synthetic conversion record itself.
/// Flags are sent as 0/1 integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenedJourneyRecord {
    pub conversion_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub channel_label: String,
    pub holder_engagement: u8,
    pub closer_engagement: u8,
    pub conversion: u8,
    pub impression_interaction: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionDirection {
    EarlierSessionsOnly,
    AnySession,
    LaterSessionsOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionRule {
    pub direction: RedistributionDirection,
    pub receive_threshold: f64,
    pub redistribution_channel_labels: Vec<String>,
}

impl RedistributionRule {
    fn open(direction: RedistributionDirection) -> Self {
        Self {
            direction,
            receive_threshold: 0.0,
            redistribution_channel_labels: Vec::new(),
        }
    }
}

/// How credit moves between initializing, holding and closing touchpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionParameter {
    pub initializer: RedistributionRule,
    pub holder: RedistributionRule,
    pub closer: RedistributionRule,
}

impl Default for RedistributionParameter {
    fn default() -> Self {
        Self {
            initializer: RedistributionRule::open(RedistributionDirection::EarlierSessionsOnly),
            holder: RedistributionRule::open(RedistributionDirection::AnySession),
            closer: RedistributionRule::open(RedistributionDirection::LaterSessionsOnly),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub customer_journeys: Vec<FlattenedJourneyRecord>,
    pub redistribution_parameter: RedistributionParameter,
}

/// Either a `value` list of per-conversion credit, or an error shape carrying
/// `statusCode` and optionally `partialFailureErrors`.
///
/// `statusCode` is kept as raw JSON: error bodies are not guaranteed to send
/// it as a number, and a shape mismatch must skip the batch, not abort the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringResponse {
    #[serde(rename = "statusCode", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Value>,
    #[serde(rename = "partialFailureErrors", default, skip_serializing_if = "Option::is_none")]
    pub partial_failure_errors: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_credits",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Vec<ConversionCredit>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionCredit {
    #[serde(default, deserialize_with = "lenient_id")]
    pub conversion_id: Option<String>,
    #[serde(default)]
    pub sessions: Vec<SessionCredit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCredit {
    #[serde(default, deserialize_with = "lenient_id")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_weight")]
    pub ihc: f64,
}

/// Strings pass through, numbers are rendered as text, anything else is
/// treated as a missing id.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A `value` that is not a list counts as absent; list entries that are not
/// credit objects are dropped.
fn lenient_credits<'de, D>(deserializer: D) -> Result<Option<Vec<ConversionCredit>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

/// Non-numeric weights count as 0.
fn lenient_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64().unwrap_or(0.0))
}

impl ScoringResponse {
    /// An application-level failure: a non-200 `statusCode` in the body or a
    /// non-empty partial failure list.
    pub fn application_error(&self) -> Option<String> {
        match &self.status_code {
            None | Some(Value::Null) => {}
            Some(Value::Number(code)) if code.as_u64() == Some(200) => {}
            Some(other) => return Some(format!("statusCode {}", other)),
        }
        match &self.partial_failure_errors {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) if items.is_empty() => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(_) => Some("partial failure errors reported".to_string()),
        }
    }
}
