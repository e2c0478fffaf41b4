use super::journey::JourneyMap;
use super::reconcile::{reconcile, ReconcileStats};
use super::{conversion_session_id, AttributionTable};
use crate::config::ScoringConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scoring::wire::{FlattenedJourneyRecord, RedistributionParameter, ScoringRequest};
use crate::scoring::ScoringClient;
use crate::storage::models::TIMESTAMP_FORMAT;
use indexmap::IndexMap;
use tracing::{error, info, warn};

/// Label of the synthetic record standing for the conversion event.
pub const CONVERSION_CHANNEL_LABEL: &str = "Conversion";

/// Conversions (with all their records) submitted in one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub index: usize,
    pub conversion_ids: Vec<String>,
    pub records: Vec<FlattenedJourneyRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Scored(ReconcileStats),
    Skipped(String),
}

#[derive(Debug, Clone, Default)]
pub struct OrchestrationReport {
    pub table: AttributionTable,
    pub batches: usize,
    pub skipped_batches: usize,
    /// Conversion ids sent to the service, in submission order.
    pub submitted_conversions: Vec<String>,
    /// Conversion ids of batches that were skipped after an application error.
    pub skipped_conversions: Vec<String>,
    pub anomalies: usize,
}

impl OrchestrationReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_conversions.is_empty()
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// One record per (conversion, eligible session), followed by the synthetic
/// conversion record, for every retained conversion of every journey.
pub fn flatten_journeys(journeys: &JourneyMap) -> Vec<FlattenedJourneyRecord> {
    let mut records = Vec::new();

    for journey in journeys.values() {
        for conversion in &journey.conversions {
            for session in journey.eligible_sessions(conversion) {
                records.push(FlattenedJourneyRecord {
                    conversion_id: conversion.conv_id.clone(),
                    session_id: session.session_id.clone(),
                    timestamp: session.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    channel_label: session.channel.clone(),
                    holder_engagement: flag(session.holder_engagement),
                    closer_engagement: flag(session.closer_engagement),
                    conversion: 0,
                    impression_interaction: flag(session.impression_interaction),
                });
            }

            records.push(FlattenedJourneyRecord {
                conversion_id: conversion.conv_id.clone(),
                session_id: conversion_session_id(&conversion.conv_id),
                timestamp: conversion.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                channel_label: CONVERSION_CHANNEL_LABEL.to_string(),
                holder_engagement: 0,
                closer_engagement: 0,
                conversion: 1,
                impression_interaction: 0,
            });
        }
    }

    info!("Formatted {} session-conversion pairs for the scoring service", records.len());
    records
}

/// Group records by conversion id, keeping first-encounter order.
pub fn group_by_conversion(
    records: Vec<FlattenedJourneyRecord>,
) -> IndexMap<String, Vec<FlattenedJourneyRecord>> {
    let mut grouped: IndexMap<String, Vec<FlattenedJourneyRecord>> = IndexMap::new();
    for record in records {
        grouped
            .entry(record.conversion_id.clone())
            .or_default()
            .push(record);
    }
    grouped
}

/// Split grouped conversions into batches of at most `batch_size`
/// conversions. A conversion's records always travel together.
///
/// `batch_size` is non-zero; `BatchOrchestrator::new` rejects 0.
pub(crate) fn plan_batches(
    grouped: IndexMap<String, Vec<FlattenedJourneyRecord>>,
    batch_size: usize,
) -> Vec<Batch> {
    debug_assert!(batch_size > 0);

    let mut batches: Vec<Batch> = Vec::new();
    let mut current = Batch::default();

    for (conv_id, records) in grouped {
        if current.conversion_ids.len() == batch_size {
            let next = Batch {
                index: current.index + 1,
                ..Batch::default()
            };
            batches.push(std::mem::replace(&mut current, next));
        }
        current.conversion_ids.push(conv_id);
        current.records.extend(records);
    }

    if !current.conversion_ids.is_empty() {
        batches.push(current);
    }
    batches
}

/// Sends journeys to the scoring service batch by batch and merges the
/// returned credit.
///
/// An application-level error skips the batch and the run continues. Any
/// `Err` from the client aborts immediately.
pub struct BatchOrchestrator<'a> {
    client: &'a dyn ScoringClient,
    batch_size: usize,
    redistribution: RedistributionParameter,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(client: &'a dyn ScoringClient, config: &ScoringConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            client,
            batch_size: config.batch_size,
            redistribution: RedistributionParameter::default(),
        })
    }

    pub fn run(
        &self,
        journeys: &JourneyMap,
        reporter: &dyn ProgressReporter,
    ) -> Result<OrchestrationReport, Error> {
        info!("Calling scoring service with batched requests");

        let grouped = group_by_conversion(flatten_journeys(journeys));
        info!("Total conversions to process: {}", grouped.len());

        let mut report = OrchestrationReport {
            submitted_conversions: grouped.keys().cloned().collect(),
            ..OrchestrationReport::default()
        };

        let batches = plan_batches(grouped, self.batch_size);
        report.batches = batches.len();

        for batch in batches {
            reporter.on_batch_start(batch.index, report.batches, batch.conversion_ids.len());
            info!(
                "Processing batch {}: {} conversions, {} sessions",
                batch.index + 1,
                batch.conversion_ids.len(),
                batch.records.len()
            );

            let outcome = self.process_batch(&batch, &mut report.table)?;
            let skipped = matches!(outcome, BatchOutcome::Skipped(_));
            match outcome {
                BatchOutcome::Scored(stats) => report.anomalies += stats.overwritten,
                BatchOutcome::Skipped(_) => {
                    report.skipped_batches += 1;
                    report.skipped_conversions.extend(batch.conversion_ids.iter().cloned());
                }
            }
            reporter.on_batch_complete(batch.index, report.batches, skipped);
        }

        info!(
            "Completed all batches. Received attribution for {} conversions ({} of {} batches skipped)",
            report.table.len(),
            report.skipped_batches,
            report.batches
        );
        if report.anomalies > 0 {
            warn!("{} attribution entries were overwritten across batches", report.anomalies);
        }
        Ok(report)
    }

    fn process_batch(
        &self,
        batch: &Batch,
        table: &mut AttributionTable,
    ) -> Result<BatchOutcome, Error> {
        let request = ScoringRequest {
            customer_journeys: batch.records.clone(),
            redistribution_parameter: self.redistribution.clone(),
        };

        let response = self.client.score_batch(&request)?;

        if let Some(reason) = response.application_error() {
            error!("Scoring service error in batch {}: {}", batch.index + 1, reason);
            if let Some(details) = &response.partial_failure_errors {
                error!("Partial failures: {}", details);
            }
            return Ok(BatchOutcome::Skipped(reason));
        }

        match &response.value {
            Some(credits) => Ok(BatchOutcome::Scored(reconcile(credits, table))),
            None => {
                warn!(
                    "Unexpected scoring response format in batch {}: no `value` field",
                    batch.index + 1
                );
                Ok(BatchOutcome::Skipped("missing value".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::journey::build_journeys;
    use crate::storage::models::{Conversion, Session};
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 9, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(conv_id: &str, session_id: &str) -> FlattenedJourneyRecord {
        FlattenedJourneyRecord {
            conversion_id: conv_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: "2023-09-01 09:00:00".to_string(),
            channel_label: "Search".to_string(),
            holder_engagement: 0,
            closer_engagement: 0,
            conversion: 0,
            impression_interaction: 0,
        }
    }

    #[test]
    fn test_flatten_adds_one_conversion_record_per_conversion() {
        let journeys = build_journeys(
            vec![
                Session {
                    session_id: "s1".into(),
                    user_id: "u1".into(),
                    timestamp: ts(9),
                    channel: "Email".into(),
                    holder_engagement: true,
                    closer_engagement: false,
                    impression_interaction: true,
                    cost: 1.5,
                },
                Session {
                    session_id: "s2".into(),
                    user_id: "u1".into(),
                    timestamp: ts(11),
                    channel: "Direct".into(),
                    holder_engagement: false,
                    closer_engagement: true,
                    impression_interaction: false,
                    cost: 0.0,
                },
            ],
            vec![
                Conversion { conv_id: "c1".into(), user_id: "u1".into(), timestamp: ts(10), revenue: 5.0 },
                Conversion { conv_id: "c2".into(), user_id: "u1".into(), timestamp: ts(12), revenue: 7.0 },
            ],
        );

        let records = flatten_journeys(&journeys);
        let ids: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.conversion_id.as_str(), r.session_id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("c1", "s1"),
                ("c1", "conversion_c1"),
                ("c2", "s1"),
                ("c2", "s2"),
                ("c2", "conversion_c2"),
            ]
        );

        assert_eq!(records[0].holder_engagement, 1);
        assert_eq!(records[0].impression_interaction, 1);
        assert_eq!(records[0].timestamp, "2023-09-01 09:00:00");
        let synthetic = &records[1];
        assert_eq!(synthetic.conversion, 1);
        assert_eq!(synthetic.channel_label, "Conversion");
        assert_eq!(synthetic.timestamp, "2023-09-01 10:00:00");
        assert_eq!(records.iter().filter(|r| r.conversion == 1).count(), 2);
    }

    #[test]
    fn test_grouping_keeps_first_encounter_order() {
        let grouped = group_by_conversion(vec![
            record("c9", "s1"),
            record("c2", "s2"),
            record("c9", "s3"),
            record("c5", "s4"),
        ]);
        let keys: Vec<&String> = grouped.keys().collect();
        assert_eq!(keys, vec!["c9", "c2", "c5"]);
        assert_eq!(grouped["c9"].len(), 2);
    }

    #[test]
    fn test_250_conversions_make_three_batches() {
        let mut records = Vec::new();
        for i in 0..250 {
            let conv = format!("c{:03}", i);
            records.push(record(&conv, &format!("s{}a", i)));
            records.push(record(&conv, &format!("s{}b", i)));
        }
        let batches = plan_batches(group_by_conversion(records), 100);

        let sizes: Vec<usize> = batches.iter().map(|b| b.conversion_ids.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(batches.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2]);

        let mut seen = std::collections::HashSet::new();
        for batch in &batches {
            for id in &batch.conversion_ids {
                assert!(seen.insert(id.clone()), "{} appears in more than one batch", id);
            }
            // Records of a conversion never leave its batch.
            assert!(batch
                .records
                .iter()
                .all(|r| batch.conversion_ids.contains(&r.conversion_id)));
            assert_eq!(batch.records.len(), batch.conversion_ids.len() * 2);
        }
        assert_eq!(seen.len(), 250);
    }

    #[test]
    fn test_plan_batches_empty_input() {
        assert!(plan_batches(IndexMap::new(), 10).is_empty());
    }

    struct Unreachable;

    impl ScoringClient for Unreachable {
        fn score_batch(
            &self,
            _request: &ScoringRequest,
        ) -> Result<crate::scoring::ScoringResponse, Error> {
            Err(Error::Transport("unreachable".to_string()))
        }
    }

    fn scoring_config(batch_size: usize) -> ScoringConfig {
        ScoringConfig {
            api_url: "http://127.0.0.1:9/".to_string(),
            api_token: "t".to_string(),
            conv_type_id: "default".to_string(),
            batch_size,
        }
    }

    #[test]
    fn test_orchestrator_rejects_zero_batch_size() {
        assert!(matches!(
            BatchOrchestrator::new(&Unreachable, &scoring_config(0)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_orchestrator_takes_batch_size_from_scoring_config() {
        let orchestrator = BatchOrchestrator::new(&Unreachable, &scoring_config(7)).unwrap();
        assert_eq!(orchestrator.batch_size, 7);
    }
}
