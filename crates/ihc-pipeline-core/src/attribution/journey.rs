use super::eligibility::is_eligible;
use crate::storage::models::{Conversion, Session};
use std::collections::BTreeMap;
use tracing::info;

/// One user's sessions (chronological) and the conversions they can be
/// credited toward.
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    pub user_id: String,
    pub sessions: Vec<Session>,
    pub conversions: Vec<Conversion>,
}

impl Journey {
    /// Sessions that strictly precede `conversion`, in chronological order.
    pub fn eligible_sessions<'a>(
        &'a self,
        conversion: &'a Conversion,
    ) -> impl Iterator<Item = &'a Session> + 'a {
        self.sessions
            .iter()
            .filter(move |s| is_eligible(s.timestamp, conversion.timestamp))
    }
}

pub type JourneyMap = BTreeMap<String, Journey>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JourneyStats {
    pub users: usize,
    pub sessions: usize,
    pub conversions: usize,
}

impl JourneyStats {
    pub fn of(journeys: &JourneyMap) -> Self {
        JourneyStats {
            users: journeys.len(),
            sessions: journeys.values().map(|j| j.sessions.len()).sum(),
            conversions: journeys.values().map(|j| j.conversions.len()).sum(),
        }
    }
}

/// Group sessions and conversions by user and keep only creditable activity.
///
/// Users missing from either side are excluded. A conversion survives only if
/// at least one of the user's sessions is eligible for it, and a user with no
/// surviving conversion is dropped.
pub fn build_journeys(sessions: Vec<Session>, conversions: Vec<Conversion>) -> JourneyMap {
    info!("Building customer journeys");

    let mut sessions_by_user: BTreeMap<String, Vec<Session>> = BTreeMap::new();
    for session in sessions {
        sessions_by_user
            .entry(session.user_id.clone())
            .or_default()
            .push(session);
    }

    let mut conversions_by_user: BTreeMap<String, Vec<Conversion>> = BTreeMap::new();
    for conversion in conversions {
        conversions_by_user
            .entry(conversion.user_id.clone())
            .or_default()
            .push(conversion);
    }

    let mut journeys = JourneyMap::new();
    let mut shared_users = 0usize;

    for (user_id, mut user_sessions) in sessions_by_user {
        let Some(mut user_conversions) = conversions_by_user.remove(&user_id) else {
            continue;
        };
        shared_users += 1;

        user_sessions.sort_by_key(|s| s.timestamp);
        user_conversions.sort_by_key(|c| c.timestamp);
        user_conversions.retain(|c| {
            user_sessions
                .iter()
                .any(|s| is_eligible(s.timestamp, c.timestamp))
        });

        if user_sessions.is_empty() || user_conversions.is_empty() {
            continue;
        }

        journeys.insert(
            user_id.clone(),
            Journey {
                user_id,
                sessions: user_sessions,
                conversions: user_conversions,
            },
        );
    }

    let stats = JourneyStats::of(&journeys);
    info!("Found {} users with both sessions and conversions", shared_users);
    info!(
        "Built customer journeys with {} users, {} sessions, and {} conversions",
        stats.users, stats.sessions, stats.conversions
    );
    journeys
}
