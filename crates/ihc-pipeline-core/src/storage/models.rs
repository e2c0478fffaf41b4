use chrono::NaiveDateTime;

/// Storage format for the `event_date`/`conv_date` + `*_time` column pair.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A marketing touchpoint, read from `session_sources` left-joined with `session_costs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub channel: String,
    pub holder_engagement: bool,
    pub closer_engagement: bool,
    pub impression_interaction: bool,
    pub cost: f64,
}

/// A conversion event from the `conversions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub conv_id: String,
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub revenue: f64,
}

/// One row of `channel_reporting`: per channel and day.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReportRow {
    pub channel_name: String,
    pub date: String,
    pub cost: f64,
    pub ihc: f64,
    pub ihc_revenue: f64,
}

impl ChannelReportRow {
    /// Cost per order, 0 when nothing was attributed.
    pub fn cpo(&self) -> f64 {
        if self.ihc > 0.0 {
            self.cost / self.ihc
        } else {
            0.0
        }
    }

    /// Return on ad spend, 0 when the channel had no cost.
    pub fn roas(&self) -> f64 {
        if self.cost > 0.0 {
            self.ihc_revenue / self.cost
        } else {
            0.0
        }
    }
}

pub(crate) fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, crate::Error> {
    let raw = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|_| crate::Error::InvalidTimestamp(raw))
}
