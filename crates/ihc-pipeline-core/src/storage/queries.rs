use super::models::*;
use super::sqlite::Database;
use crate::attribution::AttributionTable;
use crate::config::DateRange;
use rusqlite::{params, params_from_iter, Result};
use tracing::debug;

/// Append an inclusive `column BETWEEN` style filter for the given range.
fn date_filter(column: &str, range: &DateRange) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    if let Some(start) = range.start_str() {
        clauses.push(format!("{} >= ?", column));
        values.push(start);
    }
    if let Some(end) = range.end_str() {
        clauses.push(format!("{} <= ?", column));
        values.push(end);
    }
    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

impl Database {
    // ── Sessions ─────────────────────────────────────────────────

    pub fn get_sessions(&self, range: &DateRange) -> Result<Vec<Session>, crate::Error> {
        let (filter, values) = date_filter("s.event_date", range);
        let sql = format!(
            "SELECT s.session_id, s.user_id, s.event_date, s.event_time, s.channel_name, \
                    s.holder_engagement, s.closer_engagement, s.impression_interaction, \
                    COALESCE(c.cost, 0.0) \
             FROM session_sources s \
             LEFT JOIN session_costs c ON s.session_id = c.session_id{} \
             ORDER BY s.user_id, s.event_date, s.event_time, s.session_id",
            filter
        );

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, bool>(6)?,
                    row.get::<_, bool>(7)?,
                    row.get::<_, f64>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut sessions = Vec::with_capacity(rows.len());
        for (session_id, user_id, date, time, channel, holder, closer, impression, cost) in rows {
            sessions.push(Session {
                session_id,
                user_id,
                timestamp: parse_timestamp(&date, &time)?,
                channel,
                holder_engagement: holder,
                closer_engagement: closer,
                impression_interaction: impression,
                cost,
            });
        }
        debug!("Loaded {} sessions ({})", sessions.len(), range.describe());
        Ok(sessions)
    }

    /// Insert sessions into `session_sources`, with a `session_costs` row for
    /// every session that has a non-zero cost.
    pub fn insert_sessions(&self, sessions: &[Session]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut source_stmt = tx.prepare_cached(
                "INSERT INTO session_sources \
                 (session_id, user_id, event_date, event_time, channel_name, \
                  holder_engagement, closer_engagement, impression_interaction) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut cost_stmt = tx.prepare_cached(
                "INSERT INTO session_costs (session_id, cost) VALUES (?1, ?2) \
                 ON CONFLICT(session_id) DO UPDATE SET cost = excluded.cost",
            )?;
            for session in sessions {
                count += source_stmt.execute(params![
                    session.session_id,
                    session.user_id,
                    session.timestamp.format("%Y-%m-%d").to_string(),
                    session.timestamp.format("%H:%M:%S").to_string(),
                    session.channel,
                    session.holder_engagement,
                    session.closer_engagement,
                    session.impression_interaction,
                ])?;
                if session.cost != 0.0 {
                    cost_stmt.execute(params![session.session_id, session.cost])?;
                }
            }
        }
        tx.commit()?;
        Ok(count)
    }

    // ── Conversions ──────────────────────────────────────────────

    pub fn get_conversions(&self, range: &DateRange) -> Result<Vec<Conversion>, crate::Error> {
        let (filter, values) = date_filter("conv_date", range);
        let sql = format!(
            "SELECT conv_id, user_id, conv_date, conv_time, revenue \
             FROM conversions{} \
             ORDER BY user_id, conv_date, conv_time, conv_id",
            filter
        );

        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut conversions = Vec::with_capacity(rows.len());
        for (conv_id, user_id, date, time, revenue) in rows {
            conversions.push(Conversion {
                conv_id,
                user_id,
                timestamp: parse_timestamp(&date, &time)?,
                revenue,
            });
        }
        debug!("Loaded {} conversions ({})", conversions.len(), range.describe());
        Ok(conversions)
    }

    pub fn insert_conversions(&self, conversions: &[Conversion]) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO conversions (conv_id, user_id, conv_date, conv_time, revenue) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for conversion in conversions {
                count += stmt.execute(params![
                    conversion.conv_id,
                    conversion.user_id,
                    conversion.timestamp.format("%Y-%m-%d").to_string(),
                    conversion.timestamp.format("%H:%M:%S").to_string(),
                    conversion.revenue,
                ])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    // ── Attribution ──────────────────────────────────────────────

    /// Replace the whole attribution table in one transaction. Readers never
    /// observe an empty table; on error the previous contents are kept.
    pub fn replace_attribution(&self, table: &AttributionTable) -> Result<usize> {
        let tx = self.connection().unchecked_transaction()?;
        tx.execute("DELETE FROM attribution_customer_journey", [])?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO attribution_customer_journey (conv_id, session_id, ihc) \
                 VALUES (?1, ?2, ?3)",
            )?;
            for (conv_id, sessions) in table {
                for (session_id, ihc) in sessions {
                    count += stmt.execute(params![conv_id, session_id, ihc])?;
                }
            }
        }
        tx.commit()?;
        debug!("Replaced attribution table with {} rows", count);
        Ok(count)
    }

    pub fn get_attribution(&self) -> Result<AttributionTable> {
        let mut stmt = self.connection().prepare(
            "SELECT conv_id, session_id, ihc FROM attribution_customer_journey \
             ORDER BY conv_id, session_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut table = AttributionTable::new();
        for (conv_id, session_id, ihc) in rows {
            table.entry(conv_id).or_default().insert(session_id, ihc);
        }
        Ok(table)
    }

    // ── Channel Reporting ────────────────────────────────────────

    /// Aggregate cost and attributed credit per channel and day, and replace
    /// `channel_reporting` with the result. Attribution is summed per session
    /// before joining so a session credited to several conversions keeps a
    /// single cost contribution.
    pub fn generate_channel_reporting(&self, range: &DateRange) -> Result<Vec<ChannelReportRow>> {
        let (filter, values) = date_filter("s.event_date", range);
        let sql = format!(
            "WITH attribution_revenue AS ( \
                 SELECT acj.session_id, \
                        SUM(acj.ihc) AS ihc, \
                        SUM(acj.ihc * c.revenue) AS ihc_revenue \
                 FROM attribution_customer_journey acj \
                 JOIN conversions c ON acj.conv_id = c.conv_id \
                 GROUP BY acj.session_id \
             ) \
             SELECT s.channel_name, \
                    s.event_date AS date, \
                    SUM(COALESCE(sc.cost, 0.0)) AS cost, \
                    SUM(COALESCE(ar.ihc, 0.0)) AS ihc, \
                    SUM(COALESCE(ar.ihc_revenue, 0.0)) AS ihc_revenue \
             FROM session_sources s \
             LEFT JOIN session_costs sc ON s.session_id = sc.session_id \
             LEFT JOIN attribution_revenue ar ON s.session_id = ar.session_id{} \
             GROUP BY s.channel_name, s.event_date \
             ORDER BY s.channel_name, s.event_date",
            filter
        );

        let tx = self.connection().unchecked_transaction()?;
        let rows = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    Ok(ChannelReportRow {
                        channel_name: row.get(0)?,
                        date: row.get(1)?,
                        cost: row.get(2)?,
                        ihc: row.get(3)?,
                        ihc_revenue: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>>>()?;

            tx.execute("DELETE FROM channel_reporting", [])?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO channel_reporting (channel_name, date, cost, ihc, ihc_revenue) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in &rows {
                insert.execute(params![
                    row.channel_name,
                    row.date,
                    row.cost,
                    row.ihc,
                    row.ihc_revenue
                ])?;
            }
            rows
        };
        tx.commit()?;
        debug!("Generated {} channel reporting rows", rows.len());
        Ok(rows)
    }

    pub fn get_channel_reporting(&self) -> Result<Vec<ChannelReportRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT channel_name, date, cost, ihc, ihc_revenue FROM channel_reporting \
             ORDER BY channel_name, date",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ChannelReportRow {
                    channel_name: row.get(0)?,
                    date: row.get(1)?,
                    cost: row.get(2)?,
                    ihc: row.get(3)?,
                    ihc_revenue: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }
}
