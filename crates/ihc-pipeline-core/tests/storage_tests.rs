use chrono::{NaiveDate, NaiveDateTime};
use ihc_pipeline_core::storage::models::*;
use ihc_pipeline_core::storage::Database;
use ihc_pipeline_core::{AttributionTable, DateRange};

fn ts(day: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 9, day)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn make_session(id: &str, user: &str, at: NaiveDateTime, channel: &str, cost: f64) -> Session {
    Session {
        session_id: id.to_string(),
        user_id: user.to_string(),
        timestamp: at,
        channel: channel.to_string(),
        holder_engagement: false,
        closer_engagement: true,
        impression_interaction: false,
        cost,
    }
}

fn make_conversion(id: &str, user: &str, at: NaiveDateTime, revenue: f64) -> Conversion {
    Conversion {
        conv_id: id.to_string(),
        user_id: user.to_string(),
        timestamp: at,
        revenue,
    }
}

fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.insert_sessions(&[
        make_session("s1", "u1", ts(1, 9), "Email", 2.0),
        make_session("s2", "u1", ts(2, 9), "Search", 0.0),
        make_session("s3", "u2", ts(3, 9), "Email", 4.0),
    ])
    .unwrap();
    db.insert_conversions(&[
        make_conversion("c1", "u1", ts(2, 12), 100.0),
        make_conversion("c2", "u2", ts(3, 12), 50.0),
    ])
    .unwrap();
    db
}

#[test]
fn test_sessions_round_trip_with_costs() {
    let db = seeded_db();
    let sessions = db.get_sessions(&DateRange::unbounded()).unwrap();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0], make_session("s1", "u1", ts(1, 9), "Email", 2.0));
    // No session_costs row falls back to zero.
    assert_eq!(sessions[1].cost, 0.0);
    assert!(sessions[1].closer_engagement);
}

#[test]
fn test_date_range_is_inclusive() {
    let db = seeded_db();
    let range = DateRange::parse(Some("2023-09-02"), Some("2023-09-03")).unwrap();
    let ids: Vec<String> = db
        .get_sessions(&range)
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(ids, vec!["s2", "s3"]);

    let only_end = DateRange::parse(None, Some("2023-09-02")).unwrap();
    let conversions = db.get_conversions(&only_end).unwrap();
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0].conv_id, "c1");
    assert_eq!(conversions[0].timestamp, ts(2, 12));
}

#[test]
fn test_replace_attribution_discards_previous_rows() {
    let db = seeded_db();

    let mut first = AttributionTable::new();
    first.entry("c1".into()).or_default().insert("s1".into(), 0.5);
    first.entry("c1".into()).or_default().insert("s2".into(), 0.5);
    assert_eq!(db.replace_attribution(&first).unwrap(), 2);

    let mut second = AttributionTable::new();
    second.entry("c2".into()).or_default().insert("s3".into(), 1.0);
    assert_eq!(db.replace_attribution(&second).unwrap(), 1);

    assert_eq!(db.get_attribution().unwrap(), second);
}

#[test]
fn test_failed_replace_keeps_previous_rows() {
    let db = seeded_db();

    let mut table = AttributionTable::new();
    table.entry("c1".into()).or_default().insert("s1".into(), 1.0);
    db.replace_attribution(&table).unwrap();

    // Make every insert fail so the transaction has to roll back.
    db.connection()
        .execute_batch(
            "CREATE TRIGGER reject_attribution BEFORE INSERT ON attribution_customer_journey \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let mut replacement = AttributionTable::new();
    replacement.entry("c2".into()).or_default().insert("s3".into(), 1.0);
    assert!(db.replace_attribution(&replacement).is_err());

    assert_eq!(db.get_attribution().unwrap(), table);
}

#[test]
fn test_channel_reporting_aggregates_cost_and_credit() {
    let db = seeded_db();

    let mut table = AttributionTable::new();
    table.entry("c1".into()).or_default().insert("s1".into(), 0.25);
    table.entry("c1".into()).or_default().insert("s2".into(), 0.75);
    table.entry("c2".into()).or_default().insert("s3".into(), 1.0);
    db.replace_attribution(&table).unwrap();

    let rows = db.generate_channel_reporting(&DateRange::unbounded()).unwrap();
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].channel_name, "Email");
    assert_eq!(rows[0].date, "2023-09-01");
    assert_eq!(rows[0].cost, 2.0);
    assert!((rows[0].ihc - 0.25).abs() < 1e-9);
    assert!((rows[0].ihc_revenue - 25.0).abs() < 1e-9);

    assert_eq!(rows[1].channel_name, "Email");
    assert_eq!(rows[1].date, "2023-09-03");
    assert!((rows[1].ihc_revenue - 50.0).abs() < 1e-9);
    assert!((rows[1].cpo() - 4.0).abs() < 1e-9);
    assert!((rows[1].roas() - 12.5).abs() < 1e-9);

    assert_eq!(rows[2].channel_name, "Search");
    assert_eq!(rows[2].cost, 0.0);
    assert_eq!(rows[2].roas(), 0.0);

    assert_eq!(db.get_channel_reporting().unwrap(), rows);
}

#[test]
fn test_session_credited_to_two_conversions_counts_cost_once() {
    let db = Database::open_in_memory().unwrap();
    db.insert_sessions(&[make_session("s1", "u1", ts(1, 9), "Email", 3.0)])
        .unwrap();
    db.insert_conversions(&[
        make_conversion("c1", "u1", ts(1, 10), 10.0),
        make_conversion("c2", "u1", ts(1, 11), 20.0),
    ])
    .unwrap();

    let mut table = AttributionTable::new();
    table.entry("c1".into()).or_default().insert("s1".into(), 1.0);
    table.entry("c2".into()).or_default().insert("s1".into(), 1.0);
    db.replace_attribution(&table).unwrap();

    let rows = db.generate_channel_reporting(&DateRange::unbounded()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cost, 3.0);
    assert!((rows[0].ihc - 2.0).abs() < 1e-9);
    assert!((rows[0].ihc_revenue - 30.0).abs() < 1e-9);
}

#[test]
fn test_truncate_derived_keeps_source_tables() {
    let db = seeded_db();
    let mut table = AttributionTable::new();
    table.entry("c1".into()).or_default().insert("s1".into(), 1.0);
    db.replace_attribution(&table).unwrap();
    db.generate_channel_reporting(&DateRange::unbounded()).unwrap();

    db.truncate_derived().unwrap();

    assert!(db.get_attribution().unwrap().is_empty());
    assert!(db.get_channel_reporting().unwrap().is_empty());
    assert_eq!(db.get_sessions(&DateRange::unbounded()).unwrap().len(), 3);
}

#[test]
fn test_reopening_database_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::open(path).unwrap();
        db.insert_sessions(&[make_session("s1", "u1", ts(1, 9), "Email", 1.0)])
            .unwrap();
    }

    let db = Database::open(path).unwrap();
    assert_eq!(db.get_sessions(&DateRange::unbounded()).unwrap().len(), 1);
}

#[test]
fn test_open_provisions_over_unversioned_event_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::open(path).unwrap();
        db.insert_sessions(&[make_session("s1", "u1", ts(1, 9), "Email", 1.0)])
            .unwrap();
        db.connection()
            .execute_batch("DROP TABLE channel_reporting; PRAGMA user_version = 0;")
            .unwrap();
    }

    let db = Database::open(path).unwrap();
    let version: i64 = db
        .connection()
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 1);
    assert_eq!(db.get_sessions(&DateRange::unbounded()).unwrap().len(), 1);
    assert!(db.get_channel_reporting().unwrap().is_empty());
}
