use crate::config::DateRange;
use crate::error::Error;
use crate::storage::models::ChannelReportRow;
use crate::storage::Database;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column order of the exported report. Written even when there are no rows.
pub const REPORT_HEADER: [&str; 7] = [
    "channel_name",
    "date",
    "cost",
    "ihc",
    "ihc_revenue",
    "CPO",
    "ROAS",
];

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    channel_name: &'a str,
    date: &'a str,
    cost: f64,
    ihc: f64,
    ihc_revenue: f64,
    #[serde(rename = "CPO")]
    cpo: f64,
    #[serde(rename = "ROAS")]
    roas: f64,
}

impl<'a> From<&'a ChannelReportRow> for ExportRow<'a> {
    fn from(row: &'a ChannelReportRow) -> Self {
        ExportRow {
            channel_name: &row.channel_name,
            date: &row.date,
            cost: row.cost,
            ihc: row.ihc,
            ihc_revenue: row.ihc_revenue,
            cpo: row.cpo(),
            roas: row.roas(),
        }
    }
}

/// `channel_report_{YYYYmmdd_HHMMSS}{range suffix}.csv`
pub fn report_file_name(generated_at: NaiveDateTime, range: &DateRange) -> String {
    format!(
        "channel_report_{}{}.csv",
        generated_at.format("%Y%m%d_%H%M%S"),
        range.file_suffix()
    )
}

/// Write report rows, with derived CPO and ROAS columns, as CSV.
pub fn write_report_csv<W: Write>(writer: W, rows: &[ChannelReportRow]) -> Result<(), Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(REPORT_HEADER)?;
    for row in rows {
        csv_writer.serialize(ExportRow::from(row))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Export the stored `channel_reporting` table to a timestamped CSV file in
/// `output_dir`, creating the directory if needed.
pub fn export_channel_reporting(
    db: &Database,
    output_dir: &Path,
    range: &DateRange,
) -> Result<PathBuf, Error> {
    info!("Exporting channel reporting data with CPO and ROAS ({})", range.describe());

    let rows = db.get_channel_reporting()?;
    fs::create_dir_all(output_dir)?;

    let now = chrono::Local::now().naive_local();
    let path = output_dir.join(report_file_name(now, range));
    let file = fs::File::create(&path)?;
    write_report_csv(file, &rows)?;

    info!("Exported {} channel reporting rows to {}", rows.len(), path.display());
    Ok(path)
}
