use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ChannelVolumes, Metrics, WeeklyRecord};
use crate::series::{sanitize_number, RecordSeries};

/// Numeric cells stay text so they pass through the same sanitizing as field edits.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    period_end: NaiveDate,
    revenue: String,
    deal_count: String,
    active_count: String,
    acquisition_cost: String,
    paid: String,
    organic: String,
    email: String,
    referral: String,
}

fn volume(raw: &str) -> f64 {
    sanitize_number(raw).max(0.0)
}

impl From<CsvRow> for WeeklyRecord {
    fn from(row: CsvRow) -> Self {
        WeeklyRecord {
            period_end: row.period_end,
            metrics: Metrics {
                revenue: sanitize_number(&row.revenue),
                deal_count: sanitize_number(&row.deal_count),
                active_count: sanitize_number(&row.active_count),
                acquisition_cost: sanitize_number(&row.acquisition_cost),
            },
            channel_volumes: ChannelVolumes {
                paid: volume(&row.paid),
                organic: volume(&row.organic),
                email: volume(&row.email),
                referral: volume(&row.referral),
            },
        }
    }
}

impl From<&WeeklyRecord> for CsvRow {
    fn from(record: &WeeklyRecord) -> Self {
        CsvRow {
            period_end: record.period_end,
            revenue: record.metrics.revenue.to_string(),
            deal_count: record.metrics.deal_count.to_string(),
            active_count: record.metrics.active_count.to_string(),
            acquisition_cost: record.metrics.acquisition_cost.to_string(),
            paid: record.channel_volumes.paid.to_string(),
            organic: record.channel_volumes.organic.to_string(),
            email: record.channel_volumes.email.to_string(),
            referral: record.channel_volumes.referral.to_string(),
        }
    }
}

/// Read an 8-row history grid, oldest week first.
pub fn import_csv(csv_path: &Path) -> Result<RecordSeries> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut records = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        records.push(WeeklyRecord::from(result?));
    }

    RecordSeries::new(records)
}

pub fn export_csv(series: &RecordSeries, csv_path: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(csv_path)?;
    for record in series.records() {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    Ok(series.records().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WbrError;

    #[test]
    fn exported_grid_imports_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let series = RecordSeries::sample();

        assert_eq!(export_csv(&series, &path).unwrap(), 8);
        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "period_end,revenue,deal_count,active_count,acquisition_cost,paid,organic,email,referral"
        ));
        assert_eq!(import_csv(&path).unwrap(), series);
    }

    #[test]
    fn invalid_cells_are_sanitized_like_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirty.csv");
        let mut raw = String::from(
            "period_end,revenue,deal_count,active_count,acquisition_cost,paid,organic,email,referral\n",
        );
        let start = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        for week in 0..7 {
            let period_end = start + chrono::Duration::days(7 * week);
            raw.push_str(&format!("{period_end},1000,10,20,500,4,3,2,1\n"));
        }
        raw.push_str("2026-09-20,inf,NaN,,-40,inf,,abc,-5\n");
        std::fs::write(&path, raw).unwrap();

        let imported = import_csv(&path).unwrap();
        let latest = imported.latest().unwrap();
        assert_eq!(latest.metrics.revenue, 0.0);
        assert_eq!(latest.metrics.deal_count, 0.0);
        assert_eq!(latest.metrics.active_count, 0.0);
        assert_eq!(latest.metrics.acquisition_cost, -40.0);
        assert_eq!(latest.channel_volumes.paid, 0.0);
        assert_eq!(latest.channel_volumes.organic, 0.0);
        assert_eq!(latest.channel_volumes.email, 0.0);
        assert_eq!(latest.channel_volumes.referral, 0.0);
        assert_eq!(imported.records()[0].metrics.revenue, 1000.0);
        assert_eq!(imported.records()[0].channel_volumes.paid, 4.0);
    }

    #[test]
    fn short_grid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        std::fs::write(
            &path,
            "period_end,revenue,deal_count,active_count,acquisition_cost,paid,organic,email,referral\n\
             2026-10-04,36250,50,145,555,240,188,101,60\n",
        )
        .unwrap();
        assert!(matches!(
            import_csv(&path),
            Err(WbrError::WindowSize { actual: 1, .. })
        ));
    }
}
