use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WbrError};
use crate::models::{Channel, ChannelVolumes, Metric, Metrics, WeeklyRecord};

pub const WINDOW: usize = 8;

/// Eight weekly records, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WeeklyRecord>", into = "Vec<WeeklyRecord>")]
pub struct RecordSeries {
    records: Vec<WeeklyRecord>,
}

impl TryFrom<Vec<WeeklyRecord>> for RecordSeries {
    type Error = WbrError;

    fn try_from(records: Vec<WeeklyRecord>) -> Result<Self> {
        Self::new(records)
    }
}

impl From<RecordSeries> for Vec<WeeklyRecord> {
    fn from(series: RecordSeries) -> Self {
        series.records
    }
}

impl RecordSeries {
    pub fn new(records: Vec<WeeklyRecord>) -> Result<Self> {
        if records.len() != WINDOW {
            return Err(WbrError::WindowSize {
                expected: WINDOW,
                actual: records.len(),
            });
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[WeeklyRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&WeeklyRecord> {
        self.records.last()
    }

    fn week_mut(&mut self, week: usize) -> Result<&mut WeeklyRecord> {
        self.records
            .get_mut(week)
            .ok_or(WbrError::WeekOutOfRange(week))
    }

    /// Replace one metric from raw user text. Unparseable or non-finite text becomes 0.
    pub fn set_metric(&mut self, week: usize, metric: Metric, raw: &str) -> Result<f64> {
        let value = sanitize_number(raw);
        self.week_mut(week)?.metrics.set(metric, value);
        Ok(value)
    }

    /// Replace one channel volume from raw user text. Negative volumes also become 0.
    pub fn set_channel(&mut self, week: usize, channel: Channel, raw: &str) -> Result<f64> {
        let value = sanitize_number(raw).max(0.0);
        self.week_mut(week)?.channel_volumes.set(channel, value);
        Ok(value)
    }

    pub fn set_period_end(&mut self, week: usize, period_end: NaiveDate) -> Result<()> {
        self.week_mut(week)?.period_end = period_end;
        Ok(())
    }

    /// Drop the oldest week and append a copy of the latest, dated one week later.
    pub fn roll_forward(&mut self) -> Option<NaiveDate> {
        let mut next = self.records.last()?.clone();
        next.period_end += Duration::days(7);
        let period_end = next.period_end;
        self.records.remove(0);
        self.records.push(next);
        Some(period_end)
    }

    pub fn is_chronological(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].period_end < pair[1].period_end)
    }

    /// Demo document used by `init`.
    pub fn sample() -> Self {
        let start = NaiveDate::from_ymd_opt(2026, 8, 16).unwrap_or(NaiveDate::MIN);
        let revenue = [31250.0, 29800.0, 33500.0, 34100.0, 32900.0, 35200.0, 37100.0, 36250.0];
        let deals = [42.0, 39.0, 45.0, 47.0, 44.0, 48.0, 51.0, 50.0];
        let active = [128.0, 131.0, 135.0, 133.0, 138.0, 142.0, 147.0, 145.0];
        let cost = [620.0, 640.0, 600.0, 590.0, 610.0, 600.0, 540.0, 555.0];
        let channels = [
            (210.0, 170.0, 95.0, 52.0),
            (198.0, 166.0, 90.0, 50.0),
            (221.0, 175.0, 97.0, 55.0),
            (226.0, 179.0, 99.0, 57.0),
            (214.0, 176.0, 96.0, 54.0),
            (230.0, 182.0, 100.0, 58.0),
            (246.0, 185.0, 104.0, 61.0),
            (240.0, 188.0, 101.0, 60.0),
        ];

        let records = (0..WINDOW)
            .map(|week| {
                let (paid, organic, email, referral) = channels[week];
                WeeklyRecord {
                    period_end: start + Duration::days(7 * week as i64),
                    metrics: Metrics {
                        revenue: revenue[week],
                        deal_count: deals[week],
                        active_count: active[week],
                        acquisition_cost: cost[week],
                    },
                    channel_volumes: ChannelVolumes {
                        paid,
                        organic,
                        email,
                        referral,
                    },
                }
            })
            .collect();
        Self { records }
    }
}

pub fn sanitize_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '_'))
        .collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_window_size() {
        let mut records = RecordSeries::sample().records().to_vec();
        records.pop();
        let err = RecordSeries::new(records).unwrap_err();
        assert!(matches!(err, WbrError::WindowSize { expected: 8, actual: 7 }));
    }

    #[test]
    fn invalid_edits_become_zero() {
        let mut series = RecordSeries::sample();
        assert_eq!(series.set_metric(3, Metric::Revenue, "abc").unwrap(), 0.0);
        assert_eq!(series.set_metric(3, Metric::DealCount, "inf").unwrap(), 0.0);
        assert_eq!(series.set_metric(3, Metric::ActiveCount, "NaN").unwrap(), 0.0);
        assert_eq!(series.set_metric(3, Metric::AcquisitionCost, "$1,250").unwrap(), 1250.0);
        assert_eq!(series.records()[3].metrics.revenue, 0.0);
        assert_eq!(series.set_channel(2, Channel::Email, "-14").unwrap(), 0.0);
    }

    #[test]
    fn out_of_range_week_is_an_error() {
        let mut series = RecordSeries::sample();
        assert!(matches!(
            series.set_metric(8, Metric::Revenue, "1"),
            Err(WbrError::WeekOutOfRange(8))
        ));
    }

    #[test]
    fn roll_forward_keeps_window_and_seeds_from_latest() {
        let mut series = RecordSeries::sample();
        let latest = series.latest().cloned().unwrap();
        let second = series.records()[1].clone();

        let next = series.roll_forward().unwrap();

        assert_eq!(series.records().len(), WINDOW);
        assert_eq!(next, latest.period_end + Duration::days(7));
        assert_eq!(series.records()[0], second);
        let appended = series.latest().unwrap();
        assert_eq!(appended.metrics, latest.metrics);
        assert_eq!(appended.channel_volumes, latest.channel_volumes);
        assert!(series.is_chronological());
    }

    #[test]
    fn detects_out_of_order_dates() {
        let mut series = RecordSeries::sample();
        let first = series.records()[0].period_end;
        series.set_period_end(5, first).unwrap();
        assert!(!series.is_chronological());
    }

    #[test]
    fn deserialize_enforces_window() {
        let json = serde_json::to_string(&RecordSeries::sample().records()[..3]).unwrap();
        assert!(serde_json::from_str::<RecordSeries>(&json).is_err());
    }
}
