use crate::models::{Channel, ChannelBreakdown, DerivedSeries, Metric, MetricSeries, WeeklyRecord};
use crate::series::RecordSeries;

pub fn compute_derived(series: &RecordSeries, threshold: f64) -> DerivedSeries {
    derive_records(series.records(), threshold)
}

/// Works on any slice so a short or empty history degrades instead of panicking.
pub fn derive_records(records: &[WeeklyRecord], threshold: f64) -> DerivedSeries {
    let metrics = Metric::ALL
        .into_iter()
        .map(|metric| metric_series(records, metric, threshold))
        .collect();

    DerivedSeries {
        metrics,
        channels: channel_breakdown(records),
    }
}

fn metric_series(records: &[WeeklyRecord], metric: Metric, threshold: f64) -> MetricSeries {
    let values: Vec<f64> = records.iter().map(|record| record.metrics.get(metric)).collect();

    let deltas: Vec<Option<f64>> = (0..values.len())
        .map(|week| {
            if week == 0 {
                return None;
            }
            let delta = week_over_week(values[week - 1], values[week])?;
            Some(if metric.is_cost() { -delta } else { delta })
        })
        .collect();

    let anomalies = deltas
        .iter()
        .map(|delta| flag_anomaly(*delta, threshold))
        .collect();

    MetricSeries {
        metric,
        values,
        deltas,
        anomalies,
    }
}

/// Fractional change from `prior` to `current`.
///
/// A zero or non-finite prior has no meaningful ratio and yields `None`.
pub fn week_over_week(prior: f64, current: f64) -> Option<f64> {
    if !prior.is_finite() || prior == 0.0 {
        return None;
    }
    Some((current - prior) / prior)
}

/// Boundary is inclusive: `|delta| == threshold` is anomalous.
pub fn flag_anomaly(delta: Option<f64>, threshold: f64) -> bool {
    match delta {
        Some(delta) => delta.abs() >= threshold,
        None => false,
    }
}

/// Latest week against the one before it.
pub fn channel_breakdown(records: &[WeeklyRecord]) -> Vec<ChannelBreakdown> {
    let Some(current_week) = records.last() else {
        return Vec::new();
    };
    let prior_week = records.len().checked_sub(2).and_then(|idx| records.get(idx));
    let total = current_week.channel_volumes.total();

    Channel::ALL
        .into_iter()
        .map(|channel| {
            let current = current_week.channel_volumes.get(channel);
            let prior = prior_week
                .map(|week| week.channel_volumes.get(channel))
                .unwrap_or(0.0);
            let wow = if prior > 0.0 {
                Some((current - prior) / prior)
            } else {
                None
            };
            let share = if total > 0.0 { current / total } else { 0.0 };
            ChannelBreakdown {
                channel,
                current,
                prior,
                wow,
                share,
            }
        })
        .collect()
}
