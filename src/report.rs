use std::fmt::Write;

use serde::Serialize;

use crate::checks;
use crate::error::Result;
use crate::models::{
    AuditRecord, ChannelBreakdown, CheckResult, Configuration, DerivedSeries, Metric, WeeklyRecord,
};
use crate::series::RecordSeries;

pub const MISSING_DELTA: &str = "—";
pub const CURRENCY_SYMBOL: &str = "$";
pub const RULES_NOTE: &str = "Deltas are week-over-week. A zero prior value yields no delta (—). \
Acquisition cost deltas are inverted so a decrease reads as a positive change.";

pub fn to_report(
    series: &RecordSeries,
    config: &Configuration,
    derived: &DerivedSeries,
    audit: &AuditRecord,
) -> String {
    let results = checks::run_checks(series, config, derived);
    let channel_label = config
        .channel_label
        .map(|label| label.as_str())
        .unwrap_or("(unset)");

    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Business Review");
    match series.latest() {
        Some(latest) => {
            let _ = writeln!(output, "Week ending {}", latest.period_end);
        }
        None => {
            let _ = writeln!(output, "No weeks recorded.");
        }
    }
    if !series.is_chronological() {
        let _ = writeln!(output, "Warning: week-ending dates are not in chronological order.");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Audit");
    let _ = writeln!(output, "- Document: {}", audit.document_id);
    let _ = writeln!(
        output,
        "- Fingerprint: {}",
        audit.fingerprint.as_deref().unwrap_or("(pending)")
    );
    let _ = writeln!(
        output,
        "- Baseline: {}",
        audit.baseline.as_deref().unwrap_or("(none)")
    );
    let _ = writeln!(
        output,
        "- Drift from baseline: {}",
        if audit.drifted() { "yes" } else { "no" }
    );
    let _ = writeln!(output, "- Last run: {}", audit.last_run.to_rfc3339());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Configuration");
    let _ = writeln!(output, "- Channel metric: {channel_label}");
    let _ = writeln!(
        output,
        "- Alert threshold: {}",
        format_share(config.alert_threshold)
    );
    let _ = writeln!(output, "- Logic version: {}", config.logic_version);

    let _ = writeln!(output);
    let _ = writeln!(output, "## KPIs");
    let _ = writeln!(output, "| KPI | Current | WoW | Alert |");
    let _ = writeln!(output, "| --- | ---: | ---: | :---: |");
    for metric in Metric::ALL {
        let Some(metric_series) = derived.metric(metric) else {
            continue;
        };
        let current = metric_series
            .latest_value()
            .map(|value| format_metric(metric, value))
            .unwrap_or_else(|| MISSING_DELTA.to_string());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            metric.label(),
            current,
            format_delta(metric_series.latest_delta()),
            if metric_series.latest_anomaly() { "!" } else { "" }
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Channels ({channel_label})");
    if derived.channels.is_empty() {
        let _ = writeln!(output, "No channel data recorded.");
    } else {
        let _ = writeln!(output, "| Channel | Current | Prior | WoW | Share |");
        let _ = writeln!(output, "| --- | ---: | ---: | ---: | ---: |");
        for row in &derived.channels {
            write_channel_row(&mut output, row);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Self-check");
    let _ = writeln!(
        output,
        "Gate: {}",
        if checks::gate_passed(&results) { "PASS" } else { "FAIL" }
    );
    for result in &results {
        let _ = writeln!(
            output,
            "- [{}] {}: {}",
            if result.passed { "x" } else { " " },
            result.name,
            result.message
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "_{RULES_NOTE}_");

    output
}

fn write_channel_row(output: &mut String, row: &ChannelBreakdown) {
    let _ = writeln!(
        output,
        "| {} | {} | {} | {} | {} |",
        row.channel,
        format_count(row.current),
        format_count(row.prior),
        format_delta(row.wow),
        format_share(row.share)
    );
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    audit: &'a AuditRecord,
    config: &'a Configuration,
    series: &'a [WeeklyRecord],
    derived: &'a DerivedSeries,
    checks: Vec<CheckResult>,
    gate_passed: bool,
    note: &'static str,
}

/// Structured export of the same data the Markdown report shows.
pub fn to_json(
    series: &RecordSeries,
    config: &Configuration,
    derived: &DerivedSeries,
    audit: &AuditRecord,
) -> Result<String> {
    let results = checks::run_checks(series, config, derived);
    let export = JsonExport {
        audit,
        config,
        series: series.records(),
        derived,
        gate_passed: checks::gate_passed(&results),
        checks: results,
        note: RULES_NOTE,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

pub fn format_metric(metric: Metric, value: f64) -> String {
    if metric.is_currency() {
        format_currency(value)
    } else {
        format_count(value)
    }
}

pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return MISSING_DELTA.to_string();
    }
    let grouped = group_thousands(value.abs().round());
    if value.round() < 0.0 {
        format!("-{CURRENCY_SYMBOL}{grouped}")
    } else {
        format!("{CURRENCY_SYMBOL}{grouped}")
    }
}

pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return MISSING_DELTA.to_string();
    }
    let grouped = group_thousands(value.abs().round());
    if value.round() < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn group_thousands(whole: f64) -> String {
    let digits = format!("{whole:.0}");
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Percent truncated toward zero at one decimal place.
fn truncated_percent(fraction: f64) -> f64 {
    let tenths = fraction * 1000.0;
    (tenths + tenths.signum() * 1e-9).trunc() / 10.0
}

/// Signed percent: `+5.3%`, `-2.2%`, `0.0%`.
pub fn format_percent(fraction: f64) -> String {
    let percent = truncated_percent(fraction);
    if percent > 0.0 {
        format!("+{percent:.1}%")
    } else if percent < 0.0 {
        format!("{percent:.1}%")
    } else {
        "0.0%".to_string()
    }
}

/// Unsigned percent for shares and thresholds.
pub fn format_share(fraction: f64) -> String {
    if !fraction.is_finite() {
        return MISSING_DELTA.to_string();
    }
    format!("{:.1}%", truncated_percent(fraction).abs())
}

pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(delta) if delta.is_finite() => format_percent(delta),
        _ => MISSING_DELTA.to_string(),
    }
}
