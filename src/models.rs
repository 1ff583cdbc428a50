use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WbrError;

pub const MIN_THRESHOLD: f64 = 0.05;
pub const MAX_THRESHOLD: f64 = 0.30;
pub const DEFAULT_THRESHOLD: f64 = 0.10;
pub const DEFAULT_LOGIC_VERSION: &str = "wbr-logic-1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Revenue,
    DealCount,
    ActiveCount,
    AcquisitionCost,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Revenue,
        Metric::DealCount,
        Metric::ActiveCount,
        Metric::AcquisitionCost,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::Revenue => "revenue",
            Metric::DealCount => "dealCount",
            Metric::ActiveCount => "activeCount",
            Metric::AcquisitionCost => "acquisitionCost",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Revenue => "Revenue",
            Metric::DealCount => "Deals",
            Metric::ActiveCount => "Active pipeline",
            Metric::AcquisitionCost => "Acquisition cost",
        }
    }

    /// Cost metrics read a decrease as favorable, so their deltas are inverted.
    pub fn is_cost(self) -> bool {
        matches!(self, Metric::AcquisitionCost)
    }

    pub fn is_currency(self) -> bool {
        matches!(self, Metric::Revenue | Metric::AcquisitionCost)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Metric {
    type Err = WbrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "revenue" => Ok(Metric::Revenue),
            "dealcount" | "deals" => Ok(Metric::DealCount),
            "activecount" | "active" | "pipeline" => Ok(Metric::ActiveCount),
            "acquisitioncost" | "cac" => Ok(Metric::AcquisitionCost),
            _ => Err(WbrError::UnknownMetric(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Paid,
    Organic,
    Email,
    Referral,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Paid,
        Channel::Organic,
        Channel::Email,
        Channel::Referral,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Channel::Paid => "paid",
            Channel::Organic => "organic",
            Channel::Email => "email",
            Channel::Referral => "referral",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = WbrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|channel| channel.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WbrError::UnknownChannel(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub revenue: f64,
    pub deal_count: f64,
    pub active_count: f64,
    pub acquisition_cost: f64,
}

impl Metrics {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Revenue => self.revenue,
            Metric::DealCount => self.deal_count,
            Metric::ActiveCount => self.active_count,
            Metric::AcquisitionCost => self.acquisition_cost,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Revenue => self.revenue = value,
            Metric::DealCount => self.deal_count = value,
            Metric::ActiveCount => self.active_count = value,
            Metric::AcquisitionCost => self.acquisition_cost = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelVolumes {
    pub paid: f64,
    pub organic: f64,
    pub email: f64,
    pub referral: f64,
}

impl ChannelVolumes {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Paid => self.paid,
            Channel::Organic => self.organic,
            Channel::Email => self.email,
            Channel::Referral => self.referral,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        match channel {
            Channel::Paid => self.paid = value,
            Channel::Organic => self.organic = value,
            Channel::Email => self.email = value,
            Channel::Referral => self.referral = value,
        }
    }

    pub fn total(&self) -> f64 {
        Channel::ALL.iter().map(|channel| self.get(*channel)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyRecord {
    pub period_end: NaiveDate,
    pub metrics: Metrics,
    pub channel_volumes: ChannelVolumes,
}

/// Display-only label for what the channel volumes count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLabel {
    Revenue,
    Orders,
    Sessions,
}

impl ChannelLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelLabel::Revenue => "revenue",
            ChannelLabel::Orders => "orders",
            ChannelLabel::Sessions => "sessions",
        }
    }
}

impl fmt::Display for ChannelLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelLabel {
    type Err = WbrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revenue" => Ok(ChannelLabel::Revenue),
            "orders" => Ok(ChannelLabel::Orders),
            "sessions" => Ok(ChannelLabel::Sessions),
            _ => Err(WbrError::UnknownChannelLabel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// `None` when a stored document never picked a label; the self-check reports it.
    #[serde(default)]
    pub channel_label: Option<ChannelLabel>,
    pub alert_threshold: f64,
    pub logic_version: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            channel_label: Some(ChannelLabel::Orders),
            alert_threshold: DEFAULT_THRESHOLD,
            logic_version: DEFAULT_LOGIC_VERSION.to_string(),
        }
    }
}

impl Configuration {
    /// Replace the alert threshold, clamped into `[0.05, 0.30]`.
    ///
    /// A non-finite value falls back to the default threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = clamp_threshold(threshold);
        self
    }
}

pub fn clamp_threshold(threshold: f64) -> f64 {
    if !threshold.is_finite() {
        tracing::warn!(threshold, "non-finite alert threshold, using default");
        return DEFAULT_THRESHOLD;
    }
    let clamped = threshold.clamp(MIN_THRESHOLD, MAX_THRESHOLD);
    if clamped != threshold {
        tracing::warn!(requested = threshold, applied = clamped, "alert threshold clamped");
    }
    clamped
}

/// Deltas and anomaly flags for one metric, one slot per week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub metric: Metric,
    pub values: Vec<f64>,
    pub deltas: Vec<Option<f64>>,
    pub anomalies: Vec<bool>,
}

impl MetricSeries {
    pub fn latest_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn latest_delta(&self) -> Option<f64> {
        self.deltas.last().copied().flatten()
    }

    pub fn latest_anomaly(&self) -> bool {
        self.anomalies.last().copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBreakdown {
    pub channel: Channel,
    pub current: f64,
    pub prior: f64,
    pub wow: Option<f64>,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSeries {
    pub metrics: Vec<MetricSeries>,
    pub channels: Vec<ChannelBreakdown>,
}

impl DerivedSeries {
    pub fn metric(&self, metric: Metric) -> Option<&MetricSeries> {
        self.metrics.iter().find(|series| series.metric == metric)
    }

    pub fn anomaly_count(&self) -> usize {
        self.metrics
            .iter()
            .map(|series| series.anomalies.iter().filter(|flag| **flag).count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub document_id: String,
    pub fingerprint: Option<String>,
    pub baseline: Option<String>,
    pub last_run: DateTime<Utc>,
}

impl AuditRecord {
    /// The current inputs no longer match the first fingerprint captured.
    pub fn drifted(&self) -> bool {
        match (&self.fingerprint, &self.baseline) {
            (Some(current), Some(baseline)) => current != baseline,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
}
