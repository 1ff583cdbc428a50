use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::checks;
use crate::derive::compute_derived;
use crate::error::{Result, WbrError};
use crate::fingerprint::{self, Snapshot};
use crate::models::{
    clamp_threshold, AuditRecord, Channel, ChannelLabel, CheckResult, Configuration, DerivedSeries,
    Metric,
};
use crate::series::RecordSeries;
use crate::store::KeyValueStore;

pub const DOCUMENT_ID_KEY: &str = "wbr.document_id";
pub const DOCUMENT_KEY: &str = "wbr.document";

pub fn baseline_key(document_id: &str) -> String {
    format!("wbr.baseline.{document_id}")
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDocument {
    series: RecordSeries,
    config: Configuration,
}

/// Owns the editable state and keeps derived outputs in step with it.
///
/// Every mutation recomputes derived series and checks, refreshes the
/// fingerprint, then persists the document.
pub struct Session<S: KeyValueStore> {
    store: S,
    series: RecordSeries,
    config: Configuration,
    derived: DerivedSeries,
    checks: Vec<CheckResult>,
    audit: AuditRecord,
}

impl<S: KeyValueStore> Session<S> {
    /// Restore the document from `store`, or seed it with the sample series and `seed_config`.
    pub fn open(mut store: S, seed_config: Configuration) -> Result<Self> {
        let document_id = match store.load(DOCUMENT_ID_KEY)? {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                let id = Uuid::new_v4().to_string();
                store.save(DOCUMENT_ID_KEY, &id)?;
                info!(document_id = %id, "created document identity");
                id
            }
        };

        let (series, config, fresh) = match store.load(DOCUMENT_KEY)? {
            Some(raw) => {
                let mut stored: StoredDocument = serde_json::from_str(&raw)?;
                stored.config.alert_threshold = clamp_threshold(stored.config.alert_threshold);
                (stored.series, stored.config, false)
            }
            None => (RecordSeries::sample(), seed_config, true),
        };

        let baseline = store.load(&baseline_key(&document_id))?;

        let mut session = Self {
            store,
            series,
            config,
            derived: DerivedSeries {
                metrics: Vec::new(),
                channels: Vec::new(),
            },
            checks: Vec::new(),
            audit: AuditRecord {
                document_id,
                fingerprint: None,
                baseline,
                last_run: Utc::now(),
            },
        };
        session.recompute();
        if fresh {
            session.persist()?;
        }
        Ok(session)
    }

    pub fn series(&self) -> &RecordSeries {
        &self.series
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn derived(&self) -> &DerivedSeries {
        &self.derived
    }

    pub fn checks(&self) -> &[CheckResult] {
        &self.checks
    }

    pub fn gate_passed(&self) -> bool {
        checks::gate_passed(&self.checks)
    }

    pub fn audit(&self) -> &AuditRecord {
        &self.audit
    }

    #[cfg(test)]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Full synchronous recomputation of derived series and self-checks.
    pub fn recompute(&mut self) {
        self.derived = compute_derived(&self.series, self.config.alert_threshold);
        self.checks = checks::run_checks(&self.series, &self.config, &self.derived);
        self.audit.last_run = Utc::now();

        if !self.series.is_chronological() {
            warn!("week-ending dates are not strictly increasing");
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|result| !result.passed)
            .map(|result| result.name.as_str())
            .collect();
        debug!(
            anomalies = self.derived.anomaly_count(),
            failed = ?failed,
            "recomputed derived series"
        );
    }

    /// Hash the current snapshot off the calling thread.
    ///
    /// On failure the previous fingerprint stays in place. A refresh that finishes
    /// after a newer one overwrites it.
    pub async fn refresh_fingerprint(&mut self) {
        let series = self.series.clone();
        let config = self.config.clone();
        let outcome = match tokio::task::spawn_blocking(move || {
            fingerprint::fingerprint(&Snapshot::new(&series, &config))
        })
        .await
        {
            Ok(result) => result,
            Err(err) => Err(WbrError::Fingerprint(err.to_string())),
        };
        self.apply_fingerprint(outcome);
    }

    fn apply_fingerprint(&mut self, outcome: Result<String>) {
        let hash = match outcome {
            Ok(hash) => hash,
            Err(err) => {
                warn!(error = %err, "fingerprint unavailable, keeping previous value");
                return;
            }
        };

        if self.audit.baseline.is_none() {
            let key = baseline_key(&self.audit.document_id);
            match self.store.save(&key, &hash) {
                Ok(()) => {
                    info!(document_id = %self.audit.document_id, baseline = %hash, "captured baseline");
                    self.audit.baseline = Some(hash.clone());
                }
                Err(err) => warn!(error = %err, "could not persist baseline"),
            }
        }
        self.audit.fingerprint = Some(hash);
    }

    fn persist(&mut self) -> Result<()> {
        let stored = StoredDocument {
            series: self.series.clone(),
            config: self.config.clone(),
        };
        let raw = serde_json::to_string(&stored)?;
        self.store.save(DOCUMENT_KEY, &raw)
    }

    /// Derived state follows the in-memory inputs even when saving fails.
    async fn commit(&mut self) -> Result<()> {
        self.recompute();
        self.refresh_fingerprint().await;
        self.persist()
    }

    pub async fn set_metric(&mut self, week: usize, metric: Metric, raw: &str) -> Result<f64> {
        let value = self.series.set_metric(week, metric, raw)?;
        self.commit().await?;
        Ok(value)
    }

    pub async fn set_channel(&mut self, week: usize, channel: Channel, raw: &str) -> Result<f64> {
        let value = self.series.set_channel(week, channel, raw)?;
        self.commit().await?;
        Ok(value)
    }

    pub async fn set_period_end(&mut self, week: usize, period_end: NaiveDate) -> Result<()> {
        self.series.set_period_end(week, period_end)?;
        self.commit().await
    }

    pub async fn roll_forward(&mut self) -> Result<Option<NaiveDate>> {
        let next = self.series.roll_forward();
        if let Some(period_end) = next {
            info!(%period_end, "rolled series forward");
        }
        self.commit().await?;
        Ok(next)
    }

    pub async fn set_channel_label(&mut self, label: ChannelLabel) -> Result<()> {
        self.config.channel_label = Some(label);
        self.commit().await
    }

    pub async fn set_threshold(&mut self, threshold: f64) -> Result<f64> {
        self.config.alert_threshold = clamp_threshold(threshold);
        self.commit().await?;
        Ok(self.config.alert_threshold)
    }

    pub async fn set_logic_version(&mut self, version: &str) -> Result<()> {
        self.config.logic_version = version.trim().to_string();
        self.commit().await
    }

    pub async fn replace_series(&mut self, series: RecordSeries) -> Result<()> {
        self.series = series;
        self.commit().await
    }
}
