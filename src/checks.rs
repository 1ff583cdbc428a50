use crate::models::{Channel, CheckResult, Configuration, DerivedSeries, Metric};
use crate::series::RecordSeries;

pub const METRIC_FINITENESS: &str = "Metric finiteness";
pub const CHANNEL_LABEL: &str = "Channel label";
pub const CHANNEL_DATA: &str = "Channel data";
pub const DELTA_SOUNDNESS: &str = "Delta soundness";

/// Every check runs on every call; none short-circuits the others.
pub fn run_checks(
    series: &RecordSeries,
    config: &Configuration,
    derived: &DerivedSeries,
) -> Vec<CheckResult> {
    vec![
        metric_finiteness(series),
        channel_label(config),
        channel_data(series),
        delta_soundness(derived),
    ]
}

pub fn gate_passed(results: &[CheckResult]) -> bool {
    results.iter().all(|result| result.passed)
}

fn check(name: &str, passed: bool, pass_message: &str, fail_message: String) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        passed,
        message: if passed {
            pass_message.to_string()
        } else {
            fail_message
        },
    }
}

fn metric_finiteness(series: &RecordSeries) -> CheckResult {
    let passed = series.records().iter().all(|record| {
        Metric::ALL
            .iter()
            .all(|metric| record.metrics.get(*metric).is_finite())
    });
    check(
        METRIC_FINITENESS,
        passed,
        "All metric values are finite numbers.",
        "One or more metric values are not finite numbers.".to_string(),
    )
}

fn channel_label(config: &Configuration) -> CheckResult {
    let passed = config
        .channel_label
        .is_some_and(|label| !label.as_str().is_empty());
    check(
        CHANNEL_LABEL,
        passed,
        "Channel metric label is set.",
        "Channel metric label is missing.".to_string(),
    )
}

fn channel_data(series: &RecordSeries) -> CheckResult {
    let failing: Vec<String> = series
        .records()
        .iter()
        .filter(|record| {
            let volumes = &record.channel_volumes;
            let finite = Channel::ALL
                .iter()
                .all(|channel| volumes.get(*channel).is_finite());
            !(finite && volumes.total() > 0.0)
        })
        .map(|record| record.period_end.to_string())
        .collect();
    check(
        CHANNEL_DATA,
        failing.is_empty(),
        "Every week has finite channel volumes with a positive total.",
        format!(
            "Channel volumes are invalid or sum to zero for week(s) ending {}.",
            failing.join(", ")
        ),
    )
}

fn delta_soundness(derived: &DerivedSeries) -> CheckResult {
    let passed = derived.metrics.iter().all(|series| {
        series
            .deltas
            .iter()
            .skip(1)
            .all(|delta| delta.map_or(true, f64::is_finite))
    });
    check(
        DELTA_SOUNDNESS,
        passed,
        "Every week-over-week delta is finite or undefined.",
        "A week-over-week delta is NaN or infinite.".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::compute_derived;

    fn results_for(series: &RecordSeries, config: &Configuration) -> Vec<CheckResult> {
        let derived = compute_derived(series, config.alert_threshold);
        run_checks(series, config, &derived)
    }

    fn passed(results: &[CheckResult], name: &str) -> bool {
        results
            .iter()
            .find(|result| result.name == name)
            .map(|result| result.passed)
            .unwrap()
    }

    #[test]
    fn sample_document_passes_gate() {
        let results = results_for(&RecordSeries::sample(), &Configuration::default());
        assert_eq!(results.len(), 4);
        assert!(gate_passed(&results));
    }

    #[test]
    fn zero_channel_week_fails_only_channel_data() {
        let mut series = RecordSeries::sample();
        for channel in Channel::ALL {
            series.set_channel(3, channel, "0").unwrap();
        }
        let results = results_for(&series, &Configuration::default());

        assert!(!passed(&results, CHANNEL_DATA));
        assert!(passed(&results, METRIC_FINITENESS));
        assert!(passed(&results, CHANNEL_LABEL));
        assert!(passed(&results, DELTA_SOUNDNESS));
        assert!(!gate_passed(&results));

        let message = &results[2].message;
        assert!(message.contains(&series.records()[3].period_end.to_string()));
    }

    #[test]
    fn non_finite_metric_fails_finiteness_and_deltas() {
        let mut records = RecordSeries::sample().records().to_vec();
        records[4].metrics.revenue = f64::NAN;
        let series = RecordSeries::new(records).unwrap();
        let results = results_for(&series, &Configuration::default());

        assert!(!passed(&results, METRIC_FINITENESS));
        assert!(!passed(&results, DELTA_SOUNDNESS));
        assert!(passed(&results, CHANNEL_DATA));
    }

    #[test]
    fn missing_label_fails_label_check() {
        let config = Configuration {
            channel_label: None,
            ..Configuration::default()
        };
        let results = results_for(&RecordSeries::sample(), &config);
        assert!(!passed(&results, CHANNEL_LABEL));
        assert_eq!(results.iter().filter(|result| !result.passed).count(), 1);
    }

    #[test]
    fn zero_prior_deltas_are_sound() {
        let mut series = RecordSeries::sample();
        series.set_metric(2, Metric::ActiveCount, "0").unwrap();
        let results = results_for(&series, &Configuration::default());
        assert!(passed(&results, DELTA_SOUNDNESS));
    }
}
