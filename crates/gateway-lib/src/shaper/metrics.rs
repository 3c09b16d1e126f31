//! APM metric timeslice shaping
//!
//! Folds timestamped samples into per-metric, per-value-name aggregates:
//! a running mean, the three highest samples with their timestamps, and
//! the most recently processed value.

use super::{as_number, round2};
use crate::models::{MetricEntry, TopValue, ValueStats, NO_DATA};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Maximum number of high-water samples kept per value series
const TOP_VALUES_LIMIT: usize = 3;

struct Accumulator {
    stats: ValueStats,
    sum: f64,
    count: u64,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            stats: ValueStats {
                current_value: Value::Null,
                avg_value: None,
                top_values: Vec::new(),
            },
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: &Value, timestamp: Option<&str>) {
        if let Some(number) = as_number(value) {
            self.stats.top_values.push(TopValue {
                value: round2(number),
                timestamp: timestamp.map(str::to_string),
            });
            self.stats
                .top_values
                .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
            self.stats.top_values.truncate(TOP_VALUES_LIMIT);

            self.sum += number;
            self.count += 1;
            self.stats.current_value = json!(round2(number));
        } else {
            // Non-numeric samples bypass aggregation but still become current
            self.stats.current_value = value.clone();
        }
    }

    fn finish(mut self) -> ValueStats {
        if self.count > 0 {
            self.stats.avg_value = Some(round2(self.sum / self.count as f64));
        }
        self.stats
    }
}

/// Shape a `metrics/data.json` response into per-metric value summaries.
///
/// When the response carries no metric data at all, every requested metric
/// name maps to the no-data sentinel instead.
pub fn shape_metric_series(raw: &Value, requested_names: &[&str]) -> BTreeMap<String, MetricEntry> {
    let metrics = raw
        .pointer("/metric_data/metrics")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty());

    let Some(metrics) = metrics else {
        return requested_names
            .iter()
            .map(|name| (name.to_string(), MetricEntry::NoData(NO_DATA)))
            .collect();
    };

    let mut shaped: BTreeMap<String, BTreeMap<String, Accumulator>> = BTreeMap::new();

    for metric in metrics {
        let Some(metric_name) = metric.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(timeslices) = metric.get("timeslices").and_then(Value::as_array) else {
            continue;
        };
        if timeslices.is_empty() {
            continue;
        }
        let series = shaped.entry(metric_name.to_string()).or_default();

        for timeslice in timeslices {
            let timestamp = timeslice.get("from").and_then(Value::as_str);
            let Some(values) = timeslice.get("values").and_then(Value::as_object) else {
                continue;
            };
            for (value_name, value) in values {
                series
                    .entry(value_name.clone())
                    .or_insert_with(Accumulator::new)
                    .observe(value, timestamp);
            }
        }
    }

    shaped
        .into_iter()
        .map(|(name, series)| {
            let stats = series.into_iter().map(|(k, acc)| (k, acc.finish())).collect();
            (name, MetricEntry::Series(stats))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_with_timeslices(samples: &[(&str, Value)]) -> Value {
        let timeslices: Vec<Value> = samples
            .iter()
            .map(|(ts, v)| json!({"from": ts, "values": {"call_count": v}}))
            .collect();
        json!({
            "metric_data": {
                "metrics": [{"name": "HttpDispatcher", "timeslices": timeslices}]
            }
        })
    }

    fn series_stats(shaped: &BTreeMap<String, MetricEntry>) -> &ValueStats {
        match shaped.get("HttpDispatcher").unwrap() {
            MetricEntry::Series(series) => series.get("call_count").unwrap(),
            MetricEntry::NoData(_) => panic!("expected a series"),
        }
    }

    #[test]
    fn test_no_data_sentinel_for_every_requested_name() {
        let raw = json!({"metric_data": {"metrics": []}});
        let shaped = shape_metric_series(&raw, &["HttpDispatcher", "Apdex"]);

        assert_eq!(shaped.len(), 2);
        assert_eq!(shaped["HttpDispatcher"], MetricEntry::NoData(NO_DATA));
        assert_eq!(shaped["Apdex"], MetricEntry::NoData(NO_DATA));
    }

    #[test]
    fn test_top_values_bounded_and_descending() {
        let raw = raw_with_timeslices(&[
            ("t1", json!(10.0)),
            ("t2", json!(50.0)),
            ("t3", json!(30.0)),
            ("t4", json!(40.0)),
            ("t5", json!(20.0)),
        ]);
        let shaped = shape_metric_series(&raw, &["HttpDispatcher"]);
        let stats = series_stats(&shaped);

        assert_eq!(stats.top_values.len(), 3);
        assert_eq!(stats.top_values[0].value, 50.0);
        assert_eq!(stats.top_values[1].value, 40.0);
        assert_eq!(stats.top_values[2].value, 30.0);
        assert_eq!(stats.top_values[0].timestamp.as_deref(), Some("t2"));
    }

    #[test]
    fn test_avg_and_current_value() {
        let raw = raw_with_timeslices(&[("t1", json!(10.0)), ("t2", json!(20.0))]);
        let shaped = shape_metric_series(&raw, &["HttpDispatcher"]);
        let stats = series_stats(&shaped);

        assert_eq!(stats.avg_value, Some(15.0));
        assert_eq!(stats.current_value, json!(20.0));
    }

    #[test]
    fn test_non_numeric_value_bypasses_aggregation() {
        let raw = raw_with_timeslices(&[("t1", json!(10.0)), ("t2", json!({"weird": true}))]);
        let shaped = shape_metric_series(&raw, &["HttpDispatcher"]);
        let stats = series_stats(&shaped);

        // The object becomes current_value raw but contributes nothing else
        assert_eq!(stats.current_value, json!({"weird": true}));
        assert_eq!(stats.avg_value, Some(10.0));
        assert_eq!(stats.top_values.len(), 1);
    }

    #[test]
    fn test_numeric_string_aggregates() {
        let raw = raw_with_timeslices(&[("t1", json!("12.5"))]);
        let shaped = shape_metric_series(&raw, &["HttpDispatcher"]);
        let stats = series_stats(&shaped);

        assert_eq!(stats.avg_value, Some(12.5));
        assert_eq!(stats.current_value, json!(12.5));
    }

    #[test]
    fn test_metric_without_timeslices_is_skipped() {
        let raw = json!({
            "metric_data": {
                "metrics": [{"name": "Apdex", "timeslices": []}]
            }
        });
        let shaped = shape_metric_series(&raw, &["Apdex"]);
        assert!(shaped.is_empty());
    }
}
