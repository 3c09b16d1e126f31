//! Shaping of raw query results into compact structured summaries
//!
//! Every function here is pure: transport failures are handled before a
//! shaper runs, and a malformed facet only ever costs that one facet.

mod breakdown;
mod database;
mod metrics;
mod transactions;

pub use breakdown::{build_segments, classify_segment, finalize_segments};
pub use database::{shape_database_operations, QUERY_LATENCY_THRESHOLD_MS};
pub use metrics::shape_metric_series;
pub use transactions::shape_slow_transactions;

use crate::error::{GatewayError, Result};
use crate::nrql::ResultField;
use serde_json::Value;

/// Round to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Interpret a JSON value as a number, accepting numeric strings
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Extract one declared field from a facet's results array, validating that
/// the entry at the declared position carries the declared aggregate key
pub(crate) fn extract_field(results: &[Value], index: usize, field: &ResultField) -> Result<f64> {
    let entry = results.get(index).ok_or_else(|| {
        GatewayError::Shaping(format!("missing result entry for alias '{}'", field.alias))
    })?;
    let value = entry.get(field.aggregate).ok_or_else(|| {
        GatewayError::Shaping(format!(
            "alias '{}' expected aggregate key '{}', got {entry}",
            field.alias, field.aggregate
        ))
    })?;
    as_number(value).ok_or_else(|| {
        GatewayError::Shaping(format!(
            "alias '{}' carried a non-numeric value: {value}",
            field.alias
        ))
    })
}
