//! Slow-transaction facet shaping
//!
//! The upstream query orders facets by total duration; no re-sort happens
//! here. Field extraction is keyed by the query's declared schema, and a
//! facet that fails schema validation is dropped with a warning while the
//! rest of the batch survives.

use super::{extract_field, round2};
use crate::error::Result;
use crate::models::TransactionSummary;
use crate::nrql::SLOW_TRANSACTIONS_SCHEMA;
use serde_json::Value;
use tracing::warn;

/// Format a duration as a rounded integer-millisecond string
fn format_ms(value: f64) -> String {
    format!("{} ms", value.round() as i64)
}

fn shape_facet(facet: &Value) -> Result<TransactionSummary> {
    let name = facet
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::error::GatewayError::Shaping("facet has no name".into()))?;
    let results = facet
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| crate::error::GatewayError::Shaping("facet has no results".into()))?;

    let schema = SLOW_TRANSACTIONS_SCHEMA;
    let total = extract_field(results, 0, &schema[0])?;
    let avg_ms = extract_field(results, 1, &schema[1])?;
    let min_ms = extract_field(results, 2, &schema[2])?;
    let max_ms = extract_field(results, 3, &schema[3])?;
    let call_count = extract_field(results, 4, &schema[4])?;
    let error_rate = extract_field(results, 5, &schema[5])?;
    let throughput = extract_field(results, 6, &schema[6])?;

    Ok(TransactionSummary {
        name: name.to_string(),
        total_duration: round2(total),
        avg_duration: format_ms(avg_ms),
        min_duration: format_ms(min_ms),
        max_duration: format_ms(max_ms),
        call_count: call_count as i64,
        error_rate: round2(error_rate),
        throughput: round2(throughput),
    })
}

/// Shape a slow-transactions Insights response into transaction summaries
pub fn shape_slow_transactions(raw: &Value) -> Vec<TransactionSummary> {
    let Some(facets) = raw.get("facets").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut transactions = Vec::new();
    for facet in facets {
        match shape_facet(facet) {
            Ok(summary) => transactions.push(summary),
            Err(e) => warn!(error = %e, "Skipping facet"),
        }
    }
    transactions
}
