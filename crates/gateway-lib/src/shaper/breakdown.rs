//! Transaction breakdown segment computation
//!
//! Two passes: build segments while accumulating the grand total of segment
//! time, then compute each segment's share of that total and sort by share.

use super::{extract_field, round2};
use crate::models::{BreakdownSegment, SegmentCategory};
use crate::nrql::BREAKDOWN_SCHEMA;
use serde_json::Value;
use tracing::warn;

/// Classify a segment by its metric-name prefix
pub fn classify_segment(name: &str) -> SegmentCategory {
    if name.starts_with("Datastore/") {
        SegmentCategory::Database
    } else if name.starts_with("External/") {
        SegmentCategory::External
    } else {
        SegmentCategory::Function
    }
}

/// Build breakdown segments from a faceted breakdown response.
///
/// Returns the segments (percentages still zero) and the unrounded grand
/// total of segment time. Facets lacking a name or results list are
/// silently skipped; facets failing schema validation are skipped with a
/// warning. Neither contributes to the grand total.
pub fn build_segments(facets: &[Value], total_txn_count: i64) -> (Vec<BreakdownSegment>, f64) {
    let mut segments = Vec::new();
    let mut grand_total = 0.0;

    for facet in facets {
        let Some(segment_name) = facet.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(results) = facet.get("results").and_then(Value::as_array) else {
            continue;
        };

        let schema = BREAKDOWN_SCHEMA;
        let extracted = (|| {
            let avg_time = extract_field(results, 0, &schema[0])?;
            let call_count = extract_field(results, 1, &schema[1])?;
            let total_time = extract_field(results, 2, &schema[2])?;
            Ok::<_, crate::error::GatewayError>((avg_time, call_count, total_time))
        })();
        let (avg_time, call_count, total_time) = match extracted {
            Ok(values) => values,
            Err(e) => {
                warn!(segment = %segment_name, error = %e, "Skipping breakdown facet");
                continue;
            }
        };

        segments.push(BreakdownSegment {
            category: classify_segment(segment_name),
            segment: segment_name.to_string(),
            avg_time_ms: round2(avg_time),
            avg_calls_txn: round2(call_count / total_txn_count as f64),
            total_time_ms: round2(total_time),
            percentage: 0.0,
        });
        grand_total += total_time;
    }

    (segments, grand_total)
}

/// Fill in percentages and sort by share, descending
pub fn finalize_segments(segments: &mut [BreakdownSegment], grand_total: f64) {
    if grand_total > 0.0 {
        for segment in segments.iter_mut() {
            segment.percentage = round2(segment.total_time_ms / grand_total * 100.0);
        }
    }
    segments.sort_by(|a, b| {
        b.percentage
            .partial_cmp(&a.percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
