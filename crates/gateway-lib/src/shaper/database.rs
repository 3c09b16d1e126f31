//! Database-operation facet shaping
//!
//! Facet names are (datastoreType, table, operation) tuples. Operations
//! whose average query time exceeds the fixed threshold are flagged and
//! surfaced as warnings; the final sequence is sorted by average query
//! time, descending, with input order preserved on ties.

use super::{extract_field, round2};
use crate::models::DatabaseOperation;
use crate::nrql::DATABASE_OPERATIONS_SCHEMA;
use crate::observability::GatewayMetrics;
use serde_json::Value;
use tracing::warn;

/// Average query time above which an operation is flagged as slow
pub const QUERY_LATENCY_THRESHOLD_MS: f64 = 8.0;

fn name_component(components: &[Value], index: usize) -> String {
    match components.get(index) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "unknown".to_string(),
    }
}

/// Shape a top-database-operations Insights response
pub fn shape_database_operations(raw: &Value) -> Vec<DatabaseOperation> {
    let Some(facets) = raw.get("facets").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    for facet in facets {
        let name_fields = facet
            .get("name")
            .or_else(|| facet.get("facet"))
            .and_then(Value::as_array);
        let Some(components) = name_fields else {
            warn!(facet = %facet, "Unexpected facet structure");
            continue;
        };
        if components.len() != 3 {
            warn!(facet = %facet, "Unexpected facet structure");
            continue;
        }

        let results = facet
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let schema = DATABASE_OPERATIONS_SCHEMA;
        let extracted = (|| {
            let total_time = extract_field(results, 0, &schema[0])?;
            let avg_time = extract_field(results, 1, &schema[1])?;
            let throughput = extract_field(results, 2, &schema[2])?;
            Ok::<_, crate::error::GatewayError>((total_time, avg_time, throughput))
        })();
        let (total_time, avg_time, throughput) = match extracted {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, facet = %facet, "Error parsing facet");
                continue;
            }
        };

        let datastore_type = name_component(components, 0);
        let table = name_component(components, 1);
        let operation = name_component(components, 2);

        let query_latency = avg_time > QUERY_LATENCY_THRESHOLD_MS;
        if query_latency {
            warn!(
                operation = %operation,
                table = %table,
                avg_query_time_ms = round2(avg_time),
                "Slow query detected"
            );
        }

        operations.push(DatabaseOperation {
            datastore_type,
            table,
            operation,
            total_time_per_minute: round2(total_time),
            avg_query_time_ms: round2(avg_time),
            throughput_ops_per_min: round2(throughput),
            query_latency,
        });
    }

    // Stable sort keeps input order on ties
    operations.sort_by(|a, b| {
        b.avg_query_time_ms
            .partial_cmp(&a.avg_query_time_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let slow = operations.iter().filter(|op| op.query_latency).count();
    if slow > 0 {
        warn!(
            count = slow,
            threshold_ms = QUERY_LATENCY_THRESHOLD_MS,
            "Found database operations with average query time over threshold"
        );
        GatewayMetrics::new().add_slow_queries(slow as u64);
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facet(name: Value, total: f64, avg: f64, throughput: f64) -> Value {
        json!({
            "name": name,
            "results": [
                {"result": total},
                {"average": avg},
                {"result": throughput}
            ]
        })
    }

    #[test]
    fn test_shape_database_operation() {
        let raw = json!({"facets": [facet(json!(["MySQL", "users", "select"]), 1000.0, 10.0, 5.0)]});
        let ops = shape_database_operations(&raw);

        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.datastore_type, "MySQL");
        assert_eq!(op.table, "users");
        assert_eq!(op.operation, "select");
        assert_eq!(op.total_time_per_minute, 1000.0);
        assert_eq!(op.avg_query_time_ms, 10.0);
        assert_eq!(op.throughput_ops_per_min, 5.0);
        assert!(op.query_latency);
    }

    #[test]
    fn test_latency_flag_matches_threshold() {
        let raw = json!({"facets": [
            facet(json!(["MySQL", "a", "select"]), 1.0, 8.0, 1.0),
            facet(json!(["MySQL", "b", "select"]), 1.0, 8.01, 1.0)
        ]});
        let ops = shape_database_operations(&raw);

        let exactly_at = ops.iter().find(|op| op.table == "a").unwrap();
        let just_over = ops.iter().find(|op| op.table == "b").unwrap();
        assert!(!exactly_at.query_latency);
        assert!(just_over.query_latency);
    }

    #[test]
    fn test_wrong_tuple_length_skipped() {
        let raw = json!({"facets": [
            facet(json!(["MySQL", "users"]), 1.0, 1.0, 1.0),
            facet(json!(["MySQL", "users", "select", "extra"]), 1.0, 1.0, 1.0),
            facet(json!(["MySQL", "users", "select"]), 1.0, 1.0, 1.0)
        ]});
        assert_eq!(shape_database_operations(&raw).len(), 1);
    }

    #[test]
    fn test_null_components_default_to_unknown() {
        let raw = json!({"facets": [facet(json!([null, "users", null]), 1.0, 1.0, 1.0)]});
        let ops = shape_database_operations(&raw);
        assert_eq!(ops[0].datastore_type, "unknown");
        assert_eq!(ops[0].table, "users");
        assert_eq!(ops[0].operation, "unknown");
    }

    #[test]
    fn test_sorted_descending_by_avg_query_time() {
        let raw = json!({"facets": [
            facet(json!(["MySQL", "a", "select"]), 1.0, 2.0, 1.0),
            facet(json!(["MySQL", "b", "select"]), 1.0, 9.0, 1.0),
            facet(json!(["MySQL", "c", "select"]), 1.0, 5.0, 1.0)
        ]});
        let times: Vec<f64> = shape_database_operations(&raw)
            .iter()
            .map(|op| op.avg_query_time_ms)
            .collect();
        assert_eq!(times, vec![9.0, 5.0, 2.0]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let raw = json!({"facets": [
            facet(json!(["MySQL", "first", "select"]), 1.0, 5.0, 1.0),
            facet(json!(["MySQL", "second", "select"]), 1.0, 5.0, 1.0)
        ]});
        let tables: Vec<String> = shape_database_operations(&raw)
            .into_iter()
            .map(|op| op.table)
            .collect();
        assert_eq!(tables, vec!["first", "second"]);
    }

    #[test]
    fn test_facet_with_bad_results_skipped() {
        let raw = json!({"facets": [
            {"name": ["MySQL", "users", "select"], "results": [{"wrong": 1.0}]},
            facet(json!(["MySQL", "ok", "select"]), 1.0, 1.0, 1.0)
        ]});
        let ops = shape_database_operations(&raw);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].table, "ok");
    }
}
