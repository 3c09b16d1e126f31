//! Core data models for the monitoring gateway

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An application known to New Relic, as listed by the applications index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub id: i64,
}

/// Aggregate statistics for one value series of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueStats {
    /// Most recently processed sample, raw when non-numeric
    pub current_value: Value,
    /// Mean over the numeric samples, absent when none were numeric
    pub avg_value: Option<f64>,
    /// Up to three highest-valued samples, descending
    pub top_values: Vec<TopValue>,
}

/// A high-water sample retained in a value series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopValue {
    pub value: f64,
    pub timestamp: Option<String>,
}

/// Shaped output for one requested metric name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricEntry {
    Series(BTreeMap<String, ValueStats>),
    /// Sentinel emitted when the query returned no metric data at all
    NoData(&'static str),
}

/// Sentinel value for [`MetricEntry::NoData`]
pub const NO_DATA: &str = "N/A (No data)";

/// One slow transaction as reported by the faceted Transaction query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub name: String,
    /// Sum of durations over the window, in the query's original units
    pub total_duration: f64,
    /// Rounded integer milliseconds, e.g. "512 ms"
    pub avg_duration: String,
    pub min_duration: String,
    pub max_duration: String,
    pub call_count: i64,
    pub error_rate: f64,
    pub throughput: f64,
}

/// One database operation as reported by the faceted Metric query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOperation {
    #[serde(rename = "datastoreType")]
    pub datastore_type: String,
    pub table: String,
    pub operation: String,
    pub total_time_per_minute: f64,
    pub avg_query_time_ms: f64,
    pub throughput_ops_per_min: f64,
    /// True when avg_query_time_ms exceeds the fixed 8 ms threshold
    pub query_latency: bool,
}

/// Category of a transaction breakdown segment, derived from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentCategory {
    Database,
    External,
    Function,
}

/// Per-segment timing share of one transaction's execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownSegment {
    pub category: SegmentCategory,
    pub segment: String,
    pub avg_time_ms: f64,
    pub avg_calls_txn: f64,
    pub total_time_ms: f64,
    /// Share of the grand total, 0 when the grand total is 0
    pub percentage: f64,
}

/// Timing decomposition of one transaction across its segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionBreakdown {
    pub transaction_name: Option<String>,
    pub total_time_ms: f64,
    pub total_transaction_count: i64,
    pub segments: Vec<BreakdownSegment>,
}

/// Transaction fields carried into the combined slow-transaction report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub name: String,
    pub avg_duration: String,
    pub min_duration: String,
    pub max_duration: String,
    pub call_count: i64,
    pub error_rate: f64,
    pub throughput: f64,
}

/// One slow transaction joined with its breakdown segments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowTransactionDetail {
    pub transaction: TransactionInfo,
    pub breakdown: Vec<BreakdownSegment>,
    pub total_duration_ms: f64,
}

/// Combined result of the slow-transactions fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowTransactionsReport {
    pub transactions: Vec<SlowTransactionDetail>,
    pub count: usize,
}

/// Result of the top-database-operations tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOperationsReport {
    pub database_operations: Vec<DatabaseOperation>,
    pub count: usize,
}

/// Response time and throughput of a single transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction_name: Option<String>,
    pub response_time: f64,
    pub throughput_per_minute: f64,
}

/// The three formatted log-query results of the db-performance tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbQueryPerformance {
    pub query_time_result: String,
    pub throughput_result: String,
    pub db_ops_caller_result: String,
}
