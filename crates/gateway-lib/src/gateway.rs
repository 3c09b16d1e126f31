//! Tool-surface orchestration
//!
//! Composes the resolver, the New Relic access layer and the shapers into
//! the operations exposed over MCP. Every operation resolves the
//! application name first (a cache hit costs nothing), issues one or more
//! fixed-template queries, and hands the raw result to the matching shaper.

use crate::client::NewRelicClient;
use crate::error::{GatewayError, Result};
use crate::health::{components, HealthRegistry};
use crate::models::{
    DatabaseOperationsReport, DbQueryPerformance, MetricEntry, SlowTransactionDetail,
    SlowTransactionsReport, TransactionBreakdown, TransactionDetails, TransactionInfo,
};
use crate::nrql;
use crate::observability::GatewayMetrics;
use crate::resolver::AppResolver;
use crate::shaper;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Metric names requested by the APM metrics operation
pub const DEFAULT_METRIC_NAMES: &[&str] = &["HttpDispatcher"];

/// Value names requested by the APM metrics operation
pub const DEFAULT_METRIC_VALUES: &[&str] =
    &["average_response_time", "calls_per_minute", "call_count"];

const DATABASE_OPERATIONS_LIMIT: u32 = 5;

/// The monitoring-data gateway behind the MCP tool surface
pub struct Gateway {
    client: NewRelicClient,
    resolver: AppResolver,
    metrics: GatewayMetrics,
    health: HealthRegistry,
}

impl Gateway {
    pub fn new(
        client: NewRelicClient,
        resolver: AppResolver,
        metrics: GatewayMetrics,
        health: HealthRegistry,
    ) -> Self {
        Self {
            client,
            resolver,
            metrics,
            health,
        }
    }

    /// Load the application roster and register health components.
    ///
    /// Must complete before the tool surface accepts calls.
    pub async fn initialize(&self) -> Result<usize> {
        self.health.register(components::ROSTER).await;
        self.health.register(components::REST_API).await;
        self.health.register(components::INSIGHTS_API).await;
        self.health.register(components::GRAPHQL_API).await;
        self.health.register(components::RESOLVER).await;

        let count = self.resolver.initialize(&self.client).await?;
        self.health.set_healthy(components::ROSTER).await;
        Ok(count)
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    async fn note_api<T>(&self, component: &str, result: &Result<T>) {
        match result {
            Ok(_) => self.health.set_healthy(component).await,
            Err(e) => {
                self.metrics.inc_api_error();
                self.health.set_degraded(component, e.to_string()).await;
            }
        }
    }

    async fn resolve(&self, application_name: &str) -> Result<String> {
        let result = self.resolver.resolve(application_name).await;
        match &result {
            Ok(_) => self.health.set_healthy(components::RESOLVER).await,
            Err(e) => {
                self.health
                    .set_degraded(components::RESOLVER, e.to_string())
                    .await
            }
        }
        result
    }

    async fn insights(&self, nrql: &str) -> Result<Value> {
        let result = self.client.insights_query(nrql).await;
        self.note_api(components::INSIGHTS_API, &result).await;
        result
    }

    /// Overall APM metrics for an application over a recent window
    pub async fn apm_metrics(
        &self,
        application_name: &str,
        time_range_minutes: u32,
    ) -> Result<BTreeMap<String, MetricEntry>> {
        let app_id = self.resolve(application_name).await?;

        let end = Utc::now();
        let start = end - Duration::minutes(time_range_minutes as i64);
        let time_format = "%Y-%m-%dT%H:%M:%S%.6fZ";

        let mut params: Vec<(&str, String)> = Vec::new();
        for name in DEFAULT_METRIC_NAMES {
            params.push(("names[]", name.to_string()));
        }
        for value in DEFAULT_METRIC_VALUES {
            params.push(("values[]", value.to_string()));
        }
        params.push(("summarize", "false".to_string()));
        params.push(("from", start.format(time_format).to_string()));
        params.push(("to", end.format(time_format).to_string()));

        let path = format!("applications/{app_id}/metrics/data.json");
        let result = self.client.rest_get(&path, &params).await;
        self.note_api(components::REST_API, &result).await;

        Ok(shaper::shape_metric_series(&result?, DEFAULT_METRIC_NAMES))
    }

    /// Names of the APM metrics available for an application
    pub async fn available_apm_metrics(&self, application_name: &str) -> Result<Vec<String>> {
        let app_id = self.resolve(application_name).await?;
        let path = format!("applications/{app_id}/metrics.json");
        let result = self.client.rest_get(&path, &[]).await;
        self.note_api(components::REST_API, &result).await;

        let body = result?;
        let names = body
            .get("metrics")
            .and_then(Value::as_array)
            .map(|metrics| {
                metrics
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// Top slow transactions joined with their breakdown segments.
    ///
    /// The app id resolves once; each transaction then re-invokes the
    /// breakdown computation. A breakdown failure drops that transaction
    /// and the call still succeeds with the survivors.
    pub async fn slow_transaction_details(
        &self,
        application_name: &str,
        time_range_minutes: u32,
    ) -> Result<SlowTransactionsReport> {
        let app_id = self.resolve(application_name).await?;

        let raw = self
            .insights(&nrql::slow_transactions(&app_id, time_range_minutes))
            .await?;
        let transactions = shaper::shape_slow_transactions(&raw);
        info!(count = transactions.len(), "Found transactions");

        let mut combined = Vec::new();
        for txn in transactions {
            let breakdown = match self
                .breakdown_for_app(&app_id, &txn.name, time_range_minutes)
                .await
            {
                Ok(breakdown) => breakdown,
                Err(e) => {
                    warn!(transaction = %txn.name, error = %e, "Failed to get breakdown for transaction");
                    continue;
                }
            };

            combined.push(SlowTransactionDetail {
                transaction: TransactionInfo {
                    name: txn.name,
                    avg_duration: txn.avg_duration,
                    min_duration: txn.min_duration,
                    max_duration: txn.max_duration,
                    call_count: txn.call_count,
                    error_rate: txn.error_rate,
                    throughput: txn.throughput,
                },
                breakdown: breakdown.segments,
                total_duration_ms: breakdown.total_time_ms,
            });
        }

        let count = combined.len();
        Ok(SlowTransactionsReport {
            transactions: combined,
            count,
        })
    }

    /// Top database operations, sorted by average query time
    pub async fn top_database_operations(
        &self,
        application_name: &str,
        time_range_minutes: u32,
    ) -> Result<DatabaseOperationsReport> {
        let app_id = self.resolve(application_name).await?;

        let raw = self
            .insights(&nrql::top_database_operations(
                &app_id,
                time_range_minutes,
                DATABASE_OPERATIONS_LIMIT,
            ))
            .await?;

        let operations = shaper::shape_database_operations(&raw);
        let count = operations.len();
        Ok(DatabaseOperationsReport {
            database_operations: operations,
            count,
        })
    }

    /// Breakdown segments of one transaction (name or URI fragment)
    pub async fn transaction_breakdown(
        &self,
        application_name: &str,
        transaction_name: &str,
        time_range_minutes: u32,
    ) -> Result<TransactionBreakdown> {
        let app_id = self.resolve(application_name).await?;
        self.breakdown_for_app(&app_id, transaction_name, time_range_minutes)
            .await
    }

    /// Two-query cross-reference: total transaction count, then per-segment
    /// timing faceted by segment name.
    ///
    /// A zero total count is floored to 1 so per-segment division stays
    /// defined; the floored value is what the result reports.
    async fn breakdown_for_app(
        &self,
        app_id: &str,
        transaction_name: &str,
        time_range_minutes: u32,
    ) -> Result<TransactionBreakdown> {
        let total_raw = self
            .insights(&nrql::transaction_total(
                app_id,
                transaction_name,
                time_range_minutes,
            ))
            .await?;

        let results = total_raw
            .get("results")
            .and_then(Value::as_array)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                GatewayError::Shaping(format!("no transaction data found for '{transaction_name}'"))
            })?;
        if results.len() < 2 {
            return Err(GatewayError::Shaping(format!(
                "transaction total results carried {} entries, expected 2",
                results.len()
            )));
        }

        let actual_name = results[0]
            .get("latest")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut total_txn_count = results[1]
            .get("count")
            .and_then(count_value)
            .unwrap_or(0);

        if total_txn_count == 0 {
            warn!(transaction = %transaction_name, "No transactions found, flooring count to 1");
            total_txn_count = 1;
        }

        let breakdown_query = nrql::transaction_breakdown(
            app_id,
            actual_name.as_deref().unwrap_or(""),
            transaction_name,
            time_range_minutes,
        );
        let breakdown_raw = self.insights(&breakdown_query).await?;

        let facets = breakdown_raw
            .get("facets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let (mut segments, grand_total) = shaper::build_segments(&facets, total_txn_count);
        shaper::finalize_segments(&mut segments, grand_total);

        Ok(TransactionBreakdown {
            transaction_name: actual_name,
            total_time_ms: shaper::round2(grand_total),
            total_transaction_count: total_txn_count,
            segments,
        })
    }

    /// Response time and throughput of a single transaction
    pub async fn transaction_details(
        &self,
        application_name: &str,
        transaction_name: &str,
        time_range_minutes: u32,
    ) -> Result<TransactionDetails> {
        let app_id = self.resolve(application_name).await?;

        let raw = self
            .insights(&nrql::transaction_details(
                &app_id,
                transaction_name,
                time_range_minutes,
            ))
            .await?;

        let facet = raw
            .get("facets")
            .and_then(Value::as_array)
            .and_then(|facets| facets.first())
            .ok_or_else(|| {
                GatewayError::Shaping(format!("no transaction data found for '{transaction_name}'"))
            })?;

        let results = facet
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Ok(TransactionDetails {
            transaction_name: facet
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            response_time: results
                .first()
                .and_then(|r| r.get("average"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            throughput_per_minute: results
                .get(1)
                .and_then(|r| r.get("result"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        })
    }

    /// Run an NRQL query through the GraphQL endpoint and format the rows.
    ///
    /// Always returns a string: failures become error text rather than a
    /// propagated fault.
    pub async fn query_logs(&self, nrql_query: &str) -> String {
        let document = nrql::logs_graphql(self.client.account_id(), nrql_query);
        let result = self.client.graphql(&document).await;
        self.note_api(components::GRAPHQL_API, &result).await;

        let body = match result {
            Ok(body) => body,
            Err(e @ GatewayError::Graphql(_)) => return e.to_string(),
            Err(e) => return format!("Error querying logs: {e}"),
        };

        let Some(data) = body.get("data") else {
            return "Error: No 'data' field in response".to_string();
        };
        let Some(account) = data.pointer("/actor/account") else {
            return "Error: No 'account' field in 'actor'".to_string();
        };
        let Some(nrql) = account.get("nrql") else {
            return "Error: No 'nrql' field in 'account'".to_string();
        };

        let logs = nrql
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let formatted: Vec<String> = logs
            .iter()
            .filter_map(Value::as_object)
            .map(|row| {
                let lines: Vec<String> = row
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", format_log_value(v)))
                    .collect();
                format!("---\n{}", lines.join("\n"))
            })
            .collect();

        if formatted.is_empty() {
            "No logs found".to_string()
        } else {
            formatted.join("\n")
        }
    }

    /// Query time, throughput and callers of one database operation,
    /// issued as three concurrent log queries
    pub async fn db_query_performance(
        &self,
        entity_guid: &str,
        operation: &str,
        table: &str,
        system: &str,
        time_range_minutes: u32,
    ) -> DbQueryPerformance {
        let query_time_query =
            nrql::db_query_time(entity_guid, operation, table, system, time_range_minutes);
        let throughput_query =
            nrql::db_throughput(entity_guid, operation, table, system, time_range_minutes);
        let callers_query =
            nrql::db_ops_callers(entity_guid, operation, table, system, time_range_minutes);

        let (query_time_result, throughput_result, db_ops_caller_result) = tokio::join!(
            self.query_logs(&query_time_query),
            self.query_logs(&throughput_query),
            self.query_logs(&callers_query)
        );

        DbQueryPerformance {
            query_time_result,
            throughput_result,
            db_ops_caller_result,
        }
    }
}

fn count_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as i64),
        _ => None,
    }
}

fn format_log_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
