//! Fixed NRQL query templates
//!
//! Queries are fixed templates with substituted parameters, never built
//! dynamically. Each faceted SELECT template carries a declared result
//! schema: the ordered (alias, aggregate key) pairs matching its SELECT
//! clause. Shaping validates every result-array entry against the schema
//! instead of trusting array positions blindly.

/// One declared SELECT field: its alias and the aggregate key the Insights
/// API reports it under (`sum`, `result`, `count`, `average`).
#[derive(Debug, Clone, Copy)]
pub struct ResultField {
    pub alias: &'static str,
    pub aggregate: &'static str,
}

pub type ResultSchema = &'static [ResultField];

/// SELECT order of the slow-transactions query
pub const SLOW_TRANSACTIONS_SCHEMA: ResultSchema = &[
    ResultField { alias: "Total Duration", aggregate: "sum" },
    ResultField { alias: "Avg Duration", aggregate: "result" },
    ResultField { alias: "Min Duration", aggregate: "result" },
    ResultField { alias: "Max Duration", aggregate: "result" },
    ResultField { alias: "Call Count", aggregate: "count" },
    ResultField { alias: "Error Rate (%)", aggregate: "result" },
    ResultField { alias: "Throughput (rpm)", aggregate: "result" },
];

/// SELECT order of the top-database-operations query
pub const DATABASE_OPERATIONS_SCHEMA: ResultSchema = &[
    ResultField { alias: "Total Time per Minute (ms)", aggregate: "result" },
    ResultField { alias: "Avg Query Time (ms)", aggregate: "average" },
    ResultField { alias: "Throughput (ops/min)", aggregate: "result" },
];

/// SELECT order of the transaction-breakdown query
pub const BREAKDOWN_SCHEMA: ResultSchema = &[
    ResultField { alias: "avg_time", aggregate: "average" },
    ResultField { alias: "call_count", aggregate: "count" },
    ResultField { alias: "total_time", aggregate: "sum" },
];

pub fn slow_transactions(app_id: &str, time_range_minutes: u32) -> String {
    format!(
        "FROM Transaction \
         SELECT \
           sum(duration) AS 'Total Duration', \
           average(duration) * 1000 AS 'Avg Duration', \
           min(duration) * 1000 AS 'Min Duration', \
           max(duration) * 1000 AS 'Max Duration', \
           count(*) AS 'Call Count', \
           filter(count(*), WHERE error IS true) * 100 / count(*) AS 'Error Rate (%)', \
           rate(count(*), 1 minute) AS 'Throughput (rpm)' \
         WHERE appId = {app_id} \
         SINCE {time_range_minutes} minutes ago \
         FACET name \
         ORDER BY `Total Duration` DESC \
         LIMIT 5"
    )
}

pub fn top_database_operations(app_id: &str, time_range_minutes: u32, limit: u32) -> String {
    format!(
        "FROM Metric \
         SELECT rate(count(apm.service.datastore.operation.duration), 1 minute) * average(apm.service.datastore.operation.duration * 1000) AS 'Total Time per Minute (ms)', \
           average(apm.service.datastore.operation.duration * 1000) AS 'Avg Query Time (ms)', \
           rate(count(apm.service.datastore.operation.duration), 1 minute) AS 'Throughput (ops/min)' \
         WHERE appId = {app_id} \
         FACET `datastoreType`, `table`, `operation` \
         SINCE {time_range_minutes} minutes ago \
         LIMIT {limit}"
    )
}

/// Latest matching transaction name plus total call count over the window
pub fn transaction_total(app_id: &str, transaction_name: &str, time_range_minutes: u32) -> String {
    format!(
        "FROM Transaction \
         SELECT latest(name) as 'transaction_name', count(*) as 'total_count' \
         WHERE appId = {app_id} \
         AND (name like '%{transaction_name}%' OR request.uri LIKE '%{transaction_name}%') \
         SINCE {time_range_minutes} minutes ago"
    )
}

/// Per-segment timing faceted by metricTimesliceName, with a URI-substring
/// fallback subquery for endpoint-style lookups
pub fn transaction_breakdown(
    app_id: &str,
    actual_name: &str,
    uri_fragment: &str,
    time_range_minutes: u32,
) -> String {
    format!(
        "FROM Metric \
         SELECT \
           average(convert(apm.service.transaction.overview, unit, 'ms')) AS 'avg_time', \
           count(apm.service.transaction.overview) AS 'call_count', \
           sum(convert(apm.service.transaction.overview, unit, 'ms')) AS 'total_time' \
         WHERE (appId = {app_id}) \
           AND (transactionName = '{actual_name}' \
           OR transactionName IN (SELECT name FROM Transaction \
                                  WHERE request.uri LIKE '%{uri_fragment}%' LIMIT 1)) \
         FACET `metricTimesliceName` \
         LIMIT 7 \
         SINCE {time_range_minutes} minutes ago \
         UNTIL now"
    )
}

/// Response time and throughput of a single transaction
pub fn transaction_details(app_id: &str, transaction_name: &str, time_range_minutes: u32) -> String {
    format!(
        "FROM Metric \
         SELECT average(convert(apm.service.transaction.duration, unit, 'ms')) as 'Response time', \
           rate(count(apm.service.transaction.duration), 1 minute) AS 'throughput_per_minute' \
         WHERE (appId = {app_id}) \
           AND (metricTimesliceName = '{transaction_name}' OR metricTimesliceName IN (SELECT name FROM Transaction WHERE request.uri LIKE '%{transaction_name}%' LIMIT 1)) \
         FACET `metricTimesliceName` \
         LIMIT 5 \
         SINCE {time_range_minutes} minutes ago \
         UNTIL now"
    )
}

/// GraphQL document wrapping an NRQL query against one account
pub fn logs_graphql(account_id: &str, nrql_query: &str) -> String {
    format!(
        "{{\n  actor {{\n    account(id: {account_id}) {{\n      nrql(query: \"{nrql_query}\") {{\n        results\n      }}\n    }}\n  }}\n}}"
    )
}

pub fn db_query_time(
    entity_guid: &str,
    operation: &str,
    table: &str,
    system: &str,
    time_range_minutes: u32,
) -> String {
    format!(
        "SELECT average(convert(apm.service.datastore.operation.duration, unit, 'ms')) FROM Metric \
         WHERE (entity.guid = '{entity_guid}') AND ((`db.operation` = '{operation}' AND `db.sql.table` = '{table}' AND `db.system` = '{system}')) \
         FACET `db.system`, `db.sql.table`, `db.operation` LIMIT 5 \
         SINCE {time_range_minutes} minutes ago TIMESERIES UNTIL now"
    )
}

pub fn db_throughput(
    entity_guid: &str,
    operation: &str,
    table: &str,
    system: &str,
    time_range_minutes: u32,
) -> String {
    format!(
        "SELECT rate(count(apm.service.datastore.operation.duration), 1 minute) FROM Metric \
         WHERE (entity.guid = '{entity_guid}') AND ((`db.operation` = '{operation}' AND `db.sql.table` = '{table}' AND `db.system` = '{system}')) \
         LIMIT 5 SINCE {time_range_minutes} minutes ago TIMESERIES \
         FACET concat(db.system, ' ', db.sql.table, ' ', db.operation) UNTIL now"
    )
}

pub fn db_ops_callers(
    entity_guid: &str,
    operation: &str,
    table: &str,
    system: &str,
    time_range_minutes: u32,
) -> String {
    format!(
        "SELECT sum(apm.service.transaction.overview) as 'Database operation callers' FROM Metric \
         WHERE (entity.guid = '{entity_guid}') AND ((`db.operation` = '{operation}' AND `db.sql.table` = '{table}' AND `db.system` = '{system}' AND metricName = 'apm.service.transaction.overview')) \
         FACET `transactionName` LIMIT 5 \
         SINCE {time_range_minutes} minutes ago UNTIL now"
    )
}
