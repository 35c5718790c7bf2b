//! Metric-producing queries run against every host.

use crate::models::SampleKind;

/// One query of the set.
///
/// The query must return `metric String, value Float64` rows; each row
/// becomes a sample named `prefix` + `metric`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    /// Short name used in logs.
    pub name: String,
    /// Prefix prepended to every metric name the query returns.
    pub prefix: String,
    /// Kind of the returned metrics.
    pub kind: SampleKind,
    /// SQL text.
    pub sql: String,
}

impl MetricQuery {
    /// Creates a gauge-producing query.
    #[must_use]
    pub fn gauge(name: impl Into<String>, prefix: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            kind: SampleKind::Gauge,
            sql: sql.into(),
        }
    }

    /// Creates a counter-producing query.
    #[must_use]
    pub fn counter(name: impl Into<String>, prefix: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind: SampleKind::Counter,
            ..Self::gauge(name, prefix, sql)
        }
    }

    /// Returns the sample name for a metric returned by this query.
    #[must_use]
    pub fn sample_name(&self, metric: &str) -> String {
        format!("{}{metric}", self.prefix)
    }
}

const SYSTEM_METRICS_SQL: &str =
    "SELECT metric, toFloat64(value) AS value FROM system.metrics";

const ASYNC_METRICS_SQL: &str =
    "SELECT metric, toFloat64(value) AS value FROM system.asynchronous_metrics";

const SYSTEM_EVENTS_SQL: &str =
    "SELECT event AS metric, toFloat64(value) AS value FROM system.events";

const PARTS_SQL: &str = "\
SELECT 'DiskDataBytes' AS metric, toFloat64(sum(bytes_on_disk)) AS value \
FROM system.parts WHERE active \
UNION ALL \
SELECT 'MemoryPrimaryKeyBytesAllocated' AS metric, \
toFloat64(sum(primary_key_bytes_in_memory_allocated)) AS value \
FROM system.parts WHERE active";

/// The ordered list of queries a pass runs against each host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySet {
    queries: Vec<MetricQuery>,
}

impl QuerySet {
    /// Creates a query set.
    #[must_use]
    pub fn new(queries: Vec<MetricQuery>) -> Self {
        Self { queries }
    }

    /// Iterates over the queries in order.
    pub fn iter(&self) -> impl Iterator<Item = &MetricQuery> {
        self.queries.iter()
    }

    /// Number of queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` if the set has no queries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// The `ClickHouse` system tables: current metrics, asynchronous metrics,
/// cumulative events and active part sizes.
impl Default for QuerySet {
    fn default() -> Self {
        Self::new(vec![
            MetricQuery::gauge("metrics", "metric_", SYSTEM_METRICS_SQL),
            MetricQuery::gauge("asynchronous_metrics", "metric_", ASYNC_METRICS_SQL),
            MetricQuery::counter("events", "event_", SYSTEM_EVENTS_SQL),
            MetricQuery::gauge("parts", "metric_", PARTS_SQL),
        ])
    }
}
