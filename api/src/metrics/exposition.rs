//! Prometheus text exposition of the collected samples.
//!
//! Every render builds a fresh [`prometheus::Registry`] from an
//! [`ExposedSnapshot`], so series of hosts that failed or stopped being
//! watched simply disappear from the next scrape.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use shared::collector::ExposedSnapshot;
use shared::models::{MetricSample, SampleKind};
use std::collections::BTreeMap;

/// Prefix of every metric read from a `ClickHouse` host.
pub const CLICKHOUSE_PREFIX: &str = "chi_clickhouse_";

/// Labels attached to every per-host series.
pub const HOST_LABELS: [&str; 3] = ["chi", "namespace", "hostname"];

/// Content type of the text format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Maps a raw metric name onto the Prometheus name charset.
///
/// Characters outside `[a-zA-Z0-9_:]` become `_`; a leading digit gets a `_`
/// prepended.
#[must_use]
pub fn sanitize_metric_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

impl Family {
    fn new(name: &str, kind: SampleKind) -> prometheus::Result<Self> {
        let opts = Opts::new(name, format!("ClickHouse {kind} {name}"));
        Ok(match kind {
            SampleKind::Gauge => Self::Gauge(GaugeVec::new(opts, &HOST_LABELS)?),
            SampleKind::Counter => Self::Counter(CounterVec::new(opts, &HOST_LABELS)?),
        })
    }

    fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        match self {
            Self::Gauge(vec) => registry.register(Box::new(vec.clone())),
            Self::Counter(vec) => registry.register(Box::new(vec.clone())),
        }
    }

    fn observe(&self, sample: &MetricSample) {
        let labels = [
            sample.target.name.as_str(),
            sample.target.namespace.as_str(),
            sample.address.as_str(),
        ];
        match self {
            Self::Gauge(vec) => vec.with_label_values(&labels).set(sample.value),
            Self::Counter(vec) => {
                if sample.value.is_finite() && sample.value >= 0.0 {
                    let counter = vec.with_label_values(&labels);
                    counter.reset();
                    counter.inc_by(sample.value);
                }
            }
        }
    }
}

/// Renders the snapshot plus exporter self-metrics in the text format.
///
/// `watched` is the current number of watched targets.
///
/// # Errors
///
/// Returns an error if a metric family cannot be built or encoded.
pub fn render(snapshot: &ExposedSnapshot, watched: usize) -> prometheus::Result<String> {
    let registry = Registry::new();

    let mut families: BTreeMap<String, Family> = BTreeMap::new();
    for (name, samples) in &snapshot.metrics {
        let Some(kind) = samples.first().map(|s| s.kind) else {
            continue;
        };
        let full_name = sanitize_metric_name(&format!("{CLICKHOUSE_PREFIX}{name}"));

        if !families.contains_key(&full_name) {
            let family = Family::new(&full_name, kind)?;
            family.register(&registry)?;
            families.insert(full_name.clone(), family);
        }
        if let Some(family) = families.get(&full_name) {
            samples.iter().for_each(|sample| family.observe(sample));
        }
    }

    register_self_metrics(&registry, snapshot, watched)?;

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

fn register_self_metrics(
    registry: &Registry,
    snapshot: &ExposedSnapshot,
    watched: usize,
) -> prometheus::Result<()> {
    let failures = IntCounterVec::new(
        Opts::new(
            "chi_exporter_scrape_failures_total",
            "Failed collection attempts per watched host",
        ),
        &HOST_LABELS,
    )?;
    for ((target, address), count) in &snapshot.failures {
        failures
            .with_label_values(&[target.name.as_str(), target.namespace.as_str(), address.as_str()])
            .inc_by(*count);
    }
    registry.register(Box::new(failures))?;

    let watched_chis = IntGauge::new("chi_exporter_watched_chis", "Number of watched targets")?;
    watched_chis.set(i64::try_from(watched).unwrap_or(i64::MAX));
    registry.register(Box::new(watched_chis))?;

    if let Some(last_pass) = snapshot.last_pass {
        let gauge = Gauge::new(
            "chi_exporter_last_pass_timestamp_seconds",
            "Start time of the last completed collection pass",
        )?;
        #[allow(clippy::cast_precision_loss)]
        let seconds = last_pass.timestamp_millis() as f64 / 1000.0;
        gauge.set(seconds);
        registry.register(Box::new(gauge))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::collector::ExposedMetrics;
    use shared::models::TargetKey;

    fn chi() -> TargetKey {
        TargetKey::new("default", "chi-a")
    }

    #[test]
    fn test_sanitize_metric_name() {
        assert_eq!(sanitize_metric_name("metric_Query"), "metric_Query");
        assert_eq!(sanitize_metric_name("jemalloc.background_thread"), "jemalloc_background_thread");
        assert_eq!(sanitize_metric_name("5xx-errors"), "_5xx_errors");
        assert_eq!(sanitize_metric_name("a:b"), "a:b");
    }

    #[test]
    fn test_render_host_samples_with_labels() {
        let exposed = ExposedMetrics::new();
        exposed.record_success(
            &chi(),
            "10.0.0.1:8123",
            vec![MetricSample::gauge(chi(), "10.0.0.1:8123", "metric_Query", 3.0)],
        );

        let text = render(&exposed.snapshot(), 1).unwrap();

        assert!(text.contains("# TYPE chi_clickhouse_metric_Query gauge"));
        assert!(text.contains(
            r#"chi_clickhouse_metric_Query{chi="chi-a",hostname="10.0.0.1:8123",namespace="default"} 3"#
        ));
        assert!(text.contains("chi_exporter_watched_chis 1"));
    }

    #[test]
    fn test_render_counter_kind() {
        let exposed = ExposedMetrics::new();
        exposed.record_success(
            &chi(),
            "h0",
            vec![MetricSample::gauge(chi(), "h0", "event_Query", 42.0).with_kind(SampleKind::Counter)],
        );

        let text = render(&exposed.snapshot(), 1).unwrap();

        assert!(text.contains("# TYPE chi_clickhouse_event_Query counter"));
        assert!(text.contains("42"));
    }

    #[test]
    fn test_render_failures_and_last_pass() {
        let exposed = ExposedMetrics::new();
        exposed.record_failure(&chi(), "h0");
        exposed.finish_pass(shared::chrono::Utc::now());

        let text = render(&exposed.snapshot(), 1).unwrap();

        assert!(text.contains(
            r#"chi_exporter_scrape_failures_total{chi="chi-a",hostname="h0",namespace="default"} 1"#
        ));
        assert!(text.contains("chi_exporter_last_pass_timestamp_seconds"));
        assert!(!text.contains("chi_clickhouse_"));
    }

    #[test]
    fn test_render_empty_snapshot() {
        let text = render(&ExposedSnapshot::default(), 0).unwrap();

        assert!(text.contains("chi_exporter_watched_chis 0"));
        assert!(!text.contains("chi_exporter_last_pass_timestamp_seconds"));
    }
}
