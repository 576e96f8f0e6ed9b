//! In-process metrics collection (spec §9 "Supplemented Features": the
//! distillation dropped observability counters, but every audit run still
//! wants tool-duration histograms and pass/fail counts). No external
//! backend — this is the agency's `MetricsCollector` minus its
//! Prometheus/StatsD exporters, which AOC has no use for yet.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histogram_counts: HashMap<String, usize>,
}

#[derive(Debug)]
pub struct MetricsCollector {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    gauges: Arc<RwLock<HashMap<String, f64>>>,
    histograms: Arc<RwLock<HashMap<String, Vec<f64>>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
            gauges: Arc::new(RwLock::new(HashMap::new())),
            histograms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn make_key(name: &str, labels: &[(&str, &str)]) -> String {
        if labels.is_empty() {
            return name.to_string();
        }
        let mut parts: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.sort();
        format!("{name}{{{}}}", parts.join(","))
    }

    pub async fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        *self.counters.write().await.entry(key).or_insert(0) += 1;
    }

    pub async fn update_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        self.gauges.write().await.insert(key, value);
    }

    pub async fn record_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let key = Self::make_key(name, labels);
        let mut histograms = self.histograms.write().await;
        let values = histograms.entry(key).or_insert_with(Vec::new);
        values.push(value);
        if values.len() > 1000 {
            values.remove(0);
        }
    }

    /// Records a completed adapter run (spec §4.4: every tool invocation
    /// ends in a TOOL_FINISHED/TOOL_FAILED/TOOL_TIMEOUT event).
    pub async fn record_tool_run(&self, tool_id: &str, duration_ms: f64, outcome: &str) {
        self.record_histogram(
            "tool_run_duration_ms",
            duration_ms,
            &[("tool_id", tool_id), ("outcome", outcome)],
        )
        .await;
        self.increment_counter("tool_runs_total", &[("tool_id", tool_id), ("outcome", outcome)])
            .await;
    }

    pub async fn record_correlation_pass(&self, findings_in: usize, findings_out: usize) {
        self.update_gauge("correlation_findings_in", findings_in as f64, &[])
            .await;
        self.update_gauge("correlation_findings_out", findings_out as f64, &[])
            .await;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.read().await.clone();
        let gauges = self.gauges.read().await.clone();
        let histogram_counts = self
            .histograms
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect();
        MetricsSnapshot {
            counters,
            gauges,
            histogram_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_increments_per_label_set() {
        let collector = MetricsCollector::new();
        collector
            .increment_counter("tool_runs_total", &[("tool_id", "slither-eq")])
            .await;
        collector
            .increment_counter("tool_runs_total", &[("tool_id", "slither-eq")])
            .await;
        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.counters["tool_runs_total{tool_id=slither-eq}"], 2);
    }

    #[tokio::test]
    async fn distinct_label_sets_are_independent() {
        let collector = MetricsCollector::new();
        collector
            .increment_counter("x", &[("a", "1")])
            .await;
        collector
            .increment_counter("x", &[("a", "2")])
            .await;
        let snapshot = collector.snapshot().await;
        assert_eq!(snapshot.counters.len(), 2);
    }
}
