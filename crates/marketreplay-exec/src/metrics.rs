//! Metrics Registry: counters, gauges, and histograms, plus a text scrape
//! renderer. Deliberately dependency-light — observations never touch a
//! hashed code path, so nothing here needs to be deterministic.

use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Default)]
struct Histogram {
    observations: Vec<f64>,
}

impl Histogram {
    fn observe(&mut self, value: f64) {
        self.observations.push(value);
    }

    fn summary(&self) -> HistogramSummary {
        if self.observations.is_empty() {
            return HistogramSummary::default();
        }
        let mut sorted = self.observations.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let count = sorted.len() as u64;
        let sum: f64 = sorted.iter().sum();
        HistogramSummary {
            count,
            sum,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            avg: sum / count as f64,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Floor-index percentile over an already-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() as f64 - 1.0) * q).floor() as usize;
    sorted[idx]
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsSnapshot {
    pub run_id: String,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
    pub uptime_ms: u64,
}

pub struct MetricsRegistry {
    run_id: String,
    started_at: Instant,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, f64>,
    histograms: BTreeMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Instant::now(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
            histograms: BTreeMap::new(),
        }
    }

    pub fn incr(&mut self, name: &str, by: u64) {
        *self.counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn set_gauge(&mut self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    pub fn observe(&mut self, name: &str, value: f64) {
        self.histograms
            .entry(name.to_string())
            .or_default()
            .observe(value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            run_id: self.run_id.clone(),
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
            histograms: self
                .histograms
                .iter()
                .map(|(k, v)| (k.clone(), v.summary()))
                .collect(),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }

    /// Simple text exposition: one labeled sample line per counter/gauge,
    /// summary-style percentile lines per histogram.
    pub fn render_scrape(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        for (name, value) in &snapshot.counters {
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!(
                "{name}{{run_id=\"{}\"}} {value}\n",
                snapshot.run_id
            ));
        }
        for (name, value) in &snapshot.gauges {
            out.push_str(&format!("# TYPE {name} gauge\n"));
            out.push_str(&format!(
                "{name}{{run_id=\"{}\"}} {value}\n",
                snapshot.run_id
            ));
        }
        for (name, summary) in &snapshot.histograms {
            out.push_str(&format!("# TYPE {name} summary\n"));
            for (label, value) in [
                ("count", summary.count as f64),
                ("sum", summary.sum),
                ("p50", summary.p50),
                ("p95", summary.p95),
                ("p99", summary.p99),
            ] {
                out.push_str(&format!(
                    "{name}_{label}{{run_id=\"{}\"}} {value}\n",
                    snapshot.run_id
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut m = MetricsRegistry::new("r1");
        m.incr("events_total", 1);
        m.incr("events_total", 4);
        assert_eq!(m.snapshot().counters["events_total"], 5);
    }

    #[test]
    fn gauges_are_last_write_wins() {
        let mut m = MetricsRegistry::new("r1");
        m.set_gauge("queue_depth", 10.0);
        m.set_gauge("queue_depth", 3.0);
        assert_eq!(m.snapshot().gauges["queue_depth"], 3.0);
    }

    #[test]
    fn histogram_percentiles_use_floor_index_selection() {
        let mut m = MetricsRegistry::new("r1");
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            m.observe("latency_ms", v);
        }
        let summary = m.snapshot().histograms["latency_ms"];
        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.p50, 3.0);
    }

    #[test]
    fn scrape_includes_the_run_id_label() {
        let mut m = MetricsRegistry::new("run_abc");
        m.incr("events_total", 1);
        let rendered = m.render_scrape();
        assert!(rendered.contains("run_id=\"run_abc\""));
    }
}
