//! Campaign metrics via the metrics-rs facade.
//!
//! Recording is cheap no-op calls unless a recorder is installed; the CLI
//! installs [`CliRecorder`] when `--metrics` is given and prints the summary
//! on exit.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "crosscheck_candidates_total",
        Unit::Count,
        "Total candidate seeds drawn"
    );
    describe_counter!(
        "crosscheck_generator_failures_total",
        Unit::Count,
        "Total generator runs that produced no candidate"
    );
    describe_counter!(
        "crosscheck_known_bugs_total",
        Unit::Count,
        "Total candidates skipped for matching a known bug"
    );
    describe_counter!(
        "crosscheck_duplicates_total",
        Unit::Count,
        "Total candidates already claimed or persisted by another runner"
    );
    describe_counter!(
        "crosscheck_compile_bugs_total",
        Unit::Count,
        "Total candidates persisted for compile-phase failures"
    );
    describe_counter!(
        "crosscheck_wrong_code_total",
        Unit::Count,
        "Total candidates persisted for runtime divergence"
    );
    describe_counter!(
        "crosscheck_valid_programs_total",
        Unit::Count,
        "Total candidates agreeing across every backend"
    );

    describe_gauge!(
        "crosscheck_workers",
        Unit::Count,
        "Worker threads in the campaign pool"
    );

    describe_histogram!(
        "crosscheck_generate_duration_seconds",
        Unit::Seconds,
        "Candidate generation duration distribution"
    );
    describe_histogram!(
        "crosscheck_evaluate_duration_seconds",
        Unit::Seconds,
        "Oracle evaluation duration distribution"
    );
}

pub fn record_candidate() {
    counter!("crosscheck_candidates_total").increment(1);
}

/// `kind` is `timeout` or `rejected`.
pub fn record_generator_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!("crosscheck_generator_failures_total", &labels).increment(1);
}

pub fn record_known_bug() {
    counter!("crosscheck_known_bugs_total").increment(1);
}

pub fn record_duplicate() {
    counter!("crosscheck_duplicates_total").increment(1);
}

/// `status` is the overall evidence status of the persisted record.
pub fn record_compile_bug(status: &str) {
    let labels = [("status", status.to_string())];
    counter!("crosscheck_compile_bugs_total", &labels).increment(1);
}

/// `reason` is the matching criterion of the persisted record.
pub fn record_wrong_code(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!("crosscheck_wrong_code_total", &labels).increment(1);
}

pub fn record_valid_program() {
    counter!("crosscheck_valid_programs_total").increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn record_workers(count: usize) {
    gauge!("crosscheck_workers").set(count as f64);
}

pub fn record_generate_duration(seconds: f64) {
    histogram!("crosscheck_generate_duration_seconds").record(seconds);
}

pub fn record_evaluate_duration(seconds: f64) {
    histogram!("crosscheck_evaluate_duration_seconds").record(seconds);
}

/// In-memory store shared by the recorder and its handle.
#[derive(Default)]
struct Store {
    counters: RwLock<HashMap<String, u64>>,
    gauges: RwLock<HashMap<String, f64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    store: Arc<Store>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        *self.store.counters.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.store.counters.write().insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    store: Arc<Store>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        *self.store.gauges.write().entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.store.gauges.write().entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.store.gauges.write().insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    store: Arc<Store>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        self.store
            .histograms
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// Recorder that collects metrics in memory for terminal output.
pub struct CliRecorder {
    store: Arc<Store>,
}

impl CliRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store::default()),
        }
    }

    /// Install as the global recorder; `None` when one is already installed.
    #[must_use]
    pub fn install(self) -> Option<CliRecorderHandle> {
        let store = Arc::clone(&self.store);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { store })
    }
}

impl Default for CliRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn key_to_string(key: &Key) -> String {
    let name = key.name();
    let labels = key.labels();
    if labels.len() == 0 {
        name.to_string()
    } else {
        let rendered: Vec<String> = labels
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        format!("{name}{{{}}}", rendered.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            store: Arc::clone(&self.store),
        }))
    }
}

/// Read access to collected metrics after the recorder is installed.
pub struct CliRecorderHandle {
    store: Arc<Store>,
}

impl CliRecorderHandle {
    #[must_use]
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.store.counters.read().get(key).copied()
    }

    /// Print collected metrics grouped by kind, keys sorted.
    #[allow(clippy::cast_precision_loss)]
    pub fn print_summary(&self) {
        let counters = self.store.counters.read();
        let gauges = self.store.gauges.read();
        let histograms = self.store.histograms.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            println!("No metrics collected.");
            return;
        }

        println!();
        println!("## Metrics Summary");
        println!();

        if !counters.is_empty() {
            println!("### Counters");
            let mut keys: Vec<_> = counters.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = counters.get(key) {
                    println!("  {key}: {value}");
                }
            }
            println!();
        }

        if !gauges.is_empty() {
            println!("### Gauges");
            let mut keys: Vec<_> = gauges.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = gauges.get(key) {
                    println!("  {key}: {value:.6}");
                }
            }
            println!();
        }

        if !histograms.is_empty() {
            println!("### Histograms");
            let mut keys: Vec<_> = histograms.keys().collect();
            keys.sort();
            for key in keys {
                let Some(values) = histograms.get(key) else {
                    continue;
                };
                if values.is_empty() {
                    continue;
                }
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let sum: f64 = values.iter().sum();
                let avg = sum / values.len() as f64;
                println!(
                    "  {key}: count={}, min={min:.6}, max={max:.6}, avg={avg:.6}",
                    values.len()
                );
            }
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use metrics::Label;

    use super::*;

    #[test]
    fn bare_keys_render_without_braces() {
        let key = Key::from_name("crosscheck_candidates_total");
        assert_eq!(key_to_string(&key), "crosscheck_candidates_total");
    }

    #[test]
    fn labelled_keys_render_in_braces() {
        let key = Key::from_parts(
            "crosscheck_generator_failures_total",
            vec![Label::new("kind", "timeout")],
        );
        assert_eq!(
            key_to_string(&key),
            "crosscheck_generator_failures_total{kind=timeout}"
        );

        let key = Key::from_parts(
            "crosscheck_wrong_code_total",
            vec![Label::new("reason", "stdout-differ"), Label::new("run", "1")],
        );
        assert_eq!(
            key_to_string(&key),
            "crosscheck_wrong_code_total{reason=stdout-differ,run=1}"
        );
    }

    #[test]
    fn store_accumulates_counter_and_gauge_updates() {
        let store = Arc::new(Store::default());

        let counter = CliCounter {
            key: "candidates".to_string(),
            store: Arc::clone(&store),
        };
        metrics::CounterFn::increment(&counter, 5);
        metrics::CounterFn::increment(&counter, 2);
        assert_eq!(store.counters.read().get("candidates"), Some(&7));
        metrics::CounterFn::absolute(&counter, 10);
        assert_eq!(store.counters.read().get("candidates"), Some(&10));

        let gauge = CliGauge {
            key: "workers".to_string(),
            store: Arc::clone(&store),
        };
        metrics::GaugeFn::set(&gauge, 6.0);
        metrics::GaugeFn::decrement(&gauge, 2.0);
        assert_eq!(store.gauges.read().get("workers"), Some(&4.0));
    }
}
