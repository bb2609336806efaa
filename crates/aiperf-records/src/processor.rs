//! Results processors (§4.6): every admitted, non-error record is fanned out
//! to one or more processors. `AggregateMetricProcessor` builds the run's
//! final `MetricResult` list; `RecordExportProcessor` persists each record
//! to `profile_export.jsonl`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use aiperf_bus::message::MetricRecordPayload;
use aiperf_core::model::{CreditPhaseStats, MetricRecordInfo, MetricValue};
use aiperf_metrics::registry::MetricKind;
use aiperf_metrics::result::MetricResult;
use aiperf_metrics::traits::MetricResultsDict;
use aiperf_metrics::{evaluation, MetricRegistry};

use crate::error::Result;
use crate::jsonl_writer::ExportWriter;

/// Common entry point every processor is fed through; finalization differs
/// per processor (a `Vec<MetricResult>` vs. a flushed file), so each keeps
/// its own inherent `summarize`/`finalize` method instead of returning it
/// from this trait.
#[async_trait]
pub trait ResultsProcessor: Send + Sync {
    async fn process(&self, record: &MetricRecordPayload) -> Result<()>;

    async fn finalize(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Accumulator {
    samples: HashMap<&'static str, Vec<f64>>,
    counters: HashMap<&'static str, u64>,
    total_records: u64,
    error_counts: HashMap<String, u64>,
}

/// Accumulates per-tag samples and counters across every admitted record and
/// produces the run's `Vec<MetricResult>` at finalization, including the
/// `DerivedMetric`s computed once the rest of the run's numbers are in.
pub struct AggregateMetricProcessor {
    registry: Arc<MetricRegistry>,
    state: Mutex<Accumulator>,
}

impl AggregateMetricProcessor {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self { registry, state: Mutex::new(Accumulator::default()) }
    }

    pub async fn error_counts(&self) -> HashMap<String, u64> {
        self.state.lock().await.error_counts.clone()
    }

    /// Combine accumulated samples/counters with `phase_stats` into the
    /// run's final metric list, in the registry's declared display order.
    pub async fn summarize(&self, phase_stats: &CreditPhaseStats) -> Vec<MetricResult> {
        let state = self.state.lock().await;
        let mut results = MetricResultsDict::new();

        let duration_ns = phase_stats
            .end_perf_ns
            .zip(phase_stats.start_perf_ns)
            .map(|(end, start)| (end - start) as f64)
            .unwrap_or(0.0);
        results.insert(MetricResult::scalar("benchmark_duration", "Benchmark Duration", aiperf_metrics::Unit::Nanoseconds, duration_ns, 1));

        for tag in self.registry.evaluation_order() {
            let Some(class) = self.registry.class(tag) else { continue };
            match class.kind {
                MetricKind::Record | MetricKind::Aggregate => {
                    if let Some(samples) = state.samples.get(tag) {
                        results.insert(MetricResult::from_samples(class.tag, class.header, class.unit, samples));
                    }
                }
                MetricKind::AggregateCounter => {
                    if let Some(count) = state.counters.get(tag) {
                        results.insert(MetricResult::scalar(class.tag, class.header, class.unit, *count as f64, *count));
                    }
                }
                MetricKind::Derived => {
                    if class.tag == "benchmark_duration" {
                        continue;
                    }
                    if let Some(metric) = evaluation::derived_metrics().into_iter().find(|m| m.tag() == class.tag) {
                        if let Ok(result) = metric.finalize(&results) {
                            results.insert(result);
                        }
                    }
                }
            }
        }

        let mut ordered: Vec<&'static str> = self.registry.evaluation_order().to_vec();
        ordered.sort_by_key(|tag| self.registry.class(tag).map(|c| c.display_order).unwrap_or(i32::MAX));
        ordered.into_iter().filter_map(|tag| results.get(tag).ok().cloned()).collect()
    }
}

#[async_trait]
impl ResultsProcessor for AggregateMetricProcessor {
    async fn process(&self, record: &MetricRecordPayload) -> Result<()> {
        let mut state = self.state.lock().await;
        state.total_records += 1;

        if let Some(error) = &record.error {
            *state.error_counts.entry(error.error_type.clone()).or_insert(0) += 1;
            return Ok(());
        }

        for tag in self.registry.evaluation_order() {
            let Some(class) = self.registry.class(*tag) else { continue };
            let Some(value) = record.values.get(*tag) else { continue };
            match class.kind {
                MetricKind::Record | MetricKind::Aggregate => {
                    state.samples.entry(class.tag).or_default().push(value.value);
                }
                MetricKind::AggregateCounter => {
                    *state.counters.entry(class.tag).or_insert(0) += value.value as u64;
                }
                MetricKind::Derived => {}
            }
        }
        Ok(())
    }
}

/// Writes each admitted record to `profile_export.jsonl`, converting every
/// value into the registry's declared display unit.
pub struct RecordExportProcessor {
    registry: Arc<MetricRegistry>,
    writer: ExportWriter,
}

impl RecordExportProcessor {
    pub fn new(registry: Arc<MetricRegistry>, writer: ExportWriter) -> Self {
        Self { registry, writer }
    }

    fn to_display(&self, tag: &str, value: &MetricValue) -> MetricValue {
        let Some(class) = self.registry.class(tag) else {
            return value.clone();
        };
        let Some(display_unit) = class.display_unit else {
            return value.clone();
        };
        match class.unit.convert(value.value, display_unit) {
            Some(converted) => MetricValue { value: converted, unit: display_unit.label().to_string() },
            None => value.clone(),
        }
    }
}

#[async_trait]
impl ResultsProcessor for RecordExportProcessor {
    async fn process(&self, record: &MetricRecordPayload) -> Result<()> {
        let metrics = record
            .values
            .iter()
            .map(|(tag, value)| (tag.clone(), self.to_display(tag, value)))
            .collect();
        let info = MetricRecordInfo { metadata: record.metadata.clone(), metrics };
        self.writer.write(&info).await
    }

    async fn finalize(&self) -> Result<()> {
        self.writer.flush().await
    }
}
