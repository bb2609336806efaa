//! The four metric kinds (§4.4): RecordMetric, AggregateMetric,
//! AggregateCounterMetric, DerivedMetric.

use std::collections::HashMap;

use aiperf_core::model::ParsedResponseRecord;

use crate::error::{MetricError, Result};
use crate::result::MetricResult;
use crate::unit::Unit;

/// One metric's computed value for the record currently being evaluated,
/// keyed by tag. Built fresh per record (§4.4 step 7).
#[derive(Debug, Default, Clone)]
pub struct MetricRecordDict {
    values: HashMap<String, f64>,
}

impl MetricRecordDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: &str) -> Result<f64> {
        self.values
            .get(tag)
            .copied()
            .ok_or_else(|| MetricError::NoValue(tag.to_string()))
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: f64) {
        self.values.insert(tag.into(), value);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.values.contains_key(tag)
    }
}

/// Finalized results keyed by tag, consulted by `DerivedMetric::derive_value`.
#[derive(Debug, Default)]
pub struct MetricResultsDict {
    results: HashMap<String, MetricResult>,
}

impl MetricResultsDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: MetricResult) {
        self.results.insert(result.tag.clone(), result);
    }

    pub fn get(&self, tag: &str) -> Result<&MetricResult> {
        self.results
            .get(tag)
            .ok_or_else(|| MetricError::NoValue(tag.to_string()))
    }

    pub fn values(&self) -> impl Iterator<Item = &MetricResult> {
        self.results.values()
    }
}

/// Computed inline by the worker against one `ParsedResponseRecord`. Must
/// not depend on aggregate-only metrics (§4.4).
pub trait RecordMetric: Send + Sync {
    fn tag(&self) -> &'static str;
    fn unit(&self) -> Unit;

    fn parse_record(
        &self,
        record: &ParsedResponseRecord,
        dict: &MetricRecordDict,
    ) -> Result<f64>;
}

/// Appends a per-record scalar into a growing array; final aggregation
/// happens at the records manager (§4.4). For metrics with several raw
/// samples per record (e.g. one inter-chunk gap per pair of chunks), the
/// per-record contribution is that record's own mean — one sample per
/// record feeds the run-wide distribution, the same granularity the records
/// manager aggregates every other per-record metric at.
pub trait AggregateMetric: Send + Sync {
    fn tag(&self) -> &'static str;
    fn unit(&self) -> Unit;
    fn header(&self) -> &'static str;

    fn parse_record(
        &self,
        record: &ParsedResponseRecord,
        dict: &MetricRecordDict,
    ) -> Result<f64>;

    fn finalize(&self, samples: &[f64]) -> MetricResult {
        MetricResult::from_samples(self.tag(), self.header(), self.unit(), samples)
    }
}

/// Accumulates a counter from per-record values (e.g. good-request count).
pub trait AggregateCounterMetric: Send + Sync {
    fn tag(&self) -> &'static str;
    fn unit(&self) -> Unit;
    fn header(&self) -> &'static str;

    /// Returns `true` if this record should increment the counter.
    fn counts_record(&self, record: &ParsedResponseRecord, dict: &MetricRecordDict) -> Result<bool>;

    /// The amount this record adds to the running counter. Defaults to
    /// `1.0`/`0.0` from `counts_record`; token counters (total output
    /// tokens, total reasoning tokens) override this to add the record's
    /// own token count instead of a fixed increment.
    fn record_value(&self, record: &ParsedResponseRecord, dict: &MetricRecordDict) -> Result<f64> {
        Ok(if self.counts_record(record, dict)? { 1.0 } else { 0.0 })
    }

    fn finalize(&self, count: u64, total: u64) -> MetricResult {
        let _ = total;
        MetricResult::scalar(self.tag(), self.header(), self.unit(), count as f64, count)
    }
}

/// Computed once at finalization from aggregated results of other metrics.
pub trait DerivedMetric: Send + Sync {
    fn tag(&self) -> &'static str;
    fn unit(&self) -> Unit;
    fn header(&self) -> &'static str;
    fn required_metrics(&self) -> &'static [&'static str];

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64>;

    fn finalize(&self, results: &MetricResultsDict) -> Result<MetricResult> {
        let value = self.derive_value(results)?;
        Ok(MetricResult::scalar(self.tag(), self.header(), self.unit(), value, 1))
    }
}
