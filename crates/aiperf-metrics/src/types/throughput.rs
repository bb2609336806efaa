//! Throughput and token-accounting metrics: output sequence length, output
//! inference speed, output token throughput (overall and per-user), and
//! reasoning/output token counters.

use aiperf_core::model::ParsedResponseRecord;

use crate::error::{MetricError, Result};
use crate::registry::{MetricFlags, MetricRegistry};
use crate::slo::SloConfig;
use crate::traits::{AggregateCounterMetric, AggregateMetric, DerivedMetric, MetricRecordDict, MetricResultsDict};
use crate::unit::Unit;

/// Output tokens in one record.
pub struct OutputSequenceLength;

impl AggregateMetric for OutputSequenceLength {
    fn tag(&self) -> &'static str {
        "output_sequence_length"
    }

    fn unit(&self) -> Unit {
        Unit::Tokens
    }

    fn header(&self) -> &'static str {
        "Output Sequence Length"
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        record
            .output_token_count
            .map(|c| c as f64)
            .ok_or_else(|| MetricError::NoValue(self.tag().to_string()))
    }
}

/// Inverse of this record's mean inter-token latency: tokens/sec as
/// experienced within this one request.
pub struct OutputInferenceSpeed;

impl AggregateMetric for OutputInferenceSpeed {
    fn tag(&self) -> &'static str {
        "output_inference_speed"
    }

    fn unit(&self) -> Unit {
        Unit::TokensPerSecond
    }

    fn header(&self) -> &'static str {
        "Output Inference Speed"
    }

    fn parse_record(&self, _record: &ParsedResponseRecord, dict: &MetricRecordDict) -> Result<f64> {
        let itl_ns = dict.get("inter_token_latency")?;
        if itl_ns <= 0.0 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        Ok(1e9 / itl_ns)
    }
}

/// Total output tokens across the whole benchmark, accumulated as a running
/// counter rather than an array (no percentile distribution makes sense for
/// a monotonically growing total).
pub struct TotalOutputTokens;

impl AggregateCounterMetric for TotalOutputTokens {
    fn tag(&self) -> &'static str {
        "total_output_tokens"
    }

    fn unit(&self) -> Unit {
        Unit::Tokens
    }

    fn header(&self) -> &'static str {
        "Total Output Tokens"
    }

    fn counts_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<bool> {
        Ok(record.output_token_count.unwrap_or(0) > 0)
    }
}

pub struct TotalReasoningTokens;

impl AggregateCounterMetric for TotalReasoningTokens {
    fn tag(&self) -> &'static str {
        "total_reasoning_tokens"
    }

    fn unit(&self) -> Unit {
        Unit::Tokens
    }

    fn header(&self) -> &'static str {
        "Total Reasoning Tokens"
    }

    fn counts_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<bool> {
        Ok(record.reasoning_token_count.unwrap_or(0) > 0)
    }
}

/// Requests admitted into the PROFILING phase that completed without a
/// transport-level error. Feeds `RequestThroughput`; distinct from
/// `GoodRequestCount`, which additionally requires configured SLOs to pass.
pub struct ValidRequestCount;

impl AggregateCounterMetric for ValidRequestCount {
    fn tag(&self) -> &'static str {
        "valid_request_count"
    }

    fn unit(&self) -> Unit {
        Unit::Requests
    }

    fn header(&self) -> &'static str {
        "Valid Request Count"
    }

    fn counts_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<bool> {
        Ok(record.request.is_valid())
    }
}

/// One configured SLO, resolved against the registry at construction so
/// `counts_record` never needs to look anything up: which unit the record
/// dict holds the value in, which unit the threshold is expressed in
/// (display unit, falling back to the raw unit), and which direction
/// "satisfies" means.
struct SloCheck {
    tag: &'static str,
    record_unit: Unit,
    compare_unit: Unit,
    threshold: f64,
    larger_is_better: bool,
}

/// Requests whose value for every configured SLO metric satisfies its
/// threshold, direction decided by that metric's `LARGER_IS_BETTER` flag.
/// With no SLOs configured, goodput is opt-in: no record is good.
pub struct GoodRequestCount {
    checks: Vec<SloCheck>,
}

impl GoodRequestCount {
    pub fn new(registry: &MetricRegistry, slo: &SloConfig) -> Result<Self> {
        let mut checks = Vec::with_capacity(slo.thresholds.len());
        for (tag, &threshold) in &slo.thresholds {
            let class = registry.class(tag).ok_or_else(|| MetricError::UnknownTag(tag.clone()))?;
            checks.push(SloCheck {
                tag: class.tag,
                record_unit: class.unit,
                compare_unit: class.display_unit.unwrap_or(class.unit),
                threshold,
                larger_is_better: class.flags.contains(MetricFlags::LARGER_IS_BETTER),
            });
        }
        Ok(Self { checks })
    }
}

impl AggregateCounterMetric for GoodRequestCount {
    fn tag(&self) -> &'static str {
        "good_request_count"
    }

    fn unit(&self) -> Unit {
        Unit::Requests
    }

    fn header(&self) -> &'static str {
        "Good Request Count"
    }

    fn counts_record(&self, _record: &ParsedResponseRecord, dict: &MetricRecordDict) -> Result<bool> {
        if self.checks.is_empty() {
            return Ok(false);
        }
        for check in &self.checks {
            let Ok(raw) = dict.get(check.tag) else { return Ok(false) };
            let value = check.record_unit.convert(raw, check.compare_unit).unwrap_or(raw);
            let satisfies = if check.larger_is_better { value >= check.threshold } else { value <= check.threshold };
            if !satisfies {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct ErrorRequestCount;

impl AggregateCounterMetric for ErrorRequestCount {
    fn tag(&self) -> &'static str {
        "error_request_count"
    }

    fn unit(&self) -> Unit {
        Unit::Requests
    }

    fn header(&self) -> &'static str {
        "Error Request Count"
    }

    fn counts_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<bool> {
        Ok(record.request.error.is_some())
    }
}

/// Requests per second across the whole benchmark: `valid_request_count /
/// benchmark_duration`.
pub struct RequestThroughput;

impl DerivedMetric for RequestThroughput {
    fn tag(&self) -> &'static str {
        "request_throughput"
    }

    fn unit(&self) -> Unit {
        Unit::RequestsPerSecond
    }

    fn header(&self) -> &'static str {
        "Request Throughput"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["valid_request_count", "benchmark_duration"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        let count = results.get("valid_request_count")?.avg;
        let duration_ns = results.get("benchmark_duration")?.avg;
        if duration_ns <= 0.0 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        Ok(count / (duration_ns / 1e9))
    }
}

/// Aggregate output tokens per second across the whole benchmark.
pub struct OutputTokenThroughput;

impl DerivedMetric for OutputTokenThroughput {
    fn tag(&self) -> &'static str {
        "output_token_throughput"
    }

    fn unit(&self) -> Unit {
        Unit::TokensPerSecond
    }

    fn header(&self) -> &'static str {
        "Output Token Throughput"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["total_output_tokens", "benchmark_duration"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        let tokens = results.get("total_output_tokens")?.avg;
        let duration_ns = results.get("benchmark_duration")?.avg;
        if duration_ns <= 0.0 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        Ok(tokens / (duration_ns / 1e9))
    }
}

/// Per-user output token throughput: how fast one concurrent user's stream
/// delivers tokens, independent of how many users ran concurrently — the
/// reciprocal of the mean inter-token latency.
pub struct OutputTokenThroughputPerUser;

impl DerivedMetric for OutputTokenThroughputPerUser {
    fn tag(&self) -> &'static str {
        "output_token_throughput_per_user"
    }

    fn unit(&self) -> Unit {
        Unit::TokensPerSecondPerUser
    }

    fn header(&self) -> &'static str {
        "Output Token Throughput Per User"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["inter_token_latency"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        let mean_itl_ns = results.get("inter_token_latency")?.avg;
        if mean_itl_ns <= 0.0 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        Ok(1e9 / mean_itl_ns)
    }
}

/// Fraction of output tokens spent on reasoning rather than visible output:
/// `total_reasoning_tokens / total_output_tokens`.
pub struct OverallTokenEfficiency;

impl DerivedMetric for OverallTokenEfficiency {
    fn tag(&self) -> &'static str {
        "overall_token_efficiency"
    }

    fn unit(&self) -> Unit {
        Unit::Ratio
    }

    fn header(&self) -> &'static str {
        "Overall Token Efficiency"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["total_reasoning_tokens", "total_output_tokens"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        let reasoning = results.get("total_reasoning_tokens")?.avg;
        let output = results.get("total_output_tokens")?.avg;
        if output <= 0.0 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        Ok(reasoning / output)
    }
}
