//! Run-wide summary metrics computed once at finalization (§4.4 DerivedMetric).

use crate::error::{MetricError, Result};
use crate::traits::{DerivedMetric, MetricResultsDict};
use crate::unit::Unit;

/// Wall-clock span of the PROFILING phase. Populated directly from
/// `CreditPhaseStats` by the records manager rather than derived from other
/// metric results — it has no `required_metrics` dependency, but is exposed
/// as a `DerivedMetric` so `request_throughput` and `output_token_throughput`
/// can depend on it uniformly through the registry.
pub struct BenchmarkDuration {
    pub duration_ns: f64,
}

impl DerivedMetric for BenchmarkDuration {
    fn tag(&self) -> &'static str {
        "benchmark_duration"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Benchmark Duration"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &[]
    }

    fn derive_value(&self, _results: &MetricResultsDict) -> Result<f64> {
        Ok(self.duration_ns)
    }
}

/// Total output tokens produced during the PROFILING phase (§4.4's
/// `BenchmarkTokenCount / BenchmarkDuration` throughput formula uses this,
/// not input+output — there is no input-token counter in this catalogue).
pub struct BenchmarkTokenCount;

impl DerivedMetric for BenchmarkTokenCount {
    fn tag(&self) -> &'static str {
        "benchmark_token_count"
    }

    fn unit(&self) -> Unit {
        Unit::Tokens
    }

    fn header(&self) -> &'static str {
        "Benchmark Token Count"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["total_output_tokens"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        Ok(results.get("total_output_tokens")?.avg)
    }
}

pub struct MinRequestLatency;

impl DerivedMetric for MinRequestLatency {
    fn tag(&self) -> &'static str {
        "min_request_latency"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Min Request Latency"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["request_latency"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        results
            .get("request_latency")?
            .min
            .ok_or_else(|| MetricError::NoValue(self.tag().to_string()))
    }
}

pub struct MaxRequestLatency;

impl DerivedMetric for MaxRequestLatency {
    fn tag(&self) -> &'static str {
        "max_request_latency"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Max Request Latency"
    }

    fn required_metrics(&self) -> &'static [&'static str] {
        &["request_latency"]
    }

    fn derive_value(&self, results: &MetricResultsDict) -> Result<f64> {
        results
            .get("request_latency")?
            .max
            .ok_or_else(|| MetricError::NoValue(self.tag().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::MetricResult;

    #[test]
    fn min_and_max_pull_from_request_latency_bounds() {
        let mut results = MetricResultsDict::new();
        let mut latency = MetricResult::from_samples("request_latency", "x", Unit::Nanoseconds, &[10.0, 50.0, 30.0]);
        latency.tag = "request_latency".into();
        results.insert(latency);
        assert_eq!(MinRequestLatency.derive_value(&results).unwrap(), 10.0);
        assert_eq!(MaxRequestLatency.derive_value(&results).unwrap(), 50.0);
    }
}
