//! `MetricResult`: the aggregated statistics for one metric (§3, §4.4)

use serde::{Deserialize, Serialize};

use crate::unit::Unit;

const PERCENTILES: [(&str, f64); 8] = [
    ("p1", 0.01),
    ("p5", 0.05),
    ("p25", 0.25),
    ("p50", 0.50),
    ("p75", 0.75),
    ("p90", 0.90),
    ("p95", 0.95),
    ("p99", 0.99),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Percentiles {
    pub p1: Option<f64>,
    pub p5: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub tag: String,
    pub header: String,
    pub unit: Unit,
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: f64,
    pub std: Option<f64>,
    pub percentiles: Percentiles,
}

impl MetricResult {
    /// Build a `MetricResult` from a growing array of per-record samples
    /// (an `AggregateMetric`'s finalized values). Exact percentiles via an
    /// in-memory sorted copy, acceptable at benchmark-run sample sizes.
    pub fn from_samples(tag: impl Into<String>, header: impl Into<String>, unit: Unit, samples: &[f64]) -> Self {
        let tag = tag.into();
        let header = header.into();
        if samples.is_empty() {
            return Self {
                tag,
                header,
                unit,
                count: 0,
                min: None,
                max: None,
                avg: 0.0,
                std: None,
                percentiles: Percentiles::default(),
            };
        }

        let mut sorted: Vec<f64> = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();
        let avg = sum / count as f64;
        let variance = sorted.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / count as f64;
        let std = if count > 1 { Some(variance.sqrt()) } else { None };

        let percentile_at = |p: f64| -> f64 {
            if sorted.len() == 1 {
                return sorted[0];
            }
            let rank = p * (sorted.len() - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = rank - lo as f64;
                sorted[lo] * (1.0 - frac) + sorted[hi] * frac
            }
        };

        let mut percentiles = Percentiles::default();
        for (name, p) in PERCENTILES {
            let value = Some(percentile_at(p));
            match name {
                "p1" => percentiles.p1 = value,
                "p5" => percentiles.p5 = value,
                "p25" => percentiles.p25 = value,
                "p50" => percentiles.p50 = value,
                "p75" => percentiles.p75 = value,
                "p90" => percentiles.p90 = value,
                "p95" => percentiles.p95 = value,
                "p99" => percentiles.p99 = value,
                _ => unreachable!(),
            }
        }

        Self {
            tag,
            header,
            unit,
            count: count as u64,
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            avg,
            std,
            percentiles,
        }
    }

    /// Build a `MetricResult` for an `AggregateCounterMetric` or
    /// `DerivedMetric`: a scalar `avg` with no percentiles (§3 MetricResult).
    pub fn scalar(tag: impl Into<String>, header: impl Into<String>, unit: Unit, value: f64, count: u64) -> Self {
        Self {
            tag: tag.into(),
            header: header.into(),
            unit,
            count,
            min: None,
            max: None,
            avg: value,
            std: None,
            percentiles: Percentiles::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_odd_sample_set() {
        let result = MetricResult::from_samples("x", "X", Unit::Milliseconds, &[1.0, 2.0, 3.0]);
        assert_eq!(result.percentiles.p50, Some(2.0));
        assert_eq!(result.count, 3);
        assert_eq!(result.min, Some(1.0));
        assert_eq!(result.max, Some(3.0));
    }

    #[test]
    fn empty_samples_yield_zero_count() {
        let result = MetricResult::from_samples("x", "X", Unit::Milliseconds, &[]);
        assert_eq!(result.count, 0);
        assert_eq!(result.percentiles.p50, None);
    }

    #[test]
    fn std_is_none_for_single_sample() {
        let result = MetricResult::from_samples("x", "X", Unit::Milliseconds, &[5.0]);
        assert_eq!(result.std, None);
        assert_eq!(result.avg, 5.0);
    }

    #[test]
    fn scalar_carries_no_percentiles() {
        let result = MetricResult::scalar("good_request_count", "Good Request Count", Unit::Requests, 42.0, 42);
        assert_eq!(result.avg, 42.0);
        assert!(result.percentiles.p50.is_none());
    }
}
