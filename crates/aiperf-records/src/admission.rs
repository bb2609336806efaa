//! Admission filtering (§4.6): decide whether a record counts toward the
//! PROFILING phase result.

use aiperf_bus::message::MetricRecordPayload;

use crate::config::BenchmarkMode;

/// `RequestCount` runs admit everything; `Duration` runs admit a record iff
/// its start timestamp plus request latency falls inside
/// `start_time_ns + (duration + grace_period) * 1e9`. Missing latency can't
/// be checked, so it's admitted rather than dropped.
pub struct AdmissionFilter {
    mode: BenchmarkMode,
    start_time_ns: i64,
}

impl AdmissionFilter {
    pub fn new(mode: BenchmarkMode, start_time_ns: i64) -> Self {
        Self { mode, start_time_ns }
    }

    pub fn admit(&self, record: &MetricRecordPayload) -> bool {
        let BenchmarkMode::Duration { duration_secs, grace_period_secs } = self.mode else {
            return true;
        };

        let Some(latency) = record.values.get("request_latency") else {
            return true;
        };

        let deadline_ns = self.start_time_ns as f64 + (duration_secs + grace_period_secs) * 1e9;
        let completes_at_ns = record.metadata.start_perf_ns as f64 + latency.value;
        completes_at_ns <= deadline_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiperf_core::model::{MetricValue, RecordMetadata};
    use std::collections::HashMap;

    fn payload(start_perf_ns: i64, latency_ns: f64) -> MetricRecordPayload {
        let mut values = HashMap::new();
        values.insert("request_latency".to_string(), MetricValue { value: latency_ns, unit: "ns".into() });
        MetricRecordPayload {
            metadata: RecordMetadata {
                phase: aiperf_core::model::CreditPhase::Profiling,
                conversation_id: "c".into(),
                turn_index: 0,
                start_perf_ns,
                end_perf_ns: start_perf_ns + latency_ns as i64,
                model_name: "m".into(),
                error: None,
            },
            values,
            error: None,
        }
    }

    #[test]
    fn request_count_mode_admits_everything() {
        let filter = AdmissionFilter::new(BenchmarkMode::RequestCount, 1_000_000_000);
        assert!(filter.admit(&payload(999_999_999_999_999, 999_999_999_999_999.0)));
    }

    #[test]
    fn duration_mode_admits_within_grace_period() {
        let filter = AdmissionFilter::new(
            BenchmarkMode::Duration { duration_secs: 2.0, grace_period_secs: 1.0 },
            1_000_000_000,
        );
        let start = 1_000_000_000 + (1.5 * 1e9) as i64;
        assert!(filter.admit(&payload(start, 1.4 * 1e9)));
    }

    #[test]
    fn duration_mode_rejects_past_grace_period() {
        let filter = AdmissionFilter::new(
            BenchmarkMode::Duration { duration_secs: 2.0, grace_period_secs: 1.0 },
            1_000_000_000,
        );
        let start = 1_000_000_000 + (1.5 * 1e9) as i64;
        assert!(!filter.admit(&payload(start, 1.6 * 1e9)));
    }

    #[test]
    fn missing_latency_is_admitted() {
        let filter = AdmissionFilter::new(
            BenchmarkMode::Duration { duration_secs: 2.0, grace_period_secs: 0.0 },
            1_000_000_000,
        );
        let record = MetricRecordPayload {
            metadata: RecordMetadata {
                phase: aiperf_core::model::CreditPhase::Profiling,
                conversation_id: "c".into(),
                turn_index: 0,
                start_perf_ns: 999_999_999_999,
                end_perf_ns: 999_999_999_999,
                model_name: "m".into(),
                error: None,
            },
            values: HashMap::new(),
            error: None,
        };
        assert!(filter.admit(&record));
    }
}
