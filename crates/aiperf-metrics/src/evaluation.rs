//! Worker-side per-record evaluation (§4.4 "Per-record evaluation"):
//! RecordMetrics and the per-record contribution of AggregateMetrics and
//! AggregateCounterMetrics, in the registry's topological order.

use aiperf_core::model::ParsedResponseRecord;

use crate::error::Result;
use crate::registry::MetricRegistry;
use crate::slo::SloConfig;
use crate::traits::{AggregateCounterMetric, AggregateMetric, DerivedMetric, MetricRecordDict, RecordMetric};
use crate::types::benchmark::{BenchmarkTokenCount, MaxRequestLatency, MinRequestLatency};
use crate::types::latency::{InterChunkLatency, InterTokenLatency, RequestLatency, TimeToFirstOutput, TimeToFirstToken};
use crate::types::throughput::{
    ErrorRequestCount, GoodRequestCount, OutputInferenceSpeed, OutputSequenceLength, OutputTokenThroughput,
    OutputTokenThroughputPerUser, OverallTokenEfficiency, RequestThroughput, TotalOutputTokens, TotalReasoningTokens,
    ValidRequestCount,
};
use crate::unit::Unit;

pub fn record_metrics() -> Vec<Box<dyn RecordMetric>> {
    vec![Box::new(TimeToFirstToken), Box::new(TimeToFirstOutput)]
}

pub fn aggregate_metrics() -> Vec<Box<dyn AggregateMetric>> {
    vec![
        Box::new(InterChunkLatency),
        Box::new(InterTokenLatency),
        Box::new(RequestLatency),
        Box::new(OutputSequenceLength),
        Box::new(OutputInferenceSpeed),
    ]
}

/// `GoodRequestCount` is resolved against `registry`/`slo` here rather than
/// built with zero arguments like the other counters, since its thresholds
/// are run configuration, not a fixed formula.
pub fn aggregate_counter_metrics(registry: &MetricRegistry, slo: &SloConfig) -> Result<Vec<Box<dyn AggregateCounterMetric>>> {
    Ok(vec![
        Box::new(TotalOutputTokens),
        Box::new(TotalReasoningTokens),
        Box::new(ValidRequestCount),
        Box::new(GoodRequestCount::new(registry, slo)?),
        Box::new(ErrorRequestCount),
    ])
}

/// Every `DerivedMetric`, computed once at finalization from the other
/// three kinds' aggregated results. `BenchmarkDuration` is excluded: the
/// records manager populates it directly from `CreditPhaseStats` rather
/// than deriving it, since it has no `required_metrics` of its own.
pub fn derived_metrics() -> Vec<Box<dyn DerivedMetric>> {
    vec![
        Box::new(BenchmarkTokenCount),
        Box::new(MinRequestLatency),
        Box::new(MaxRequestLatency),
        Box::new(RequestThroughput),
        Box::new(OutputTokenThroughput),
        Box::new(OutputTokenThroughputPerUser),
        Box::new(OverallTokenEfficiency),
    ]
}

/// One metric's per-record contribution, carrying the unit it was computed
/// in so the caller can convert for display or wire transmission.
pub struct RecordContribution {
    pub tag: &'static str,
    pub value: f64,
    pub unit: Unit,
}

/// Evaluates every enabled metric against one record, in registry order,
/// skipping a metric silently when its dependencies aren't present in the
/// dict (§4.4: "On `NoMetricValue`, skip silently").
///
/// Runs in two passes: every `RecordMetric`/`AggregateMetric` first, then
/// every `AggregateCounterMetric`. Counters (`good_request_count` in
/// particular) may read other metrics' values out of the dict, and those
/// values need to be final before any counter runs, regardless of where
/// "good_request_count" happens to fall in the registry's own alphabetical
/// tiebreak for unrelated metrics.
///
/// Returns both the working dict (useful for dependents within the same
/// call) and the flat list of contributions a worker pushes onto the bus.
pub fn evaluate_record(
    registry: &MetricRegistry,
    record: &ParsedResponseRecord,
    is_streaming: bool,
    produces_tokens: bool,
    slo: &SloConfig,
) -> Result<(MetricRecordDict, Vec<RecordContribution>)> {
    let record_impls = record_metrics();
    let aggregate_impls = aggregate_metrics();
    let counter_impls = aggregate_counter_metrics(registry, slo)?;

    let enabled: Vec<&'static str> = registry.enabled_for_endpoint(is_streaming, produces_tokens).iter().map(|c| c.tag).collect();

    let mut dict = MetricRecordDict::new();
    let mut contributions = Vec::new();

    for tag in registry.evaluation_order() {
        if !enabled.contains(tag) {
            continue;
        }

        if let Some(metric) = record_impls.iter().find(|m| m.tag() == *tag) {
            if let Ok(value) = metric.parse_record(record, &dict) {
                dict.insert(metric.tag(), value);
                contributions.push(RecordContribution { tag: metric.tag(), value, unit: metric.unit() });
            }
            continue;
        }

        if let Some(metric) = aggregate_impls.iter().find(|m| m.tag() == *tag) {
            if let Ok(value) = metric.parse_record(record, &dict) {
                dict.insert(metric.tag(), value);
                contributions.push(RecordContribution { tag: metric.tag(), value, unit: metric.unit() });
            }
        }
    }

    for tag in registry.evaluation_order() {
        if !enabled.contains(tag) {
            continue;
        }
        if let Some(metric) = counter_impls.iter().find(|m| m.tag() == *tag) {
            if let Ok(value) = metric.record_value(record, &dict) {
                dict.insert(metric.tag(), value);
                contributions.push(RecordContribution { tag: metric.tag(), value, unit: metric.unit() });
            }
        }
    }

    Ok((dict, contributions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builtin_classes;
    use aiperf_core::model::{ParsedResponse, RawResponse, RequestRecord, ResponseData};

    fn streaming_record() -> ParsedResponseRecord {
        ParsedResponseRecord {
            request: RequestRecord {
                conversation_id: "c".into(),
                turn_index: 0,
                model_name: "m".into(),
                start_perf_ns: 0,
                end_perf_ns: 100,
                recv_start_perf_ns: Some(10),
                status: Some(200),
                responses: vec![RawResponse::Text("hi".into())],
                error: None,
                delayed: false,
                cancelled: false,
                worker_id: None,
                credit_num: 0,
            },
            responses: vec![
                ParsedResponse { perf_ns: 10, data: ResponseData::Text("a".into()) },
                ParsedResponse { perf_ns: 40, data: ResponseData::Text("b".into()) },
            ],
            input_token_count: Some(3),
            output_token_count: Some(2),
            reasoning_token_count: None,
        }
    }

    #[test]
    fn evaluates_ttft_and_aggregate_contributions_for_a_streaming_record() {
        let registry = MetricRegistry::build(builtin_classes()).unwrap();
        let record = streaming_record();
        let (dict, contributions) = evaluate_record(&registry, &record, true, true, &SloConfig::default()).unwrap();

        assert_eq!(dict.get("time_to_first_token").unwrap(), 10.0);
        assert_eq!(dict.get("request_latency").unwrap(), 100.0);
        assert!(contributions.iter().any(|c| c.tag == "valid_request_count" && c.value == 1.0));
        // no SLOs configured: goodput stays opt-in, no record counts as good.
        assert!(contributions.iter().any(|c| c.tag == "good_request_count" && c.value == 0.0));
    }

    #[test]
    fn non_streaming_endpoint_skips_streaming_only_metrics() {
        let registry = MetricRegistry::build(builtin_classes()).unwrap();
        let record = streaming_record();
        let (dict, _) = evaluate_record(&registry, &record, false, true, &SloConfig::default()).unwrap();
        assert!(!dict.contains("time_to_first_token"));
    }

    #[test]
    fn good_request_count_sees_request_latency_within_the_same_record() {
        let registry = MetricRegistry::build(builtin_classes()).unwrap();
        let record = streaming_record();
        let slo = SloConfig { thresholds: [("request_latency".to_string(), 1_000.0)].into_iter().collect() };
        let (_, contributions) = evaluate_record(&registry, &record, true, true, &slo).unwrap();
        // request_latency is 100ns = well under the 1000ms threshold, so the
        // record is good despite `good_request_count` sorting alphabetically
        // ahead of `request_latency` in the registry's own tiebreak order.
        assert!(contributions.iter().any(|c| c.tag == "good_request_count" && c.value == 1.0));
    }
}
