//! Built-in metric catalogue, grouped by shape rather than one file per
//! metric: latency metrics, throughput/token-accounting metrics, and
//! run-wide summary metrics.

pub mod benchmark;
pub mod latency;
pub mod throughput;

use crate::registry::{MetricClass, MetricFlags, MetricKind};
use crate::unit::Unit;

/// Static descriptors for every built-in metric, in the order the CLI
/// displays them by default. `MetricRegistry::build` still resolves a
/// dependency-respecting evaluation order from this list.
pub fn builtin_classes() -> Vec<MetricClass> {
    vec![
        MetricClass {
            tag: "time_to_first_token",
            header: "Time To First Token",
            short_header: "TTFT",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::STREAMING_ONLY,
            required_metrics: &[],
            display_order: 0,
            kind: MetricKind::Record,
        },
        MetricClass {
            tag: "time_to_first_output_token",
            header: "Time To First Output Token",
            short_header: "TTFO",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::STREAMING_ONLY.union(MetricFlags::SUPPORTS_REASONING),
            required_metrics: &[],
            display_order: 1,
            kind: MetricKind::Record,
        },
        MetricClass {
            tag: "inter_chunk_latency",
            header: "Inter Chunk Latency",
            short_header: "ICL",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::STREAMING_ONLY,
            required_metrics: &[],
            display_order: 2,
            kind: MetricKind::Aggregate,
        },
        MetricClass {
            tag: "inter_token_latency",
            header: "Inter Token Latency",
            short_header: "ITL",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::STREAMING_TOKENS_ONLY,
            required_metrics: &[],
            display_order: 3,
            kind: MetricKind::Aggregate,
        },
        MetricClass {
            tag: "request_latency",
            header: "Request Latency",
            short_header: "Latency",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::NONE,
            required_metrics: &[],
            display_order: 4,
            kind: MetricKind::Aggregate,
        },
        MetricClass {
            tag: "output_sequence_length",
            header: "Output Sequence Length",
            short_header: "OSL",
            unit: Unit::Tokens,
            display_unit: None,
            flags: MetricFlags::PRODUCES_TOKENS_ONLY,
            required_metrics: &[],
            display_order: 5,
            kind: MetricKind::Aggregate,
        },
        MetricClass {
            tag: "output_inference_speed",
            header: "Output Inference Speed",
            short_header: "Inference Speed",
            unit: Unit::TokensPerSecond,
            display_unit: None,
            flags: MetricFlags::STREAMING_TOKENS_ONLY,
            required_metrics: &["inter_token_latency"],
            display_order: 6,
            kind: MetricKind::Aggregate,
        },
        MetricClass {
            tag: "valid_request_count",
            header: "Valid Request Count",
            short_header: "Valid Requests",
            unit: Unit::Requests,
            display_unit: None,
            flags: MetricFlags::INTERNAL,
            required_metrics: &[],
            display_order: 7,
            kind: MetricKind::AggregateCounter,
        },
        MetricClass {
            tag: "good_request_count",
            header: "Good Request Count",
            short_header: "Good Requests",
            unit: Unit::Requests,
            display_unit: None,
            flags: MetricFlags::GOODPUT,
            required_metrics: &[],
            display_order: 8,
            kind: MetricKind::AggregateCounter,
        },
        MetricClass {
            tag: "error_request_count",
            header: "Error Request Count",
            short_header: "Errors",
            unit: Unit::Requests,
            display_unit: None,
            flags: MetricFlags::ERROR_ONLY,
            required_metrics: &[],
            display_order: 9,
            kind: MetricKind::AggregateCounter,
        },
        MetricClass {
            tag: "total_output_tokens",
            header: "Total Output Tokens",
            short_header: "Output Tokens",
            unit: Unit::Tokens,
            display_unit: None,
            flags: MetricFlags::PRODUCES_TOKENS_ONLY,
            required_metrics: &[],
            display_order: 10,
            kind: MetricKind::AggregateCounter,
        },
        MetricClass {
            tag: "total_reasoning_tokens",
            header: "Total Reasoning Tokens",
            short_header: "Reasoning Tokens",
            unit: Unit::Tokens,
            display_unit: None,
            flags: MetricFlags::PRODUCES_TOKENS_ONLY.union(MetricFlags::SUPPORTS_REASONING),
            required_metrics: &[],
            display_order: 11,
            kind: MetricKind::AggregateCounter,
        },
        MetricClass {
            tag: "benchmark_duration",
            header: "Benchmark Duration",
            short_header: "Duration",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Seconds),
            flags: MetricFlags::INTERNAL,
            required_metrics: &[],
            display_order: 12,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "benchmark_token_count",
            header: "Benchmark Token Count",
            short_header: "Token Count",
            unit: Unit::Tokens,
            display_unit: None,
            flags: MetricFlags::PRODUCES_TOKENS_ONLY,
            required_metrics: &["total_output_tokens"],
            display_order: 13,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "request_throughput",
            header: "Request Throughput",
            short_header: "Req/sec",
            unit: Unit::RequestsPerSecond,
            display_unit: None,
            flags: MetricFlags::LARGER_IS_BETTER,
            required_metrics: &["valid_request_count", "benchmark_duration"],
            display_order: 14,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "output_token_throughput",
            header: "Output Token Throughput",
            short_header: "Output Tok/sec",
            unit: Unit::TokensPerSecond,
            display_unit: None,
            flags: MetricFlags::LARGER_IS_BETTER.union(MetricFlags::PRODUCES_TOKENS_ONLY),
            required_metrics: &["total_output_tokens", "benchmark_duration"],
            display_order: 15,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "output_token_throughput_per_user",
            header: "Output Token Throughput Per User",
            short_header: "Tok/sec/User",
            unit: Unit::TokensPerSecondPerUser,
            display_unit: None,
            flags: MetricFlags::LARGER_IS_BETTER.union(MetricFlags::STREAMING_TOKENS_ONLY),
            required_metrics: &["inter_token_latency"],
            display_order: 16,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "overall_token_efficiency",
            header: "Overall Token Efficiency",
            short_header: "Token Efficiency",
            unit: Unit::Ratio,
            display_unit: None,
            flags: MetricFlags::SUPPORTS_REASONING.union(MetricFlags::EXPERIMENTAL),
            required_metrics: &["total_reasoning_tokens", "total_output_tokens"],
            display_order: 17,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "min_request_latency",
            header: "Min Request Latency",
            short_header: "Min Latency",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::HIDDEN,
            required_metrics: &["request_latency"],
            display_order: 18,
            kind: MetricKind::Derived,
        },
        MetricClass {
            tag: "max_request_latency",
            header: "Max Request Latency",
            short_header: "Max Latency",
            unit: Unit::Nanoseconds,
            display_unit: Some(Unit::Milliseconds),
            flags: MetricFlags::HIDDEN,
            required_metrics: &["request_latency"],
            display_order: 19,
            kind: MetricKind::Derived,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricRegistry;

    #[test]
    fn builtin_classes_form_a_valid_registry() {
        let registry = MetricRegistry::build(builtin_classes()).unwrap();
        assert!(registry.class("output_token_throughput_per_user").is_some());
        let order = registry.evaluation_order();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("inter_token_latency") < pos("output_token_throughput_per_user"));
        assert!(pos("total_output_tokens") < pos("overall_token_efficiency"));
        assert!(pos("valid_request_count") < pos("request_throughput"));
        assert!(registry.class("good_request_count").unwrap().flags.contains(MetricFlags::GOODPUT));
    }
}
