//! Per-request timing metrics: time to first token, time to first
//! non-reasoning output, and the streaming-prefill/setup split.

use aiperf_core::model::ParsedResponseRecord;

use crate::error::{MetricError, Result};
use crate::traits::{AggregateMetric, MetricRecordDict, RecordMetric};
use crate::unit::Unit;

pub struct TimeToFirstToken;

impl RecordMetric for TimeToFirstToken {
    fn tag(&self) -> &'static str {
        "time_to_first_token"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        let first = record
            .first_response_ns()
            .ok_or_else(|| MetricError::NoValue(self.tag().to_string()))?;
        Ok((first - record.request.start_perf_ns) as f64)
    }
}

/// Time to the first response that isn't a reasoning block — what a user
/// actually perceives as "the model started answering" for reasoning models.
pub struct TimeToFirstOutput;

impl RecordMetric for TimeToFirstOutput {
    fn tag(&self) -> &'static str {
        "time_to_first_output_token"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        let first_output = record
            .first_non_reasoning_ns()
            .ok_or_else(|| MetricError::NoValue(self.tag().to_string()))?;
        Ok((first_output - record.request.start_perf_ns) as f64)
    }
}

/// Latency between consecutive chunks, one sample per gap (not per record).
pub struct InterChunkLatency;

impl AggregateMetric for InterChunkLatency {
    fn tag(&self) -> &'static str {
        "inter_chunk_latency"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Inter Chunk Latency"
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        if record.responses.len() < 2 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        let gaps: Vec<f64> = record
            .responses
            .windows(2)
            .map(|pair| (pair[1].perf_ns - pair[0].perf_ns) as f64)
            .collect();
        Ok(gaps.iter().sum::<f64>() / gaps.len() as f64)
    }
}

/// Latency between consecutive non-reasoning (visible-output) chunks —
/// Inter-token latency restricted to true output tokens, excluding reasoning.
pub struct InterTokenLatency;

impl AggregateMetric for InterTokenLatency {
    fn tag(&self) -> &'static str {
        "inter_token_latency"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Inter Token Latency"
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        let output_ns: Vec<i64> = record
            .responses
            .iter()
            .filter(|r| !r.data.is_reasoning())
            .map(|r| r.perf_ns)
            .collect();
        if output_ns.len() < 2 {
            return Err(MetricError::NoValue(self.tag().to_string()));
        }
        let gaps: Vec<f64> = output_ns.windows(2).map(|pair| (pair[1] - pair[0]) as f64).collect();
        Ok(gaps.iter().sum::<f64>() / gaps.len() as f64)
    }
}

/// End-to-end request latency: last byte received minus request start.
pub struct RequestLatency;

impl AggregateMetric for RequestLatency {
    fn tag(&self) -> &'static str {
        "request_latency"
    }

    fn unit(&self) -> Unit {
        Unit::Nanoseconds
    }

    fn header(&self) -> &'static str {
        "Request Latency"
    }

    fn parse_record(&self, record: &ParsedResponseRecord, _dict: &MetricRecordDict) -> Result<f64> {
        Ok((record.request.end_perf_ns - record.request.start_perf_ns) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiperf_core::model::{ParsedResponse, RawResponse, RequestRecord, ResponseData};

    fn record(responses: Vec<ParsedResponse>) -> ParsedResponseRecord {
        ParsedResponseRecord {
            request: RequestRecord {
                conversation_id: "c".into(),
                turn_index: 0,
                model_name: "m".into(),
                start_perf_ns: 0,
                end_perf_ns: 100,
                recv_start_perf_ns: None,
                status: Some(200),
                responses: vec![RawResponse::Text("hi".into())],
                error: None,
                delayed: false,
                cancelled: false,
                worker_id: None,
                credit_num: 0,
            },
            responses,
            input_token_count: None,
            output_token_count: None,
            reasoning_token_count: None,
        }
    }

    #[test]
    fn ttft_measures_from_request_start() {
        let r = record(vec![ParsedResponse { perf_ns: 30, data: ResponseData::Text("a".into()) }]);
        let dict = MetricRecordDict::new();
        assert_eq!(TimeToFirstToken.parse_record(&r, &dict).unwrap(), 30.0);
    }

    #[test]
    fn inter_chunk_latency_needs_two_chunks() {
        let r = record(vec![ParsedResponse { perf_ns: 10, data: ResponseData::Text("a".into()) }]);
        let dict = MetricRecordDict::new();
        assert!(InterChunkLatency.parse_record(&r, &dict).is_err());
    }

    #[test]
    fn ttfo_skips_leading_reasoning_responses() {
        let r = record(vec![
            ParsedResponse { perf_ns: 10, data: ResponseData::Reasoning { content: String::new(), reasoning: "r1".into() } },
            ParsedResponse { perf_ns: 20, data: ResponseData::Reasoning { content: String::new(), reasoning: "r2".into() } },
            ParsedResponse { perf_ns: 30, data: ResponseData::Reasoning { content: String::new(), reasoning: "r3".into() } },
            ParsedResponse { perf_ns: 40, data: ResponseData::Text("hi".into()) },
        ]);
        let dict = MetricRecordDict::new();
        assert_eq!(TimeToFirstToken.parse_record(&r, &dict).unwrap(), 10.0);
        assert_eq!(TimeToFirstOutput.parse_record(&r, &dict).unwrap(), 40.0);
    }

    #[test]
    fn inter_chunk_latency_averages_gaps() {
        let r = record(vec![
            ParsedResponse { perf_ns: 10, data: ResponseData::Text("a".into()) },
            ParsedResponse { perf_ns: 25, data: ResponseData::Text("b".into()) },
            ParsedResponse { perf_ns: 40, data: ResponseData::Text("c".into()) },
        ]);
        let dict = MetricRecordDict::new();
        assert_eq!(InterChunkLatency.parse_record(&r, &dict).unwrap(), 15.0);
    }
}
