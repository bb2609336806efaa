//! Token-timeline reconstruction: turns a [`RequestRecord`] plus its
//! [`crate::openai::ExtractedRecord`] into the [`ParsedResponseRecord`]
//! published on the bus.
//!
//! Token counts come from the endpoint's own `usage` field when the endpoint
//! reports one. Streaming endpoints that omit `usage` (most providers do,
//! unless `stream_options.include_usage` was set) fall back to counting
//! non-empty content chunks — one content-bearing SSE frame is, in practice,
//! one token for the OpenAI-compatible chunking APIs this parser targets.

use aiperf_core::model::{ParsedResponseRecord, RequestRecord, ResponseData};

use crate::error::Result;
use crate::openai::{self, ExtractedRecord};

pub fn reconstruct(request: RequestRecord) -> Result<ParsedResponseRecord> {
    let extracted = openai::extract(&request)?;
    Ok(finish(request, extracted))
}

fn finish(request: RequestRecord, extracted: ExtractedRecord) -> ParsedResponseRecord {
    let is_streaming = extracted.responses.len() > 1;

    let output_token_count = extracted.output_token_count.or_else(|| {
        if is_streaming {
            Some(
                extracted
                    .responses
                    .iter()
                    .filter(|r| matches!(&r.data, ResponseData::Text(t) if !t.is_empty()))
                    .count() as u64,
            )
        } else {
            None
        }
    });

    let reasoning_token_count = extracted.reasoning_token_count.or_else(|| {
        if is_streaming {
            Some(
                extracted
                    .responses
                    .iter()
                    .filter(|r| matches!(&r.data, ResponseData::Reasoning { reasoning, .. } if !reasoning.is_empty()))
                    .count() as u64,
            )
        } else {
            None
        }
    });

    ParsedResponseRecord {
        request,
        responses: extracted.responses,
        input_token_count: extracted.input_token_count,
        output_token_count,
        reasoning_token_count,
    }
}
