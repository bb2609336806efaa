//! Timestamp-grouped credit emission replaying a recorded trace (§4.2).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, Duration, Instant};

use aiperf_core::model::{CreditPhase, CreditPhaseStats};

use crate::error::Result;
use crate::strategy::{CreditStrategy, StopCondition, StrategyContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub timestamp_ms: i64,
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedScheduleConfig {
    pub entries: Vec<ScheduleEntry>,
    pub auto_offset_timestamps: bool,
    pub manual_offset_ms: Option<i64>,
    pub speedup: f64,
}

impl FixedScheduleConfig {
    fn schedule_zero_ms(&self) -> i64 {
        if let Some(offset) = self.manual_offset_ms {
            return offset;
        }
        if self.auto_offset_timestamps {
            return self.entries.iter().map(|e| e.timestamp_ms).min().unwrap_or(0);
        }
        0
    }

    fn effective_ms(&self, t: i64, zero: i64) -> f64 {
        (t - zero) as f64 / self.speedup
    }

    /// Entries grouped by timestamp, ascending, preserving within-group order.
    fn groups(&self) -> Vec<(i64, Vec<&ScheduleEntry>)> {
        let mut grouped: BTreeMap<i64, Vec<&ScheduleEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.timestamp_ms).or_default().push(entry);
        }
        grouped.into_iter().collect()
    }
}

pub struct FixedScheduleStrategy {
    pub config: FixedScheduleConfig,
}

#[async_trait]
impl CreditStrategy for FixedScheduleStrategy {
    async fn run(&self, ctx: &StrategyContext, phase: CreditPhase, _stop: StopCondition) -> Result<CreditPhaseStats> {
        let mut stats = CreditPhaseStats {
            total_expected: Some(self.config.entries.len() as u64),
            start_perf_ns: Some(ctx.now_ns()),
            ..Default::default()
        };

        let zero = self.config.schedule_zero_ms();
        let run_start = Instant::now();
        let mut cancel = ctx.cancel.clone();
        let mut conversation_num = 0u64;

        for (timestamp_ms, group) in self.config.groups() {
            if cancel.is_cancelled() {
                break;
            }

            let effective_ms = self.config.effective_ms(timestamp_ms, zero);
            if effective_ms > 0.0 {
                let deadline = run_start + Duration::from_secs_f64(effective_ms / 1000.0);
                tokio::select! {
                    _ = sleep_until(deadline) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            // effective_ms <= 0 emits immediately, without sleeping.

            if cancel.is_cancelled() {
                break;
            }

            for entry in &group {
                ctx.emit_credit(phase, Some(entry.conversation_id.clone()), 0, conversation_num).await?;
                stats.sent += 1;
                conversation_num += 1;
            }
        }

        stats.end_perf_ns = Some(ctx.now_ns());
        ctx.publish_credits_complete(phase, stats.clone()).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp_ms: i64, conversation_id: &str) -> ScheduleEntry {
        ScheduleEntry { timestamp_ms, conversation_id: conversation_id.to_string() }
    }

    #[test]
    fn auto_offset_zeroes_on_the_earliest_timestamp() {
        let config = FixedScheduleConfig {
            entries: vec![entry(1000, "a"), entry(1500, "b")],
            auto_offset_timestamps: true,
            manual_offset_ms: None,
            speedup: 1.0,
        };
        assert_eq!(config.schedule_zero_ms(), 1000);
        assert_eq!(config.effective_ms(1500, config.schedule_zero_ms()), 500.0);
    }

    #[test]
    fn manual_offset_wins_over_auto_offset() {
        let config = FixedScheduleConfig {
            entries: vec![entry(1000, "a")],
            auto_offset_timestamps: true,
            manual_offset_ms: Some(200),
            speedup: 1.0,
        };
        assert_eq!(config.schedule_zero_ms(), 200);
    }

    #[test]
    fn speedup_divides_the_inter_event_delay() {
        let config = FixedScheduleConfig {
            entries: vec![entry(0, "a"), entry(2000, "b")],
            auto_offset_timestamps: true,
            manual_offset_ms: None,
            speedup: 2.0,
        };
        let zero = config.schedule_zero_ms();
        assert_eq!(config.effective_ms(2000, zero), 1000.0);
    }

    #[tokio::test]
    async fn run_emits_credits_at_the_speedup_adjusted_offsets() {
        use aiperf_bus::channels::CREDITS_QUEUE;
        use aiperf_bus::message::Message;
        use aiperf_bus::{BusClient, BusTransport, LocalBus};
        use std::sync::Arc;
        use tokio::time::Instant;

        let transport: Arc<dyn BusTransport> = Arc::new(LocalBus::new());
        let harness = BusClient::new("test-harness", transport.clone());

        let config = FixedScheduleConfig {
            entries: vec![entry(0, "a"), entry(200, "b"), entry(400, "c")],
            auto_offset_timestamps: false,
            manual_offset_ms: Some(0),
            speedup: 2.0,
        };
        let strategy = FixedScheduleStrategy { config };
        let (_cancel_handle, cancel_token) = crate::strategy::cancel_pair();
        let ctx = StrategyContext { bus: BusClient::new("fixed-schedule", transport), clock: aiperf_core::clock::Clock::new(), cancel: cancel_token };

        let start = Instant::now();
        let mut observed_ms = Vec::new();
        let run = tokio::spawn(async move { strategy.run(&ctx, CreditPhase::Warmup, StopCondition::RequestCount(0)).await });

        for _ in 0..3 {
            let Message::CreditDrop { .. } = harness.pull(CREDITS_QUEUE).await.unwrap() else { panic!("expected CreditDrop") };
            observed_ms.push(start.elapsed().as_millis() as i64);
        }
        run.await.unwrap().unwrap();

        for (observed, expected) in observed_ms.iter().zip([0, 100, 200]) {
            assert!((observed - expected).abs() <= 20, "observed {observed}ms too far from expected {expected}ms");
        }
    }

    #[test]
    fn equal_timestamps_form_one_group() {
        let config = FixedScheduleConfig {
            entries: vec![entry(500, "a"), entry(500, "b"), entry(900, "c")],
            auto_offset_timestamps: false,
            manual_offset_ms: None,
            speedup: 1.0,
        };
        let groups = config.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 2);
    }
}
