//! Semaphore-capped in-flight credit emission, acked via `CreditReturn`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aiperf_bus::channels::CREDIT_RETURNS_TOPIC;
use aiperf_bus::message::Message;
use aiperf_core::model::{CreditPhase, CreditPhaseStats};

use crate::error::Result;
use crate::strategy::{CreditStrategy, StopCondition, StrategyContext};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub concurrency: u64,
}

pub struct ConcurrencyStrategy {
    pub config: ConcurrencyConfig,
}

#[async_trait]
impl CreditStrategy for ConcurrencyStrategy {
    async fn run(&self, ctx: &StrategyContext, phase: CreditPhase, stop: StopCondition) -> Result<CreditPhaseStats> {
        let mut stats = CreditPhaseStats {
            total_expected: match stop {
                StopCondition::RequestCount(n) => Some(n),
                StopCondition::Duration { .. } => None,
            },
            start_perf_ns: Some(ctx.now_ns()),
            ..Default::default()
        };

        // Subscribed before the first credit is emitted: acks for the very
        // first in-flight batch must not be missed.
        let mut acks = ctx.bus.subscribe(CREDIT_RETURNS_TOPIC);
        let mut cancel = ctx.cancel.clone();
        let started_at = ctx.now_ns();
        let deadline_secs = match stop {
            StopCondition::Duration { duration_secs, .. } => Some(duration_secs),
            StopCondition::RequestCount(_) => None,
        };
        let mut conversation_num = 0u64;
        let mut in_flight = 0u64;

        let phase_done = |sent: u64| match stop {
            StopCondition::RequestCount(n) => sent >= n,
            StopCondition::Duration { .. } => {
                let elapsed_s = (ctx.now_ns() - started_at) as f64 / 1e9;
                deadline_secs.map(|d| elapsed_s >= d).unwrap_or(false)
            }
        };

        while in_flight < self.config.concurrency && !phase_done(stats.sent) && !cancel.is_cancelled() {
            ctx.emit_credit(phase, None, 0, conversation_num).await?;
            stats.sent += 1;
            conversation_num += 1;
            in_flight += 1;
        }

        loop {
            if in_flight == 0 && (phase_done(stats.sent) || cancel.is_cancelled()) {
                break;
            }

            tokio::select! {
                ack = acks.recv() => {
                    match ack {
                        Ok(Message::CreditReturn { errored, .. }) => {
                            in_flight = in_flight.saturating_sub(1);
                            stats.completed += 1;
                            if errored {
                                stats.errors += 1;
                            }
                            if !phase_done(stats.sent) && !cancel.is_cancelled() {
                                ctx.emit_credit(phase, None, 0, conversation_num).await?;
                                stats.sent += 1;
                                conversation_num += 1;
                                in_flight += 1;
                            }
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        stats.end_perf_ns = Some(ctx.now_ns());
        ctx.publish_credits_complete(phase, stats.clone()).await?;
        Ok(stats)
    }
}
