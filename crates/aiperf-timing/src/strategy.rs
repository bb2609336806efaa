//! Common contract every timing strategy implements (§4.2).

use aiperf_bus::channels::{COMMANDS_TOPIC, CREDITS_QUEUE};
use aiperf_bus::message::Message;
use aiperf_bus::BusClient;
use aiperf_core::clock::{Clock, PerfNs};
use aiperf_core::model::{Credit, CreditPhase, CreditPhaseStats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

/// Either a fixed request count or a wall-clock duration. Warmup and
/// profiling each carry their own `StopCondition`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum StopCondition {
    RequestCount(u64),
    Duration { duration_secs: f64, grace_period_secs: f64 },
}

/// Cooperative cancellation shared by the controller (`ProfileCancel`) and
/// every strategy's sleep loop. A `watch` channel rather than an atomic bool
/// so `cancelled()` can be awaited instead of polled.
#[derive(Clone)]
pub struct CancelToken(watch::Receiver<bool>);

pub struct CancelHandle(watch::Sender<bool>);

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelToken(rx))
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled; resolves immediately if already cancelled.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        let _ = self.0.wait_for(|c| *c).await;
    }
}

/// Everything a strategy needs to emit credits and report completion.
pub struct StrategyContext {
    pub bus: BusClient,
    pub clock: Clock,
    pub cancel: CancelToken,
}

impl StrategyContext {
    pub async fn emit_credit(&self, phase: CreditPhase, conversation_id: Option<String>, turn_index: usize, conversation_num: u64) -> Result<()> {
        let credit = Credit {
            phase,
            conversation_id: conversation_id.clone(),
            turn_index,
            should_cancel: false,
            cancel_after_ns: None,
            credit_drop_perf_ns: self.clock.now_ns(),
            conversation_num,
        };
        self.push_credit(credit).await
    }

    pub async fn push_credit(&self, credit: Credit) -> Result<()> {
        let message = Message::CreditDrop {
            service_id: self.bus.service_id().to_string(),
            request_ns: self.clock.now_ns(),
            phase: credit.phase,
            conversation_id: credit.conversation_id,
            turn_index: credit.turn_index,
            should_cancel: credit.should_cancel,
            cancel_after_ns: credit.cancel_after_ns,
            credit_drop_perf_ns: credit.credit_drop_perf_ns,
            conversation_num: credit.conversation_num,
        };
        self.bus.push(CREDITS_QUEUE, message).await?;
        Ok(())
    }

    pub async fn publish_credits_complete(&self, phase: CreditPhase, stats: CreditPhaseStats) -> Result<()> {
        let message = Message::CreditsComplete {
            service_id: self.bus.service_id().to_string(),
            request_ns: self.clock.now_ns(),
            phase,
            stats,
        };
        self.bus.publish(COMMANDS_TOPIC, message).await?;
        Ok(())
    }

    pub fn now_ns(&self) -> PerfNs {
        self.clock.now_ns()
    }
}

#[async_trait]
pub trait CreditStrategy: Send + Sync {
    /// Run one phase to completion (or cancellation), returning the phase's
    /// final stats. Implementations are responsible for publishing
    /// `CreditsComplete` themselves so they can include phase-specific stats
    /// at the exact moment they decide the phase is done.
    async fn run(&self, ctx: &StrategyContext, phase: CreditPhase, stop: StopCondition) -> Result<CreditPhaseStats>;
}
