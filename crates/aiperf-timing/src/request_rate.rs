//! Poisson (or constant-spacing) credit emission at a target request rate.

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use aiperf_core::model::{CreditPhase, CreditPhaseStats};

use crate::error::Result;
use crate::strategy::{CreditStrategy, StopCondition, StrategyContext};

/// `burstiness == 1.0` reduces to a memoryless exponential inter-arrival
/// (a Poisson process). Smaller values spread arrivals more evenly; larger
/// values cluster them. Mean inter-arrival is held at `1 / requests_per_second`
/// regardless of the chosen shape, matching the GenAI-Perf lineage this
/// strategy is drawn from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RequestRateConfig {
    pub requests_per_second: f64,
    pub burstiness: Option<f64>,
}

pub struct RequestRateStrategy {
    pub config: RequestRateConfig,
}

impl RequestRateStrategy {
    fn next_interval_secs(&self, rng: &mut SmallRng) -> f64 {
        let mean = 1.0 / self.config.requests_per_second;
        match self.config.burstiness {
            None => {
                // Constant spacing: deterministic, no distribution involved.
                mean
            }
            Some(shape) if shape <= 0.0 => mean,
            Some(shape) => {
                let scale = mean / shape;
                let gamma = Gamma::new(shape, scale).expect("shape and scale are both positive");
                gamma.sample(rng)
            }
        }
    }
}

#[async_trait]
impl CreditStrategy for RequestRateStrategy {
    async fn run(&self, ctx: &StrategyContext, phase: CreditPhase, stop: StopCondition) -> Result<CreditPhaseStats> {
        let mut rng = SmallRng::from_os_rng();
        let mut stats = CreditPhaseStats {
            total_expected: match stop {
                StopCondition::RequestCount(n) => Some(n),
                StopCondition::Duration { .. } => None,
            },
            start_perf_ns: Some(ctx.now_ns()),
            ..Default::default()
        };

        let deadline = match stop {
            StopCondition::Duration { duration_secs, .. } => Some(duration_secs),
            StopCondition::RequestCount(_) => None,
        };
        let started_at = ctx.now_ns();
        let mut cancel = ctx.cancel.clone();
        let mut conversation_num = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let StopCondition::RequestCount(n) = stop {
                if stats.sent >= n {
                    break;
                }
            }
            if let Some(duration_secs) = deadline {
                let elapsed_s = (ctx.now_ns() - started_at) as f64 / 1e9;
                if elapsed_s >= duration_secs {
                    break;
                }
            }

            ctx.emit_credit(phase, None, 0, conversation_num).await?;
            stats.sent += 1;
            conversation_num += 1;

            let interval = self.next_interval_secs(&mut rng);
            tokio::select! {
                _ = sleep(Duration::from_secs_f64(interval.max(0.0))) => {}
                _ = cancel.cancelled() => break,
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

    #[test]
    fn constant_spacing_equals_the_mean_interval() {
        let strategy = RequestRateStrategy {
            config: RequestRateConfig { requests_per_second: 10.0, burstiness: None },
        };
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(strategy.next_interval_secs(&mut rng), 0.1);
    }

    #[test]
    fn gamma_sampling_stays_non_negative() {
        let strategy = RequestRateStrategy {
            config: RequestRateConfig { requests_per_second: 5.0, burstiness: Some(1.0) },
        };
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..100 {
            assert!(strategy.next_interval_secs(&mut rng) >= 0.0);
        }
    }

    #[test]
    fn non_positive_burstiness_falls_back_to_the_mean() {
        let strategy = RequestRateStrategy {
            config: RequestRateConfig { requests_per_second: 4.0, burstiness: Some(0.0) },
        };
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(strategy.next_interval_secs(&mut rng), 0.25);
    }
}
