//! Credit scheduling strategies (§4.2): decide when workers receive a new
//! unit of work and report phase completion back to the controller.

pub mod concurrency;
pub mod error;
pub mod fixed_schedule;
pub mod request_rate;
pub mod strategy;

pub use concurrency::{ConcurrencyConfig, ConcurrencyStrategy};
pub use error::TimingError;
pub use fixed_schedule::{FixedScheduleConfig, FixedScheduleStrategy, ScheduleEntry};
pub use request_rate::{RequestRateConfig, RequestRateStrategy};
pub use strategy::{cancel_pair, CancelHandle, CancelToken, CreditStrategy, StopCondition, StrategyContext};
