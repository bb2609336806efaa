//! Metric engine (§4.4)
//!
//! [`registry`] resolves the metric DAG; [`traits`] defines the four metric
//! kinds; [`types`] is the built-in catalogue.

pub mod error;
pub mod evaluation;
pub mod registry;
pub mod result;
pub mod slo;
pub mod traits;
pub mod types;
pub mod unit;

pub use error::MetricError;
pub use evaluation::{evaluate_record, RecordContribution};
pub use registry::{MetricClass, MetricFlags, MetricKind, MetricRegistry};
pub use result::MetricResult;
pub use slo::SloConfig;
pub use traits::{AggregateCounterMetric, AggregateMetric, DerivedMetric, MetricRecordDict, MetricResultsDict, RecordMetric};
pub use unit::Unit;
