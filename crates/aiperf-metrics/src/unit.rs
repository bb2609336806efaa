//! Typed units for metric values (§4.4)
//!
//! Every metric declares the `Unit` its raw value is computed in; a separate
//! `display_unit` on the metric class can request a conversion at export
//! time (e.g. nanoseconds stored internally, milliseconds displayed). Units
//! that aren't comparable refuse to convert rather than silently scaling.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Nanoseconds,
    Milliseconds,
    Seconds,
    Tokens,
    Requests,
    Ratio,
    Bytes,
    TokensPerSecond,
    TokensPerSecondPerUser,
    RequestsPerSecond,
    Count,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::Nanoseconds => "ns",
            Unit::Milliseconds => "ms",
            Unit::Seconds => "s",
            Unit::Tokens => "tokens",
            Unit::Requests => "requests",
            Unit::Ratio => "ratio",
            Unit::Bytes => "bytes",
            Unit::TokensPerSecond => "tokens/sec",
            Unit::TokensPerSecondPerUser => "tokens/sec/user",
            Unit::RequestsPerSecond => "requests/sec",
            Unit::Count => "count",
        }
    }

    fn time_scale_to_seconds(&self) -> Option<f64> {
        match self {
            Unit::Nanoseconds => Some(1e-9),
            Unit::Milliseconds => Some(1e-3),
            Unit::Seconds => Some(1.0),
            _ => None,
        }
    }

    /// Convert `value` (in `self` units) into `target` units. Returns `None`
    /// when the two units aren't in the same dimension (time-to-time is the
    /// only conversion family metrics in this crate ever need).
    pub fn convert(&self, value: f64, target: Unit) -> Option<f64> {
        if *self == target {
            return Some(value);
        }
        let from_scale = self.time_scale_to_seconds()?;
        let to_scale = target.time_scale_to_seconds()?;
        Some(value * from_scale / to_scale)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_nanoseconds_to_milliseconds() {
        assert_eq!(Unit::Nanoseconds.convert(1_000_000.0, Unit::Milliseconds), Some(1.0));
    }

    #[test]
    fn refuses_cross_dimension_conversion() {
        assert_eq!(Unit::Tokens.convert(10.0, Unit::Seconds), None);
    }

    #[test]
    fn identity_conversion_is_always_some() {
        assert_eq!(Unit::Ratio.convert(0.5, Unit::Ratio), Some(0.5));
    }

    #[test]
    fn converting_there_and_back_recovers_the_original_value() {
        let original = 2_500_000.0;
        let ms = Unit::Nanoseconds.convert(original, Unit::Milliseconds).unwrap();
        let back = Unit::Milliseconds.convert(ms, Unit::Nanoseconds).unwrap();
        assert!((back - original).abs() < 1e-6);
    }
}
