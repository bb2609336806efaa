//! User-configured SLO thresholds for goodput (§4.4 Good Request Count).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A run's goodput definition: a metric tag and the threshold a record's
/// value for that metric must satisfy, expressed in the metric's display
/// unit (e.g. milliseconds for a latency threshold). A record is "good" iff
/// every configured threshold is satisfied; with no thresholds configured,
/// goodput is opt-in and no record counts as good.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SloConfig {
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
}

impl SloConfig {
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_thresholds() {
        assert!(SloConfig::default().is_empty());
    }

    #[test]
    fn deserializes_from_a_tag_to_threshold_map() {
        let config: SloConfig = serde_json::from_str(r#"{"thresholds": {"request_latency": 500.0}}"#).unwrap();
        assert_eq!(config.thresholds.get("request_latency"), Some(&500.0));
    }
}
