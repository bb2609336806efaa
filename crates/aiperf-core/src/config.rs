//! Service configuration loading
//!
//! Each service process boots from a JSON config file on disk (§4.7 step 2):
//! a bootstrap layer resolves a typed config from a single on-disk format
//! rather than supporting multiple interchangeable formats, since every
//! config file here is written and read by this workspace's own processes.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{Error, Result};

/// Load a typed service config from a JSON file written by the controller.
pub fn load_service_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents).map_err(|e| Error::ConfigParse(e.to_string()))
}

/// Serialize a typed service config to a JSON file for a spawned subprocess to read.
pub fn write_service_config<T: serde::Serialize>(path: impl AsRef<Path>, config: &T) -> Result<()> {
    let path = path.as_ref();
    let contents =
        serde_json::to_string_pretty(config).map_err(|e| Error::ConfigParse(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| Error::ConfigLoad(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Example {
        name: String,
        count: u32,
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let original = Example {
            name: "worker-0".into(),
            count: 4,
        };
        write_service_config(&path, &original).unwrap();
        let loaded: Example = load_service_config(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn missing_file_is_config_load_error() {
        let err = load_service_config::<Example>("/nonexistent/path.json").unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }
}
