//! `inputs.json` intermediate artifact (§6): the endpoint-formatted payload
//! for every turn, written once by the dataset manager after loading.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{DatasetError, Result};

#[derive(Debug, Serialize)]
struct InputsSession {
    session_id: String,
    payloads: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct InputsFile {
    data: Vec<InputsSession>,
}

pub fn write_inputs_json(path: &Path, sessions: Vec<(String, Vec<Value>)>) -> Result<()> {
    let file = InputsFile {
        data: sessions
            .into_iter()
            .map(|(session_id, payloads)| InputsSession { session_id, payloads })
            .collect(),
    };
    let json = serde_json::to_vec_pretty(&file)?;
    std::fs::write(path, json).map_err(|source| DatasetError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_one_session_entry_per_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inputs.json");
        write_inputs_json(&path, vec![("s1".to_string(), vec![json!({"prompt": "hi"})])]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["data"][0]["session_id"], "s1");
        assert_eq!(parsed["data"][0]["payloads"][0]["prompt"], "hi");
    }
}
