//! Buffered single-file JSONL writer for `profile_export.jsonl` (§4.6, §6).
//!
//! One file for the whole run rather than a per-session, LRU-cached set of
//! files — a benchmark run has exactly one export stream.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use aiperf_core::model::MetricRecordInfo;

use crate::error::{RecordsError, Result};

pub struct ExportWriter {
    path: PathBuf,
    file: Mutex<BufWriter<tokio::fs::File>>,
    flush_batch_size: usize,
    pending: Mutex<usize>,
}

impl ExportWriter {
    pub async fn create(path: impl Into<PathBuf>, flush_batch_size: usize) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| RecordsError::Io { path: parent.to_path_buf(), source })?;
        }
        let file = open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(BufWriter::new(file)),
            flush_batch_size: flush_batch_size.max(1),
            pending: Mutex::new(0),
        })
    }

    pub async fn write(&self, info: &MetricRecordInfo) -> Result<()> {
        let mut line = serde_json::to_vec(info)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(|source| RecordsError::Io { path: self.path.clone(), source })?;

        let mut pending = self.pending.lock().await;
        *pending += 1;
        if *pending >= self.flush_batch_size {
            file.flush().await.map_err(|source| RecordsError::Io { path: self.path.clone(), source })?;
            *pending = 0;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush().await.map_err(|source| RecordsError::Io { path: self.path.clone(), source })?;
        *self.pending.lock().await = 0;
        Ok(())
    }
}

async fn open(path: &Path) -> Result<tokio::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|source| RecordsError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiperf_core::model::RecordMetadata;
    use std::collections::HashMap;

    fn record() -> MetricRecordInfo {
        MetricRecordInfo {
            metadata: RecordMetadata {
                phase: aiperf_core::model::CreditPhase::Profiling,
                conversation_id: "c".into(),
                turn_index: 0,
                start_perf_ns: 0,
                end_perf_ns: 100,
                model_name: "m".into(),
                error: None,
            },
            metrics: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn writes_one_jsonl_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile_export.jsonl");
        let writer = ExportWriter::create(&path, 1).await.unwrap();
        writer.write(&record()).await.unwrap();
        writer.write(&record()).await.unwrap();
        writer.flush().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn batches_flushes_at_the_configured_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile_export.jsonl");
        let writer = ExportWriter::create(&path, 10).await.unwrap();
        writer.write(&record()).await.unwrap();
        // Not yet flushed: file may be empty or partially buffered, but no error.
        writer.flush().await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
