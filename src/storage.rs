use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::dates::file_timestamp;
use crate::model::{BatchFile, BatchMetadata};

pub const AUDIT_LOG_NAME: &str = "processed_handles.log";

/// Writes run artifacts under one output directory: numbered batch files, a
/// run summary and an append-only acknowledgment audit log. Independent of
/// the polling logic; the orchestrators own all sequencing.
pub struct BatchWriter {
    output_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Idempotent; called before every write so a directory removed mid-run
    /// surfaces as a directory error, not a confusing write error.
    pub async fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await.with_context(|| {
            format!(
                "failed to create output directory: {}",
                self.output_dir.display()
            )
        })
    }

    /// Persist one batch. File names carry a timestamp plus the batch number
    /// so concurrent runs never collide and one run's batches sort by number.
    pub async fn write_batch(
        &self,
        reservations: &[Value],
        method: &str,
        batch_number: u32,
    ) -> Result<PathBuf> {
        self.ensure_output_dir().await?;

        let now = Utc::now();
        let filename = format!(
            "reservations_{}_batch{}.json",
            file_timestamp(now),
            batch_number
        );
        let path = self.output_dir.join(&filename);

        let artifact = BatchFile {
            metadata: BatchMetadata {
                method: method.to_string(),
                fetched_at: now,
                count: reservations.len(),
                batch_number,
            },
            reservations: reservations.to_vec(),
        };
        let json = serde_json::to_string_pretty(&artifact).context("failed to serialize batch")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write batch file: {}", path.display()))?;

        info!("written {} reservations to {}", reservations.len(), filename);
        Ok(path)
    }

    pub async fn write_summary<S: Serialize>(&self, summary: &S) -> Result<PathBuf> {
        self.ensure_output_dir().await?;

        let filename = format!("summary_{}.json", file_timestamp(Utc::now()));
        let path = self.output_dir.join(&filename);
        let json =
            serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write summary file: {}", path.display()))?;

        info!("written summary to {}", filename);
        Ok(path)
    }

    /// Append one line per acknowledged handle to the audit log. The trail
    /// is non-critical: failures are logged and swallowed, never propagated.
    pub async fn log_acknowledged(&self, handles: &[String]) {
        if handles.is_empty() {
            return;
        }
        if let Err(err) = self.append_handles(handles).await {
            warn!(?err, "failed to append acknowledgment audit log");
        }
    }

    async fn append_handles(&self, handles: &[String]) -> Result<()> {
        self.ensure_output_dir().await?;

        let path = self.output_dir.join(AUDIT_LOG_NAME);
        let mut lines = String::new();
        for handle in handles {
            lines.push_str(&format!("{} - {}\n", Utc::now().to_rfc3339(), handle));
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;
        file.write_all(lines.as_bytes())
            .await
            .with_context(|| format!("failed to append audit log: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn batch_file_round_trips() {
        let td = tempdir().unwrap();
        let writer = BatchWriter::new(td.path());

        let reservations = vec![
            json!({"guest": "Ada", "room": 101}),
            json!({"guest": "Grace", "room": 102}),
            json!({"guest": "Edsger", "room": 103}),
        ];
        let path = writer.write_batch(&reservations, "poll", 1).await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_batch1.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: BatchFile = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.metadata.count, 3);
        assert_eq!(parsed.metadata.batch_number, 1);
        assert_eq!(parsed.metadata.method, "poll");
        assert_eq!(parsed.reservations, reservations);
    }

    #[tokio::test]
    async fn batch_metadata_is_camel_case_on_disk() {
        let td = tempdir().unwrap();
        let writer = BatchWriter::new(td.path());
        let path = writer
            .write_batch(&[json!({"guest": "Ada"})], "poll", 2)
            .await
            .unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["metadata"]["batchNumber"], 2);
        assert!(raw["metadata"]["fetchedAt"].is_string());
    }

    #[tokio::test]
    async fn output_dir_is_created_on_demand() {
        let td = tempdir().unwrap();
        let nested = td.path().join("runs").join("today");
        let writer = BatchWriter::new(&nested);
        writer.ensure_output_dir().await.unwrap();
        writer.ensure_output_dir().await.unwrap();
        assert!(nested.is_dir());

        writer.write_batch(&[json!({})], "poll", 1).await.unwrap();
    }

    #[tokio::test]
    async fn summary_uses_timestamped_name() {
        let td = tempdir().unwrap();
        let writer = BatchWriter::new(td.path());
        let path = writer
            .write_summary(&json!({"method": "poll", "totalProcessed": 0}))
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("summary_"));
        assert!(name.ends_with(".json"));
    }

    #[tokio::test]
    async fn audit_log_appends_across_calls() {
        let td = tempdir().unwrap();
        let writer = BatchWriter::new(td.path());

        writer
            .log_acknowledged(&["rh-1".to_string(), "rh-2".to_string()])
            .await;
        writer.log_acknowledged(&["rh-3".to_string()]).await;

        let content = std::fs::read_to_string(td.path().join(AUDIT_LOG_NAME)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with(" - rh-1"));
        assert!(lines[1].ends_with(" - rh-2"));
        assert!(lines[2].ends_with(" - rh-3"));
        for line in lines {
            let (ts, _) = line.split_once(" - ").unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
        }
    }

    #[tokio::test]
    async fn audit_log_skips_empty_batches() {
        let td = tempdir().unwrap();
        let writer = BatchWriter::new(td.path());
        writer.log_acknowledged(&[]).await;
        assert!(!td.path().join(AUDIT_LOG_NAME).exists());
    }
}
