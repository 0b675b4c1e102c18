//! Poll orchestration: drain the upstream queue until it stays empty.
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::client::{ClientError, StreamService};
use crate::config::Config;
use crate::dates::duration_label;
use crate::model::{Message, PollSummary};
use crate::storage::BatchWriter;

/// Consecutive empty polls before the queue is considered drained.
const EMPTY_POLL_LIMIT: u32 = 3;
/// Pause between successful poll iterations to bound the request rate.
const BATCH_PAUSE: Duration = Duration::from_secs(1);
/// Longer pause after an upstream 429, before retrying the same iteration.
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(5);

/// Drives repeated polls for one run. Owns the per-run counters; a new run
/// needs a new orchestrator.
pub struct PollOrchestrator<'a> {
    client: &'a dyn StreamService,
    writer: &'a BatchWriter,
    config: &'a Config,
    batch_pause: Duration,
    rate_limit_pause: Duration,
    total_processed: u64,
    total_batches: u32,
}

impl<'a> PollOrchestrator<'a> {
    pub fn new(client: &'a dyn StreamService, writer: &'a BatchWriter, config: &'a Config) -> Self {
        Self {
            client,
            writer,
            config,
            batch_pause: BATCH_PAUSE,
            rate_limit_pause: RATE_LIMIT_PAUSE,
            total_processed: 0,
            total_batches: 0,
        }
    }

    /// Override the fixed pauses. Tests run with zero delays.
    pub fn with_pauses(mut self, batch_pause: Duration, rate_limit_pause: Duration) -> Self {
        self.batch_pause = batch_pause;
        self.rate_limit_pause = rate_limit_pause;
        self
    }

    /// Poll until the queue stays empty, then persist the run summary.
    /// Exits: `EMPTY_POLL_LIMIT` consecutive empty polls, or a fatal error.
    pub async fn run(mut self) -> Result<PollSummary> {
        info!(
            page_size = self.config.page_size,
            acknowledge = self.config.acknowledge,
            "starting poll run"
        );
        let started = Instant::now();
        let mut consecutive_empty = 0u32;

        loop {
            match self.client.poll(self.config.page_size).await {
                Ok(messages) if messages.is_empty() => {
                    consecutive_empty += 1;
                    info!("empty poll {}/{}", consecutive_empty, EMPTY_POLL_LIMIT);
                    if consecutive_empty >= EMPTY_POLL_LIMIT {
                        info!("no more messages available");
                        break;
                    }
                }
                Ok(messages) => {
                    consecutive_empty = 0;
                    self.process_batch(messages).await?;
                    tokio::time::sleep(self.batch_pause).await;
                }
                Err(ClientError::RateLimited) => {
                    // Retry the same iteration; counts neither as an empty
                    // poll nor as a batch.
                    warn!(
                        "rate limited; waiting {:.0?} before retrying",
                        self.rate_limit_pause
                    );
                    tokio::time::sleep(self.rate_limit_pause).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let summary = PollSummary {
            method: "poll".to_string(),
            total_processed: self.total_processed,
            total_batches: self.total_batches,
            duration: duration_label(started.elapsed()),
            completed_at: Utc::now(),
        };
        self.writer.write_summary(&summary).await?;
        info!(
            "poll run complete: {} reservations in {} batches ({})",
            summary.total_processed, summary.total_batches, summary.duration
        );
        Ok(summary)
    }

    /// Write one batch and, when enabled, acknowledge its messages. The
    /// batch write happens first; acknowledgment outcomes never affect it.
    async fn process_batch(&mut self, messages: Vec<Message>) -> Result<()> {
        let reservations: Vec<Value> = messages.iter().map(|m| m.payload.clone()).collect();

        self.total_batches += 1;
        self.writer
            .write_batch(&reservations, "poll", self.total_batches)
            .await?;

        if self.config.acknowledge {
            self.acknowledge_all(&messages).await;
        }

        self.total_processed += messages.len() as u64;
        info!("batch complete: {} messages processed", messages.len());
        Ok(())
    }

    /// At-most-once acknowledgment: individual failures are logged and
    /// skipped, never retried. Every handle still goes to the audit log.
    async fn acknowledge_all(&self, messages: &[Message]) {
        let handles: Vec<String> = messages.iter().map(|m| m.receipt_handle.clone()).collect();
        for handle in &handles {
            if let Err(err) = self.client.acknowledge(handle).await {
                warn!(%err, "failed to acknowledge message; continuing");
            }
        }
        self.writer.log_acknowledged(&handles).await;
        info!("acknowledged {} messages", handles.len());
    }
}
