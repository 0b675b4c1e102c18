//! Resend orchestration: date × status fan-out with per-pair outcome capture.
use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::client::StreamService;
use crate::config::Config;
use crate::dates::{duration_label, expand_range};
use crate::model::{DateRangeSummary, ResendOutcome, ResendSummary, ReservationStatus};
use crate::storage::BatchWriter;

/// Pause between consecutive resend requests to bound the request rate.
const REQUEST_PAUSE: Duration = Duration::from_millis(500);

const RESEND_NOTE: &str =
    "Resend requests trigger messages to be added to the queue. Use the poll method to retrieve them.";

/// Issues one resend request per (date, status) pair, sequentially, and
/// aggregates the outcomes. Individual failures never abort the run.
pub struct ResendOrchestrator<'a> {
    client: &'a dyn StreamService,
    writer: &'a BatchWriter,
    config: &'a Config,
    request_pause: Duration,
}

impl<'a> ResendOrchestrator<'a> {
    pub fn new(client: &'a dyn StreamService, writer: &'a BatchWriter, config: &'a Config) -> Self {
        Self {
            client,
            writer,
            config,
            request_pause: REQUEST_PAUSE,
        }
    }

    /// Override the fixed inter-request pause. Tests run with zero delay.
    pub fn with_pause(mut self, request_pause: Duration) -> Self {
        self.request_pause = request_pause;
        self
    }

    /// Expand the date range, fan out over dates × statuses in date-major
    /// order, then persist the summary. Only range generation and the
    /// summary write can abort.
    pub async fn run(self) -> Result<ResendSummary> {
        let start = self
            .config
            .start_date
            .ok_or_else(|| anyhow!("resend requires a start date"))?;
        let end = self
            .config
            .end_date
            .ok_or_else(|| anyhow!("resend requires an end date"))?;

        let dates = expand_range(start, end)?;
        info!(
            "starting resend run: {} dates x {} statuses",
            dates.len(),
            self.config.statuses.len()
        );
        let started = Instant::now();

        let mut results = Vec::with_capacity(dates.len() * self.config.statuses.len());
        for date in &dates {
            for status in &self.config.statuses {
                results.push(self.request_one(*date, *status).await);
                tokio::time::sleep(self.request_pause).await;
            }
        }

        let successful_requests = results.iter().filter(|r| r.success).count();
        let summary = ResendSummary {
            method: "resend".to_string(),
            date_range: DateRangeSummary {
                start,
                end,
                total_days: dates.len(),
            },
            statuses: self.config.statuses.clone(),
            total_requests: results.len(),
            successful_requests,
            failed_requests: results.len() - successful_requests,
            duration: duration_label(started.elapsed()),
            results,
            completed_at: Utc::now(),
            note: RESEND_NOTE.to_string(),
        };
        self.writer.write_summary(&summary).await?;

        info!(
            "resend run complete: {}/{} requests succeeded ({})",
            summary.successful_requests, summary.total_requests, summary.duration
        );
        if summary.failed_requests > 0 {
            warn!(
                "{} resend requests failed; see the summary file for details",
                summary.failed_requests
            );
        }
        Ok(summary)
    }

    /// One resend request. The error, if any, is captured in the outcome and
    /// never re-thrown.
    async fn request_one(&self, date: NaiveDate, status: ReservationStatus) -> ResendOutcome {
        info!(%date, status = status.as_str(), "requesting resend");
        match self.client.resend_messages(date, status).await {
            Ok(response) => ResendOutcome {
                date,
                status,
                success: true,
                response: Some(response),
                error: None,
            },
            Err(err) => {
                warn!(%date, status = status.as_str(), %err, "resend request failed");
                ResendOutcome {
                    date,
                    status,
                    success: false,
                    response: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
