use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message delivered by the stream: the opaque reservation payload plus
/// the receipt handle needed to acknowledge it later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub receipt_handle: String,
    pub payload: Value,
}

/// Reservation status filter accepted by the resend endpoint. Variant names
/// are the exact wire and config values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    ARRIVALS,
    IN_HOUSE,
    DEPARTURE,
    BOOKED,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::ARRIVALS => "ARRIVALS",
            ReservationStatus::IN_HOUSE => "IN_HOUSE",
            ReservationStatus::DEPARTURE => "DEPARTURE",
            ReservationStatus::BOOKED => "BOOKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ARRIVALS" => Some(ReservationStatus::ARRIVALS),
            "IN_HOUSE" => Some(ReservationStatus::IN_HOUSE),
            "DEPARTURE" => Some(ReservationStatus::DEPARTURE),
            "BOOKED" => Some(ReservationStatus::BOOKED),
            _ => None,
        }
    }

    pub const ALL: [ReservationStatus; 4] = [
        ReservationStatus::ARRIVALS,
        ReservationStatus::IN_HOUSE,
        ReservationStatus::DEPARTURE,
        ReservationStatus::BOOKED,
    ];
}

/// Metadata block written at the top of every batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
    pub method: String,
    pub fetched_at: DateTime<Utc>,
    pub count: usize,
    pub batch_number: u32,
}

/// On-disk layout of one batch artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    pub metadata: BatchMetadata,
    pub reservations: Vec<Value>,
}

/// Outcome of one resend request for a single (date, status) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendOutcome {
    pub date: NaiveDate,
    pub status: ReservationStatus,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_days: usize,
}

/// Terminal artifact of one poll run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSummary {
    pub method: String,
    pub total_processed: u64,
    pub total_batches: u32,
    pub duration: String,
    pub completed_at: DateTime<Utc>,
}

/// Terminal artifact of one resend run, including every per-pair outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendSummary {
    pub method: String,
    pub date_range: DateRangeSummary,
    pub statuses: Vec<ReservationStatus>,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub duration: String,
    pub results: Vec<ResendOutcome>,
    pub completed_at: DateTime<Utc>,
    pub note: String,
}
