use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{Message, ReservationStatus};

/// Messages requested per poll are clamped into this range by the upstream
/// contract.
const MIN_PAGE: u8 = 1;
const MAX_PAGE: u8 = 10;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("data stream resend is not enabled for this application; enable the feature upstream and try again")]
    FeatureDisabled,
    #[error("rate limited by upstream (HTTP 429)")]
    RateLimited,
    #[error("upstream error {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Typed operations against the reservation stream. Orchestrators depend on
/// this trait so tests can script responses without a server.
#[async_trait]
pub trait StreamService: Send + Sync {
    /// Fetch up to `max_messages` queued messages. An empty vec means the
    /// queue is (currently) drained, never an error.
    async fn poll(&self, max_messages: u8) -> Result<Vec<Message>, ClientError>;

    /// Ask the upstream to re-enqueue events for one date and status.
    async fn resend_messages(
        &self,
        date: NaiveDate,
        status: ReservationStatus,
    ) -> Result<Value, ClientError>;

    /// Confirm local processing of one message so the queue can retire it.
    async fn acknowledge(&self, receipt_handle: &str) -> Result<Value, ClientError>;
}

#[derive(Clone)]
pub struct StreamClient {
    http: Client,
    base_url: Url,
    app_id: String,
    username: String,
    password: String,
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct PollResponse {
    #[serde(default)]
    result: Vec<Message>,
}

impl StreamClient {
    pub fn from_config(cfg: &Config) -> Result<Self, ClientError> {
        // A base without a trailing slash would lose its last path segment
        // on join().
        let mut api_url = cfg.api_url.clone();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let base_url = Url::parse(&api_url)?;
        Ok(Self::with_base_url(
            base_url,
            cfg.app_id.clone(),
            cfg.username.clone(),
            cfg.password.clone(),
        ))
    }

    pub fn with_base_url(base_url: Url, app_id: String, username: String, password: String) -> Self {
        let http = Client::builder()
            .user_agent("resfetch/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            app_id,
            username,
            password,
        }
    }

    fn endpoint(&self, op: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(&format!("stream/{}/{}", self.app_id, op))?)
    }

    /// Classify a response: 429 and other non-2xx become typed errors, the
    /// success body is returned raw.
    async fn read_body(&self, res: reqwest::Response) -> Result<String, ClientError> {
        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!(%body, "rate limited by upstream");
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, %body, "upstream request failed");
            return Err(ClientError::Upstream { status, body });
        }
        Ok(res.text().await?)
    }

    pub async fn poll(&self, max_messages: u8) -> Result<Vec<Message>, ClientError> {
        let requested = max_messages.clamp(MIN_PAGE, MAX_PAGE);
        let res = self
            .http
            .get(self.endpoint("poll")?)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("num_of_messages", requested.to_string())])
            .send()
            .await?;

        // 404 is the upstream's way of saying the queue has nothing left.
        if res.status() == StatusCode::NOT_FOUND {
            debug!("poll returned 404; queue is empty");
            return Ok(Vec::new());
        }

        let body = self.read_body(res).await?;
        let payload: PollResponse = serde_json::from_str(&body)?;
        info!("polled {} messages", payload.result.len());
        Ok(payload.result)
    }

    pub async fn resend_messages(
        &self,
        date: NaiveDate,
        status: ReservationStatus,
    ) -> Result<Value, ClientError> {
        let res = self
            .http
            .get(self.endpoint("resend")?)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[
                ("date", date.format("%Y-%m-%d").to_string()),
                ("status", status.as_str().to_string()),
            ])
            .send()
            .await?;

        if res.status() == StatusCode::FORBIDDEN {
            return Err(ClientError::FeatureDisabled);
        }

        let body = self.read_body(res).await?;
        info!(%date, status = status.as_str(), "resend request accepted");
        Ok(opaque_body(&body))
    }

    pub async fn acknowledge(&self, receipt_handle: &str) -> Result<Value, ClientError> {
        let res = self
            .http
            .post(self.endpoint("ack")?)
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "receipt_handle": receipt_handle }))
            .send()
            .await?;

        let body = self.read_body(res).await?;
        debug!(handle = %truncated(receipt_handle), "message acknowledged");
        Ok(opaque_body(&body))
    }
}

#[async_trait]
impl StreamService for StreamClient {
    async fn poll(&self, max_messages: u8) -> Result<Vec<Message>, ClientError> {
        StreamClient::poll(self, max_messages).await
    }

    async fn resend_messages(
        &self,
        date: NaiveDate,
        status: ReservationStatus,
    ) -> Result<Value, ClientError> {
        StreamClient::resend_messages(self, date, status).await
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<Value, ClientError> {
        StreamClient::acknowledge(self, receipt_handle).await
    }
}

/// The upstream promises a success body but not its shape; keep whatever
/// came back so summaries never lose diagnostics.
fn opaque_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

/// Receipt handles are long opaque tokens; log only a prefix.
fn truncated(handle: &str) -> String {
    handle.chars().take(20).collect()
}
