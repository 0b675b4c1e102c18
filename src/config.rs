//! Layered configuration resolution: CLI flags take precedence over
//! environment variables, which take precedence over built-in defaults.
//! The result is a single immutable `Config` consumed everywhere else.
use crate::model::ReservationStatus;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}. Provide it via CLI flags, environment variables or a .env file")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub const ENV_API_URL: &str = "RESFETCH_API_URL";
pub const ENV_APP_ID: &str = "RESFETCH_APP_ID";
pub const ENV_USERNAME: &str = "RESFETCH_USERNAME";
pub const ENV_PASSWORD: &str = "RESFETCH_PASSWORD";
pub const ENV_METHOD: &str = "RESFETCH_METHOD";
pub const ENV_PAGE_SIZE: &str = "RESFETCH_PAGE_SIZE";
pub const ENV_OUTPUT_DIR: &str = "RESFETCH_OUTPUT_DIR";

pub const DEFAULT_PAGE_SIZE: u8 = 10;
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Operation mode for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Poll,
    Resend,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Poll => "poll",
            Method::Resend => "resend",
        }
    }
}

/// Raw values collected from the command line. `None` falls through to the
/// environment layer, then to the default.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub app_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub method: Option<String>,
    pub page_size: Option<u8>,
    pub statuses: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub output_dir: Option<String>,
    pub acknowledge: bool,
}

/// Validated parameter set for one run. Constructed once at startup,
/// read-only thereafter.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub app_id: String,
    pub username: String,
    pub password: String,
    pub method: Method,
    pub page_size: u8,
    pub statuses: Vec<ReservationStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub output_dir: String,
    pub acknowledge: bool,
}

impl Config {
    /// Collapse CLI overrides and an environment snapshot into a validated
    /// `Config`. All validation happens here, before any network activity.
    pub fn resolve(cli: Overrides, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let from_env = |key: &str| env.get(key).map(|v| v.to_string());

        let api_url = cli.api_url.or_else(|| from_env(ENV_API_URL));
        let app_id = cli.app_id.or_else(|| from_env(ENV_APP_ID));
        let username = cli.username.or_else(|| from_env(ENV_USERNAME));
        let password = cli.password.or_else(|| from_env(ENV_PASSWORD));

        let mut missing = Vec::new();
        if api_url.is_none() {
            missing.push("api url (--api-url / RESFETCH_API_URL)");
        }
        if app_id.is_none() {
            missing.push("app id (--app-id / RESFETCH_APP_ID)");
        }
        if username.is_none() {
            missing.push("username (--username / RESFETCH_USERNAME)");
        }
        if password.is_none() {
            missing.push("password (--password / RESFETCH_PASSWORD)");
        }
        let (api_url, app_id, username, password) = match (api_url, app_id, username, password) {
            (Some(api_url), Some(app_id), Some(username), Some(password)) => {
                (api_url, app_id, username, password)
            }
            _ => return Err(ConfigError::Missing(missing.join(", "))),
        };

        let method = parse_method(
            cli.method
                .or_else(|| from_env(ENV_METHOD))
                .as_deref()
                .unwrap_or("poll"),
        )?;

        let page_size = match cli.page_size {
            Some(n) => n,
            None => match from_env(ENV_PAGE_SIZE) {
                Some(raw) => raw.trim().parse::<u8>().map_err(|_| {
                    ConfigError::Invalid(format!("{ENV_PAGE_SIZE} must be an integer, got '{raw}'"))
                })?,
                None => DEFAULT_PAGE_SIZE,
            },
        };
        if !(1..=10).contains(&page_size) {
            return Err(ConfigError::Invalid(format!(
                "page size must be between 1 and 10, got {page_size}"
            )));
        }

        let statuses = match cli.statuses.as_deref() {
            Some(raw) => parse_statuses(raw)?,
            None => Vec::new(),
        };
        let start_date = cli.start_date.as_deref().map(parse_date).transpose()?;
        let end_date = cli.end_date.as_deref().map(parse_date).transpose()?;

        let cfg = Config {
            api_url,
            app_id,
            username,
            password,
            method,
            page_size,
            statuses,
            start_date,
            end_date,
            output_dir: cli
                .output_dir
                .or_else(|| from_env(ENV_OUTPUT_DIR))
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            acknowledge: cli.acknowledge,
        };
        validate(&cfg)?;
        Ok(cfg)
    }
}

fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "poll" => Ok(Method::Poll),
        "resend" => Ok(Method::Resend),
        other => Err(ConfigError::Invalid(format!(
            "method must be either 'poll' or 'resend', got '{other}'"
        ))),
    }
}

/// Parse a comma-separated status list, e.g. `IN_HOUSE,booked`.
fn parse_statuses(raw: &str) -> Result<Vec<ReservationStatus>, ConfigError> {
    let mut statuses = Vec::new();
    let mut invalid = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match ReservationStatus::parse(token) {
            Some(status) => statuses.push(status),
            None => invalid.push(token.to_string()),
        }
    }
    if !invalid.is_empty() {
        let valid: Vec<&str> = ReservationStatus::ALL.iter().map(|s| s.as_str()).collect();
        return Err(ConfigError::Invalid(format!(
            "invalid status values: {}. Valid values are: {}",
            invalid.join(", "),
            valid.join(", ")
        )));
    }
    Ok(statuses)
}

fn parse_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::Invalid(format!("invalid date '{raw}': expected YYYY-MM-DD")))
}

/// Cross-field validation after layering.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.method == Method::Resend {
        if cfg.start_date.is_none() || cfg.end_date.is_none() {
            return Err(ConfigError::Invalid(
                "resend requires both --start-date and --end-date".to_string(),
            ));
        }
        if cfg.statuses.is_empty() {
            return Err(ConfigError::Invalid(
                "resend requires at least one --status".to_string(),
            ));
        }
    }
    Ok(())
}
