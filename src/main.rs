use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use tracing::info;

use resfetch::client::StreamClient;
use resfetch::config::{Config, Method, Overrides};
use resfetch::poll::PollOrchestrator;
use resfetch::resend::ResendOrchestrator;
use resfetch::storage::BatchWriter;

/// Fetch reservation events from the upstream data stream and persist them
/// as batched JSON files.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Fetch method: poll or resend
    #[arg(long, short = 'm')]
    method: Option<String>,

    /// API base URL (or RESFETCH_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Application identifier (or RESFETCH_APP_ID)
    #[arg(long)]
    app_id: Option<String>,

    /// Basic auth username (or RESFETCH_USERNAME)
    #[arg(long)]
    username: Option<String>,

    /// Basic auth password (or RESFETCH_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Status filter(s) for resend, comma-separated:
    /// ARRIVALS, IN_HOUSE, DEPARTURE, BOOKED
    #[arg(long, short = 's')]
    status: Option<String>,

    /// Start date (YYYY-MM-DD), required for resend
    #[arg(long)]
    start_date: Option<String>,

    /// End date (YYYY-MM-DD), required for resend
    #[arg(long)]
    end_date: Option<String>,

    /// Messages per poll request (1-10)
    #[arg(long, short = 'p')]
    page_size: Option<u8>,

    /// Output directory for JSON artifacts
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Acknowledge processed messages after each batch
    #[arg(long, default_value_t = false)]
    acknowledge: bool,
}

impl Args {
    fn into_overrides(self) -> Overrides {
        Overrides {
            api_url: self.api_url,
            app_id: self.app_id,
            username: self.username,
            password: self.password,
            method: self.method,
            page_size: self.page_size,
            statuses: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            output_dir: self.output_dir,
            acknowledge: self.acknowledge,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let env: HashMap<String, String> = std::env::vars().collect();
    let cfg = Config::resolve(args.into_overrides(), &env)?;

    let client = StreamClient::from_config(&cfg)?;
    let writer = BatchWriter::new(&cfg.output_dir);
    writer.ensure_output_dir().await?;

    let rendered = match cfg.method {
        Method::Poll => {
            let summary = PollOrchestrator::new(&client, &writer, &cfg).run().await?;
            serde_json::to_string_pretty(&summary)?
        }
        Method::Resend => {
            let summary = ResendOrchestrator::new(&client, &writer, &cfg).run().await?;
            serde_json::to_string_pretty(&summary)?
        }
    };

    info!("run summary:\n{rendered}");
    info!("output directory: {}", writer.output_dir().display());
    Ok(())
}
