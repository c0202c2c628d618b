//! skillscan-server: HTTP front end for the ingestion pipeline.

use anyhow::Context;
use clap::Parser;
use skillscan::server::{serve, AppState};
use skillscan::{IngestConfig, IngestionPipeline, OpenAiCompatClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "skillscan-server",
    version,
    about = "Ingest submissions (ppt/pdf/docx/image/video) into skill evaluations over HTTP"
)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "SKILLSCAN_BASE_URL", default_value = "https://openrouter.ai/api/v1")]
    base_url: String,

    /// API key for the model endpoint.
    #[arg(long, env = "SKILLSCAN_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Vision model for page/keyframe description.
    #[arg(long, env = "SKILLSCAN_VISION_MODEL")]
    vision_model: Option<String>,

    /// Text model for skill scoring and tree building.
    #[arg(long, env = "SKILLSCAN_TEXT_MODEL")]
    text_model: Option<String>,

    /// Transcription model for video audio tracks.
    #[arg(long, env = "SKILLSCAN_TRANSCRIPTION_MODEL")]
    transcription_model: Option<String>,

    /// SSIM score below which a sampled frame becomes a keyframe.
    #[arg(long, default_value_t = 0.8)]
    ssim_threshold: f64,

    /// Seconds of video between sampled candidate frames.
    #[arg(long, default_value_t = 2.0)]
    sample_interval: f64,

    /// Rasterisation DPI for document pages.
    #[arg(long, default_value_t = 150)]
    dpi: u32,

    /// Concurrent vision calls per request.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Whole-request wall-clock budget in seconds.
    #[arg(long, default_value_t = 600)]
    request_timeout: u64,

    /// Hard cap on keyframes per video (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_keyframes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("skillscan=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    let config = IngestConfig::builder()
        .ssim_threshold(args.ssim_threshold)
        .sample_interval_secs(args.sample_interval)
        .raster_dpi(args.dpi)
        .concurrency(args.concurrency)
        .request_timeout_secs(args.request_timeout)
        .max_keyframes(args.max_keyframes)
        .build()
        .context("invalid pipeline configuration")?;

    let mut client = OpenAiCompatClient::new(
        args.base_url.as_str(),
        args.api_key.as_str(),
        config.api_timeout_secs,
    )
    .context("building API client")?;
    if let Some(model) = args.vision_model {
        client = client.vision_model(model);
    }
    if let Some(model) = args.text_model {
        client = client.text_model(model);
    }
    if let Some(model) = args.transcription_model {
        client = client.transcription_model(model);
    }
    let client = Arc::new(client);

    let pipeline = Arc::new(IngestionPipeline::new(
        config,
        client.clone(),
        client.clone(),
    ));
    let state = AppState {
        pipeline,
        completer: client,
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid host/port")?;
    serve(addr, state).await.context("server error")
}
