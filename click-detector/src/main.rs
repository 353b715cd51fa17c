//! Acoustic click service binary.
//!
//! Listens on the default microphone and forwards debounced transient
//! events ("pops") to the remote action executor.

use anyhow::Context;
use click_detector::{
    run_pipeline, system_clock, DetectorConfig, MicrophoneSource, PipelineConfig, TcpClickSink,
    TransientDetector,
};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("click_detector=info".parse()?),
        )
        .init();

    let settings = Settings::from_env()?;

    info!("initializing acoustic click service");

    // Microphone access is the one failure that aborts the process.
    let mut source = MicrophoneSource::start().context("microphone access required")?;

    let mut detector = TransientDetector::new(settings.detector.clone(), system_clock())?;
    let mut sink = TcpClickSink::connect(&settings.sink_addr, settings.sink_timeout)
        .await
        .with_context(|| format!("cannot reach action executor at {}", settings.sink_addr))?;

    info!("audio listener running, make a sharp pop to click; ctrl-c to quit");

    let report = run_pipeline(
        &mut source,
        &mut detector,
        &mut sink,
        &settings.pipeline,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await;

    source.stop();

    info!(
        frames = report.frames_read,
        clicks = report.clicks_sent,
        failed = report.clicks_failed,
        "acoustic click service stopped"
    );

    Ok(())
}

struct Settings {
    detector: DetectorConfig,
    pipeline: PipelineConfig,
    sink_addr: String,
    sink_timeout: Duration,
}

impl Settings {
    /// Read configuration from the environment exactly once at startup.
    fn from_env() -> anyhow::Result<Self> {
        let detector = DetectorConfig {
            sensitivity_multiplier: env_f32("AUDIO_SENSITIVITY", 6.0)?,
            cooldown: Duration::from_secs_f32(env_f32("AUDIO_COOLDOWN_SECS", 0.3)?),
            ..Default::default()
        };

        let sink_addr =
            std::env::var("SINK_ADDR").unwrap_or_else(|_| "127.0.0.1:50051".to_string());
        let sink_timeout = Duration::from_millis(env_u64("SINK_TIMEOUT_MS", 500)?);

        Ok(Self {
            detector,
            pipeline: PipelineConfig::default(),
            sink_addr,
            sink_timeout,
        })
    }
}

fn env_f32(key: &str, default: f32) -> anyhow::Result<f32> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<f32>()
            .with_context(|| format!("invalid value for {}", key)),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid value for {}", key)),
        Err(_) => Ok(default),
    }
}
