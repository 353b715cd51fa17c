//! Gesture tracking service binary.
//!
//! Reads JSON landmark lines from the external hand tracker on stdin and
//! streams clamped pointer updates to the remote action executor.

use anyhow::Context;
use gesture_tracker::{
    run_pipeline, ControllerConfig, GestureController, JsonLineProvider, PipelineConfig,
    PointerStreamer, TcpTransport, DEFAULT_PINCH_THRESHOLD, DEFAULT_QUEUE_CAPACITY,
};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gesture_tracker=info".parse()?),
        )
        .init();

    let settings = Settings::from_env()?;

    info!("initializing gesture tracking service (target: {})", settings.stream_addr);

    // Everything fallible is constructed before the streamer spawns its
    // drain task, so no early return can skip the streamer teardown.
    let mut provider = JsonLineProvider::new(
        BufReader::new(tokio::io::stdin()),
        settings.pinch_threshold,
    );
    let mut controller = GestureController::new(settings.controller.clone())?;

    let transport = TcpTransport::connect(&settings.stream_addr)
        .await
        .with_context(|| format!("cannot reach action executor at {}", settings.stream_addr))?;
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);

    info!("sensor running, pinch and drag to move the pointer; ctrl-c to quit");

    let report = run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &settings.pipeline,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
    )
    .await;

    // Teardown runs on every exit path, interrupt included.
    let drain = streamer.stop().await;

    info!(
        frames = report.frames,
        updates = report.updates,
        sent = drain.sent,
        "gesture tracking service stopped"
    );

    Ok(())
}

struct Settings {
    controller: ControllerConfig,
    pipeline: PipelineConfig,
    pinch_threshold: f32,
    stream_addr: String,
}

impl Settings {
    /// Read configuration from the environment exactly once at startup.
    fn from_env() -> anyhow::Result<Self> {
        let controller = ControllerConfig {
            sensitivity_x: env_f32("SENSITIVITY_X", 2.5)?,
            sensitivity_y: env_f32("SENSITIVITY_Y", 2.5)?,
            start_x: env_f32("START_X", 0.5)?,
            start_y: env_f32("START_Y", 0.5)?,
        };

        let stream_addr =
            std::env::var("STREAM_ADDR").unwrap_or_else(|_| "127.0.0.1:50051".to_string());

        Ok(Self {
            controller,
            pipeline: PipelineConfig::default(),
            pinch_threshold: env_f32("PINCH_THRESHOLD", DEFAULT_PINCH_THRESHOLD)?,
            stream_addr,
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
