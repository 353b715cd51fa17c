//! Gesture pipeline control loop.
//!
//! Single task: pull one observation, run the controller, hand any update
//! to the streamer without blocking, yield, repeat. Controller state is
//! touched only here, so the transducer needs no locking; updates reach
//! the streamer queue in frame order.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::controller::GestureController;
use crate::observation::{ObservationProvider, ProviderError};
use crate::streamer::PointerStreamer;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pause between iterations so the loop never busy-spins.
    pub idle_yield: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_yield: Duration::from_millis(1),
        }
    }
}

/// Outcome counters for one pipeline session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineReport {
    pub frames: u64,
    pub updates: u64,
    pub malformed: u64,
}

/// Run the gesture pipeline until the provider closes or `shutdown`
/// resolves. A malformed observation is logged and treated as a no-hand
/// frame; the streamer is never awaited from here.
pub async fn run_pipeline<P: ObservationProvider>(
    provider: &mut P,
    controller: &mut GestureController,
    streamer: &mut PointerStreamer,
    config: &PipelineConfig,
    shutdown: impl Future<Output = ()>,
) -> PipelineReport {
    tokio::pin!(shutdown);

    let mut report = PipelineReport::default();

    loop {
        let read = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping gesture pipeline");
                break;
            }
            read = provider.next_observation() => read,
        };

        let observation = match read {
            Ok(observation) => observation,
            Err(ProviderError::Malformed(e)) => {
                report.malformed += 1;
                warn!(error = %e, "malformed observation, treating frame as no hand");
                None
            }
            Err(ProviderError::Closed) => {
                info!("observation stream closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "observation read failed, ending session");
                break;
            }
        };

        report.frames += 1;

        if let Some(update) = controller.process(observation.as_ref()) {
            report.updates += 1;
            streamer.send_point(update);
        }

        sleep(config.idle_yield).await;
    }

    report
}
