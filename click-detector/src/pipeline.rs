//! Acoustic pipeline control loop.
//!
//! Single task: pull one frame, run the detector, forward an accepted
//! event, yield, repeat. Detector state is touched by no one else, so the
//! transducer itself needs no locking. Events leave in frame order; there
//! is no reordering buffer and no retry queue.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::detector::TransientDetector;
use crate::sink::ClickSink;
use crate::source::{FrameSource, SourceError};

/// Read failures in a row before the log escalates.
const READ_FAILURE_ALERT: u32 = 3;

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
    pub frames_read: u64,
    pub clicks_sent: u64,
    pub clicks_failed: u64,
    pub read_failures: u64,
}

/// Run the acoustic pipeline until the source is exhausted or `shutdown`
/// resolves. Degraded iterations (bad frame, sink timeout, transport
/// error) are logged and skipped; only returns, never panics or errors.
pub async fn run_pipeline<S, K>(
    source: &mut S,
    detector: &mut TransientDetector,
    sink: &mut K,
    config: &PipelineConfig,
    shutdown: impl Future<Output = ()>,
) -> PipelineReport
where
    S: FrameSource,
    K: ClickSink,
{
    tokio::pin!(shutdown);

    let mut report = PipelineReport::default();
    let mut consecutive_read_failures = 0u32;

    loop {
        let read = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, stopping acoustic pipeline");
                break;
            }
            read = source.read_frame() => read,
        };

        match read {
            Ok(frame) => {
                consecutive_read_failures = 0;
                report.frames_read += 1;

                if detector.process(&frame) {
                    info!("transient detected, forwarding click");
                    forward_click(sink, &mut report).await;
                }
            }
            Err(SourceError::Exhausted) => {
                info!("frame source exhausted");
                break;
            }
            Err(e) => {
                report.read_failures += 1;
                consecutive_read_failures += 1;
                warn!(error = %e, "frame read failed, skipping iteration");

                if consecutive_read_failures == READ_FAILURE_ALERT {
                    warn!("{} consecutive read failures; check the capture device", READ_FAILURE_ALERT);
                }
            }
        }

        sleep(config.idle_yield).await;
    }

    if let Err(e) = sink.close().await {
        warn!(error = %e, "error closing click sink");
    }

    report
}

async fn forward_click<K: ClickSink>(sink: &mut K, report: &mut PipelineReport) {
    // The sink bounds the call with its own deadline; a slow forward
    // comes back as an error here, never hangs the loop.
    match sink.send_click().await {
        Ok(ack) if ack.success => {
            report.clicks_sent += 1;
        }
        Ok(_) => {
            report.clicks_failed += 1;
            warn!("action executor received click but reported failure");
        }
        Err(e) => {
            report.clicks_failed += 1;
            warn!(error = %e, "click forward failed, event lost");
        }
    }
}
