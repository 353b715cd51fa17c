//! Pointer update streaming over a persistent connection.
//!
//! A background drain task exclusively owns the transport and pulls from
//! a bounded queue, decoupling the per-frame producer from network
//! latency. `send_point` never blocks: when the queue is full the newest
//! update is dropped; a stale pointer position is superseded within a
//! frame anyway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Bounded queue depth between the pipeline and the drain task.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum StreamerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One cursor position, emitted at most once per processed frame.
/// Clamped-at-edge positions are not distinguishable from legitimately
/// edge positions here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerUpdate {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// Wire half of the streamer; owned exclusively by the drain task.
#[async_trait]
pub trait PointTransport: Send + 'static {
    async fn send(&mut self, update: &PointerUpdate) -> Result<(), StreamerError>;

    /// Close the connection. Called once when the queue is drained.
    async fn shutdown(&mut self) -> Result<(), StreamerError>;
}

/// Line-delimited JSON over a persistent TCP stream.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub async fn connect(addr: &str) -> Result<Self, StreamerError> {
        let stream = TcpStream::connect(addr).await?;
        info!("pointer stream connected, targeting {}", addr);
        Ok(Self { stream })
    }
}

#[async_trait]
impl PointTransport for TcpTransport {
    async fn send(&mut self, update: &PointerUpdate) -> Result<(), StreamerError> {
        let mut payload = serde_json::to_vec(update)?;
        payload.push(b'\n');
        self.stream.write_all(&payload).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), StreamerError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Counters from a finished drain task.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainStats {
    pub sent: u64,
    pub failed: u64,
}

/// Producer handle: enqueue from the pipeline, drain in the background.
pub struct PointerStreamer {
    tx: mpsc::Sender<PointerUpdate>,
    task: JoinHandle<DrainStats>,
    dropped: u64,
}

impl PointerStreamer {
    /// Spawn the drain task. Brackets the transport's lifetime together
    /// with [`PointerStreamer::stop`].
    pub fn start<T: PointTransport>(transport: T, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let task = tokio::spawn(drain(transport, rx));

        info!("pointer streamer started (queue capacity {})", capacity);

        Self {
            tx,
            task,
            dropped: 0,
        }
    }

    /// Enqueue an update without ever blocking the caller. Updates reach
    /// the wire in emission order; a full queue drops this update.
    pub fn send_point(&mut self, update: PointerUpdate) {
        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!("pointer queue full, dropping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("pointer drain task gone, update discarded");
            }
        }
    }

    /// Updates dropped due to a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Close the queue, drain what remains, shut the transport down.
    pub async fn stop(self) -> DrainStats {
        drop(self.tx);

        match self.task.await {
            Ok(stats) => {
                info!(
                    sent = stats.sent,
                    failed = stats.failed,
                    "pointer streamer stopped"
                );
                stats
            }
            Err(e) => {
                warn!(error = %e, "pointer drain task panicked");
                DrainStats::default()
            }
        }
    }
}

async fn drain<T: PointTransport>(
    mut transport: T,
    mut rx: mpsc::Receiver<PointerUpdate>,
) -> DrainStats {
    let mut stats = DrainStats::default();

    while let Some(update) = rx.recv().await {
        match transport.send(&update).await {
            Ok(()) => stats.sent += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "pointer send failed, update lost");
            }
        }
    }

    if let Err(e) = transport.shutdown().await {
        warn!(error = %e, "pointer transport shutdown error");
    }

    stats
}

/// Test transport recording every update it is handed.
pub struct RecordingTransport {
    sent: std::sync::Arc<std::sync::Mutex<Vec<PointerUpdate>>>,
    delay: std::time::Duration,
}

impl RecordingTransport {
    pub fn new() -> (Self, std::sync::Arc<std::sync::Mutex<Vec<PointerUpdate>>>) {
        Self::with_delay(std::time::Duration::ZERO)
    }

    /// A per-send delay simulates a slow sink for backpressure tests.
    pub fn with_delay(
        delay: std::time::Duration,
    ) -> (Self, std::sync::Arc<std::sync::Mutex<Vec<PointerUpdate>>>) {
        let sent = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        (
            Self {
                sent: sent.clone(),
                delay,
            },
            sent,
        )
    }
}

#[async_trait]
impl PointTransport for RecordingTransport {
    async fn send(&mut self, update: &PointerUpdate) -> Result<(), StreamerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(*update);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), StreamerError> {
        Ok(())
    }
}
