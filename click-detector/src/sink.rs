//! Click event sinks.
//!
//! The remote action executor accepts one line-delimited JSON request per
//! click and answers with a single JSON acknowledgement line. Each call is
//! bounded by a deadline inside the sink; a failed or slow forward is
//! logged and the event is lost, never queued or retried. A connection
//! whose call timed out may still carry the stale ack (or a partial
//! request), so it is dropped and re-established before the next forward.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed acknowledgement: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sink closed the connection")]
    Closed,

    #[error("acknowledgement deadline exceeded")]
    Timeout,
}

/// Acknowledgement returned by the action executor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClickAck {
    pub success: bool,
}

#[derive(Debug, Serialize)]
struct ClickRequest {
    kind: &'static str,
}

/// Unary forwarding call for accepted transients. Calls are independent:
/// implementations bound each one with their own deadline, and a failed
/// call must not corrupt the next.
#[async_trait]
pub trait ClickSink: Send {
    async fn send_click(&mut self) -> Result<ClickAck, SinkError>;

    /// Release the underlying connection. Called on every pipeline exit path.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// TCP sink for the action executor. The connection persists across calls
/// while healthy; any error or timeout discards it, and the next call
/// reconnects. This keeps request and ack strictly paired per call.
pub struct TcpClickSink {
    addr: String,
    ack_timeout: Duration,
    conn: Option<Connection>,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self, SinkError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            line: String::new(),
        })
    }

    /// One request line out, one ack line back.
    async fn round_trip(&mut self) -> Result<ClickAck, SinkError> {
        let mut payload = serde_json::to_vec(&ClickRequest { kind: "click" })?;
        payload.push(b'\n');
        self.writer.write_all(&payload).await?;

        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(SinkError::Closed);
        }

        let ack: ClickAck = serde_json::from_str(self.line.trim())?;
        Ok(ack)
    }
}

impl TcpClickSink {
    /// Connect to the action executor. `ack_timeout` bounds every call,
    /// the initial connect included.
    pub async fn connect(addr: &str, ack_timeout: Duration) -> Result<Self, SinkError> {
        let conn = timeout(ack_timeout, Connection::open(addr))
            .await
            .map_err(|_| SinkError::Timeout)??;

        info!("click sink connected, targeting {}", addr);

        Ok(Self {
            addr: addr.to_string(),
            ack_timeout,
            conn: Some(conn),
        })
    }
}

#[async_trait]
impl ClickSink for TcpClickSink {
    async fn send_click(&mut self) -> Result<ClickAck, SinkError> {
        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = timeout(self.ack_timeout, Connection::open(&self.addr))
                    .await
                    .map_err(|_| SinkError::Timeout)??;
                info!("click sink reconnected to {}", self.addr);
                conn
            }
        };

        match timeout(self.ack_timeout, conn.round_trip()).await {
            Ok(Ok(ack)) => {
                self.conn = Some(conn);
                Ok(ack)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                // The abandoned call may leave a stale ack or a partial
                // request buffered on this connection. It is dropped here
                // so the next call starts clean.
                Err(SinkError::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(conn) = self.conn.as_mut() {
            conn.writer.shutdown().await?;
        }
        Ok(())
    }
}

/// Test sink that records calls and can be scripted to fail.
pub struct RecordingSink {
    clicks: u64,
    failed_acks: u64,
    failures_remaining: u32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            clicks: 0,
            failed_acks: 0,
            failures_remaining: 0,
        }
    }

    /// The next `count` calls will fail with a transport error.
    pub fn fail_next(&mut self, count: u32) {
        self.failures_remaining = count;
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn failed_calls(&self) -> u64 {
        self.failed_acks
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClickSink for RecordingSink {
    async fn send_click(&mut self) -> Result<ClickAck, SinkError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            self.failed_acks += 1;
            return Err(SinkError::Closed);
        }

        self.clicks += 1;
        Ok(ClickAck { success: true })
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
