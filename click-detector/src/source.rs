//! Frame sources.
//!
//! `MicrophoneSource` owns a dedicated capture thread because the cpal
//! stream handle is not `Send`; the thread feeds the shared ring buffer
//! and the async reader assembles fixed-size frames from it.
//! `ScriptedSource` replays canned frames for tests.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::audio_frame::{AudioFrame, CaptureBuffer, SAMPLE_RATE_HZ};

#[derive(Error, Debug)]
pub enum SourceError {
    /// The capture device cannot be opened or started at all. Fatal for
    /// the session; everything else is recoverable per iteration.
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("frame source exhausted")]
    Exhausted,
}

/// Blocking (awaiting) supplier of PCM frames.
#[async_trait]
pub trait FrameSource: Send {
    async fn read_frame(&mut self) -> Result<AudioFrame, SourceError>;
}

/// Default-input-device microphone source.
pub struct MicrophoneSource {
    buffer: Arc<CaptureBuffer>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneSource {
    /// Open the default input device and start capturing. Returns
    /// [`SourceError::DeviceUnavailable`] if the device cannot be opened,
    /// which callers treat as fatal.
    pub fn start() -> Result<Self, SourceError> {
        let buffer = Arc::new(CaptureBuffer::for_capture());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), SourceError>>();

        let thread_buffer = buffer.clone();
        let thread_shutdown = shutdown.clone();
        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(thread_buffer, thread_shutdown, ready_tx))
            .map_err(|e| {
                SourceError::DeviceUnavailable(format!("failed to spawn capture thread: {}", e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("microphone initialized at {} Hz", SAMPLE_RATE_HZ);
                Ok(Self {
                    buffer,
                    shutdown,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SourceError::DeviceUnavailable(
                    "capture thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Stop capturing and release the device. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl FrameSource for MicrophoneSource {
    async fn read_frame(&mut self) -> Result<AudioFrame, SourceError> {
        loop {
            if let Some(frame) = self.buffer.pop_frame() {
                return Ok(frame);
            }
            self.buffer.frame_ready().await;
        }
    }
}

/// Capture thread body: owns the cpal stream for its whole lifetime and
/// parks until shutdown. Dropping the stream releases the device handle.
fn capture_thread(
    buffer: Arc<CaptureBuffer>,
    shutdown: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::Sender<Result<(), SourceError>>,
) {
    let stream = match open_input_stream(buffer) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SourceError::Stream(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    info!("capture thread stopped, device released");
}

fn open_input_stream(buffer: Arc<CaptureBuffer>) -> Result<cpal::Stream, SourceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SourceError::DeviceUnavailable("no default input device".to_string()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(SAMPLE_RATE_HZ),
        buffer_size: cpal::BufferSize::Default,
    };

    // Overflow inside the callback drops old samples in the ring buffer;
    // the stream itself never aborts on a garbled read.
    let stream = match supported.sample_format() {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                buffer.push(data);
            },
            |err| warn!("audio stream error: {}", err),
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                buffer.push(&converted);
            },
            |err| warn!("audio stream error: {}", err),
            None,
        ),
        other => {
            return Err(SourceError::DeviceUnavailable(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| SourceError::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}

/// Test source replaying a fixed sequence of reads.
pub struct ScriptedSource {
    reads: VecDeque<Result<AudioFrame, SourceError>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
        }
    }

    pub fn from_frames(frames: Vec<AudioFrame>) -> Self {
        Self {
            reads: frames.into_iter().map(Ok).collect(),
        }
    }

    pub fn push_frame(&mut self, frame: AudioFrame) {
        self.reads.push_back(Ok(frame));
    }

    /// Queue a single failed read, as a garbled capture would produce.
    pub fn push_failure(&mut self) {
        self.reads
            .push_back(Err(SourceError::Stream("scripted read failure".to_string())));
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn read_frame(&mut self) -> Result<AudioFrame, SourceError> {
        self.reads.pop_front().unwrap_or(Err(SourceError::Exhausted))
    }
}
