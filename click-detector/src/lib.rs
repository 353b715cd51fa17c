//! Acoustic transient detection service library.
//!
//! Consumes fixed-size PCM frames from a microphone, tracks the ambient
//! noise floor with an exponential moving average, and emits debounced
//! "click" events to a remote action executor.

pub mod audio_frame;
pub mod clock;
pub mod detector;
pub mod pipeline;
pub mod sink;
pub mod source;

// Re-export main types
pub use audio_frame::{AudioFrame, AudioSample, CaptureBuffer, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use clock::{system_clock, ManualClock, MonotonicClock, SharedClock, SystemClock};
pub use detector::{DetectorConfig, DetectorError, DetectorStats, TransientDetector};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineReport};
pub use sink::{ClickAck, ClickSink, RecordingSink, SinkError, TcpClickSink};
pub use source::{FrameSource, MicrophoneSource, ScriptedSource, SourceError};
