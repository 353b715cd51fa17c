//! Pinch-drag gesture tracking service library.
//!
//! Consumes per-frame hand observations from an external landmark
//! provider, runs a pinch state machine with an anchored relative-motion
//! integrator, and streams clamped pointer updates to a remote action
//! executor over a persistent connection.

pub mod controller;
pub mod observation;
pub mod pipeline;
pub mod streamer;

// Re-export main types
pub use controller::{ControllerConfig, ControllerError, GestureController};
pub use observation::{
    pinch_ratio, HandObservation, JsonLineProvider, LandmarkFrame, ObservationProvider,
    ProviderError, ScriptedProvider, Vec2, DEFAULT_PINCH_THRESHOLD,
};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineReport};
pub use streamer::{
    DrainStats, PointTransport, PointerStreamer, PointerUpdate, RecordingTransport, StreamerError,
    TcpTransport, DEFAULT_QUEUE_CAPACITY,
};
