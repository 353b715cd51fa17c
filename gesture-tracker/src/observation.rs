//! Hand observations and the provider seam.
//!
//! The neural landmark inference lives in an external process; it hands
//! this service one JSON line per camera frame with four normalized
//! landmark points. Pinch detection is pure geometry over those points:
//! thumb-to-index distance normalized by a hand-size reference distance,
//! compared against a fixed threshold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Pinch ratio threshold: below this the hand counts as pinched.
pub const DEFAULT_PINCH_THRESHOLD: f32 = 0.22;

/// Guard against division by zero for a degenerate hand-size distance.
const HAND_SIZE_EPSILON: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("malformed observation line: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("observation stream closed")]
    Closed,

    #[error("I/O error reading observations: {0}")]
    Io(#[from] std::io::Error),
}

/// 2D point in normalized image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Landmark summary produced per frame by the external hand tracker:
/// thumb tip, index tip, plus wrist and index knuckle as the hand-size
/// reference pair.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LandmarkFrame {
    pub thumb: Vec2,
    pub index_tip: Vec2,
    pub wrist: Vec2,
    pub index_mcp: Vec2,
}

/// Thumb-to-index distance normalized by hand size. Stateless.
pub fn pinch_ratio(frame: &LandmarkFrame) -> f32 {
    let pinch_dist = frame.thumb.distance(frame.index_tip);
    let hand_size = frame.wrist.distance(frame.index_mcp);
    pinch_dist / (hand_size + HAND_SIZE_EPSILON)
}

/// One frame's view of the tracked hand, normalized coordinates in [0,1].
#[derive(Debug, Clone, Copy)]
pub struct HandObservation {
    /// Midpoint of thumb and index tips; the raw position the controller
    /// anchors and integrates against.
    pub x: f32,
    pub y: f32,

    /// Authoritative pinch verdict for this frame.
    pub is_pinched: bool,

    pub thumb: Vec2,
    pub index_tip: Vec2,
}

impl HandObservation {
    pub fn from_landmarks(frame: &LandmarkFrame, pinch_threshold: f32) -> Self {
        Self {
            x: (frame.thumb.x + frame.index_tip.x) / 2.0,
            y: (frame.thumb.y + frame.index_tip.y) / 2.0,
            is_pinched: pinch_ratio(frame) < pinch_threshold,
            thumb: frame.thumb,
            index_tip: frame.index_tip,
        }
    }
}

/// Per-frame supplier of hand observations. `Ok(None)` means the frame
/// was processed but no hand was detected.
#[async_trait]
pub trait ObservationProvider: Send {
    async fn next_observation(&mut self) -> Result<Option<HandObservation>, ProviderError>;
}

/// Reads one JSON landmark line per frame from the external tracker
/// process. A blank line means no hand was detected this frame; EOF ends
/// the session.
pub struct JsonLineProvider<R> {
    reader: R,
    pinch_threshold: f32,
    line: String,
}

impl<R> JsonLineProvider<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, pinch_threshold: f32) -> Self {
        Self {
            reader,
            pinch_threshold,
            line: String::new(),
        }
    }
}

#[async_trait]
impl<R> ObservationProvider for JsonLineProvider<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_observation(&mut self) -> Result<Option<HandObservation>, ProviderError> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line).await?;
        if n == 0 {
            return Err(ProviderError::Closed);
        }

        let trimmed = self.line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let landmarks: LandmarkFrame = serde_json::from_str(trimmed)?;
        let observation = HandObservation::from_landmarks(&landmarks, self.pinch_threshold);

        debug!(
            x = observation.x,
            y = observation.y,
            pinched = observation.is_pinched,
            "observation"
        );

        Ok(Some(observation))
    }
}

/// Test provider replaying a fixed per-frame sequence.
pub struct ScriptedProvider {
    frames: VecDeque<Option<HandObservation>>,
}

impl ScriptedProvider {
    pub fn new(frames: Vec<Option<HandObservation>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

#[async_trait]
impl ObservationProvider for ScriptedProvider {
    async fn next_observation(&mut self) -> Result<Option<HandObservation>, ProviderError> {
        self.frames.pop_front().ok_or(ProviderError::Closed)
    }
}
