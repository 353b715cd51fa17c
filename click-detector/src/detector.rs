//! Adaptive acoustic transient detector.
//!
//! Tracks the ambient noise floor with an exponential moving average and
//! fires when a frame's RMS loudness spikes well above it. A refractory
//! window debounces the output so one physical pop yields one event.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

use crate::audio_frame::AudioFrame;
use crate::clock::SharedClock;

/// Weight kept from the previous baseline on each update.
const EMA_RETAIN: f32 = 0.95;

/// Strictly-positive floor for volume and baseline.
const VOLUME_EPSILON: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Detector tuning, read once at startup and never re-read mid-session.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// A frame fires when its volume exceeds `baseline * sensitivity_multiplier`.
    pub sensitivity_multiplier: f32,

    /// Minimum interval enforced between two accepted events.
    pub cooldown: Duration,

    /// Baseline seed. Deliberately above silence so the first few frames
    /// cannot fire before the average has converged on real room noise.
    pub initial_baseline: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sensitivity_multiplier: 6.0,
            cooldown: Duration::from_millis(300),
            initial_baseline: 10.0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.sensitivity_multiplier <= 0.0 {
            return Err(DetectorError::InvalidConfig(
                "sensitivity_multiplier must be positive".to_string(),
            ));
        }

        if self.initial_baseline <= 0.0 {
            return Err(DetectorError::InvalidConfig(
                "initial_baseline must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Counters exposed for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorStats {
    pub frames_processed: u64,
    pub events_emitted: u64,
    pub events_suppressed: u64,
}

/// Acoustic transient detector. Owned by a single pipeline loop; all
/// state is mutated only through [`TransientDetector::process`].
pub struct TransientDetector {
    config: DetectorConfig,
    clock: SharedClock,
    baseline: f32,
    last_event: Option<Instant>,
    stats: DetectorStats,
}

impl TransientDetector {
    pub fn new(config: DetectorConfig, clock: SharedClock) -> Result<Self, DetectorError> {
        config.validate()?;

        Ok(Self {
            baseline: config.initial_baseline,
            config,
            clock,
            last_event: None,
            stats: DetectorStats::default(),
        })
    }

    /// Consume one frame; returns whether a debounced transient fired.
    ///
    /// The trigger compares the frame against the baseline as it stood
    /// when the frame arrived; the moving average then folds the frame in
    /// unconditionally so the floor keeps tracking ambient noise.
    pub fn process(&mut self, frame: &AudioFrame) -> bool {
        let volume = rms_volume(frame.samples());
        let reference = self.baseline;

        self.baseline =
            (self.baseline * EMA_RETAIN + volume * (1.0 - EMA_RETAIN)).max(VOLUME_EPSILON);
        self.stats.frames_processed += 1;

        trace!(volume, baseline = self.baseline, "frame processed");

        if volume <= reference * self.config.sensitivity_multiplier {
            return false;
        }

        let now = self.clock.now();
        let gate_open = match self.last_event {
            None => true,
            Some(previous) => now.duration_since(previous) > self.config.cooldown,
        };

        if !gate_open {
            // Intentionally dropped, not an error. The cooldown window is
            // neither reset nor extended.
            self.stats.events_suppressed += 1;
            debug!(volume, "transient inside refractory window, dropped");
            return false;
        }

        self.last_event = Some(now);
        self.stats.events_emitted += 1;
        debug!(volume, baseline = reference, "transient accepted");

        true
    }

    /// Current adaptive noise floor.
    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.baseline = self.config.initial_baseline;
        self.last_event = None;
        self.stats = DetectorStats::default();
        debug!("detector reset");
    }
}

/// Root-mean-square loudness of a frame, strictly positive.
///
/// Samples are cast to floating point before squaring so the accumulator
/// cannot overflow; the epsilon keeps the result usable as a divisor.
pub fn rms_volume(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return VOLUME_EPSILON;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let s = sample as f64;
            s * s
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32 + VOLUME_EPSILON
}
