//! Pinch-drag relative motion controller.
//!
//! Integrates frame-to-frame deltas of the pinched hand into a virtual
//! cursor. Every pinched frame re-anchors, so the controller behaves as a
//! velocity integrator rather than an absolute-position mapper: immune to
//! absolute hand drift, at the cost of compounding per-frame jitter.

use thiserror::Error;
use tracing::{debug, trace};

use crate::observation::{HandObservation, Vec2};
use crate::streamer::PointerUpdate;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Controller tuning, read once at startup.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Per-axis gain applied to raw hand deltas.
    pub sensitivity_x: f32,
    pub sensitivity_y: f32,

    /// Cursor position at session start, normalized [0,1].
    pub start_x: f32,
    pub start_y: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sensitivity_x: 2.5,
            sensitivity_y: 2.5,
            start_x: 0.5,
            start_y: 0.5,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.sensitivity_x <= 0.0 || self.sensitivity_y <= 0.0 {
            return Err(ControllerError::InvalidConfig(
                "sensitivities must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.start_x) || !(0.0..=1.0).contains(&self.start_y) {
            return Err(ControllerError::InvalidConfig(
                "start position must be within [0,1]".to_string(),
            ));
        }

        Ok(())
    }
}

/// Gesture transducer. Owned by a single pipeline loop.
///
/// `anchor` is `Some` exactly while pinching and always holds the raw
/// position of the previous pinched frame; losing the hand or releasing
/// the pinch clears it, so tracking dropouts can never produce a jump
/// when the pinch resumes.
pub struct GestureController {
    config: ControllerConfig,
    cursor: Vec2,
    anchor: Option<Vec2>,
    frames_processed: u64,
    updates_emitted: u64,
}

impl GestureController {
    pub fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        config.validate()?;

        Ok(Self {
            cursor: Vec2::new(config.start_x, config.start_y),
            config,
            anchor: None,
            frames_processed: 0,
            updates_emitted: 0,
        })
    }

    /// Consume one frame's observation (or its absence); returns at most
    /// one pointer update. The cursor is clamped to the unit square at
    /// the point of update, never deferred.
    pub fn process(&mut self, observation: Option<&HandObservation>) -> Option<PointerUpdate> {
        self.frames_processed += 1;

        let obs = match observation {
            Some(obs) => obs,
            None => {
                if self.anchor.take().is_some() {
                    debug!("hand tracking lost, anchor cleared");
                }
                return None;
            }
        };

        if !obs.is_pinched {
            if self.anchor.take().is_some() {
                debug!("pinch released");
            }
            return None;
        }

        let raw = Vec2::new(obs.x, obs.y);

        let update = match self.anchor {
            None => {
                // Anchor frame: no prior reference to compute a delta
                // against, so nothing is emitted.
                debug!(x = raw.x, y = raw.y, "pinch started, anchored");
                None
            }
            Some(anchor) => {
                let dx = raw.x - anchor.x;
                let dy = raw.y - anchor.y;

                self.cursor.x = (self.cursor.x + dx * self.config.sensitivity_x).clamp(0.0, 1.0);
                self.cursor.y = (self.cursor.y + dy * self.config.sensitivity_y).clamp(0.0, 1.0);

                self.updates_emitted += 1;
                trace!(x = self.cursor.x, y = self.cursor.y, "cursor moved");

                Some(PointerUpdate {
                    x: self.cursor.x,
                    y: self.cursor.y,
                    confidence: 1.0,
                })
            }
        };

        // Every pinched frame becomes the reference for the next one.
        self.anchor = Some(raw);

        update
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn is_pinching(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn updates_emitted(&self) -> u64 {
        self.updates_emitted
    }

    pub fn reset(&mut self) {
        self.cursor = Vec2::new(self.config.start_x, self.config.start_y);
        self.anchor = None;
        self.frames_processed = 0;
        self.updates_emitted = 0;
        debug!("controller reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pinched(x: f32, y: f32) -> HandObservation {
        HandObservation {
            x,
            y,
            is_pinched: true,
            thumb: Vec2::new(x, y),
            index_tip: Vec2::new(x, y),
        }
    }

    fn open_hand(x: f32, y: f32) -> HandObservation {
        HandObservation {
            is_pinched: false,
            ..pinched(x, y)
        }
    }

    fn controller() -> GestureController {
        GestureController::new(ControllerConfig::default()).unwrap()
    }

    #[test]
    fn anchor_frame_emits_nothing() {
        let mut ctl = controller();

        assert!(ctl.process(Some(&pinched(0.9, 0.1))).is_none());
        assert!(ctl.is_pinching());
        assert_relative_eq!(ctl.cursor().x, 0.5);
        assert_relative_eq!(ctl.cursor().y, 0.5);
    }

    #[test]
    fn continued_pinch_integrates_scaled_delta() {
        let mut ctl = controller();

        assert!(ctl.process(Some(&pinched(0.40, 0.40))).is_none());
        let update = ctl.process(Some(&pinched(0.41, 0.40))).unwrap();

        assert_relative_eq!(update.x, 0.525, max_relative = 1e-4);
        assert_relative_eq!(update.y, 0.5, max_relative = 1e-4);
        assert_relative_eq!(update.confidence, 1.0);
    }

    #[test]
    fn every_pinched_frame_re_anchors() {
        let mut ctl = controller();

        ctl.process(Some(&pinched(0.40, 0.40)));
        ctl.process(Some(&pinched(0.41, 0.40)));

        // The delta is measured from the previous frame, not from the
        // original pinch point.
        let update = ctl.process(Some(&pinched(0.42, 0.40))).unwrap();
        assert_relative_eq!(update.x, 0.55, max_relative = 1e-4);
    }

    #[test]
    fn unpinched_frames_emit_nothing() {
        let mut ctl = controller();

        assert!(ctl.process(Some(&open_hand(0.3, 0.3))).is_none());
        assert!(ctl.process(Some(&open_hand(0.7, 0.7))).is_none());
        assert!(!ctl.is_pinching());
    }

    #[test]
    fn release_then_re_pinch_is_anchor_only() {
        let mut ctl = controller();

        ctl.process(Some(&pinched(0.2, 0.2)));
        ctl.process(Some(&pinched(0.3, 0.3)));
        let cursor_before = ctl.cursor();

        ctl.process(Some(&open_hand(0.3, 0.3)));
        assert!(!ctl.is_pinching());

        // Re-pinch far from the release point: anchor frame only, no
        // jump from the stale position.
        assert!(ctl.process(Some(&pinched(0.9, 0.9))).is_none());
        assert_eq!(ctl.cursor(), cursor_before);

        let update = ctl.process(Some(&pinched(0.91, 0.9))).unwrap();
        assert_relative_eq!(update.x, cursor_before.x + 0.025, max_relative = 1e-3);
    }

    #[test]
    fn tracking_loss_clears_the_anchor() {
        let mut ctl = controller();

        ctl.process(Some(&pinched(0.2, 0.2)));
        ctl.process(Some(&pinched(0.25, 0.2)));
        let cursor_before = ctl.cursor();

        // Hand disappears mid-drag.
        assert!(ctl.process(None).is_none());
        assert!(!ctl.is_pinching());

        // Tracking resumes elsewhere: no stale-anchor jump.
        assert!(ctl.process(Some(&pinched(0.8, 0.8))).is_none());
        assert_eq!(ctl.cursor(), cursor_before);
    }

    #[test]
    fn cursor_never_leaves_the_unit_square() {
        let mut ctl = controller();

        // Sustained rightward/downward drag far past the edge.
        ctl.process(Some(&pinched(0.0, 0.0)));
        for i in 1..=20 {
            let pos = 0.05 * i as f32;
            if let Some(update) = ctl.process(Some(&pinched(pos, pos))) {
                assert!((0.0..=1.0).contains(&update.x));
                assert!((0.0..=1.0).contains(&update.y));
            }
        }
        assert_relative_eq!(ctl.cursor().x, 1.0);
        assert_relative_eq!(ctl.cursor().y, 1.0);

        // And back past the opposite edge.
        ctl.process(Some(&open_hand(1.0, 1.0)));
        ctl.process(Some(&pinched(1.0, 1.0)));
        for i in 1..=20 {
            let pos = 1.0 - 0.05 * i as f32;
            if let Some(update) = ctl.process(Some(&pinched(pos, pos))) {
                assert!((0.0..=1.0).contains(&update.x));
                assert!((0.0..=1.0).contains(&update.y));
            }
        }
        assert_relative_eq!(ctl.cursor().x, 0.0);
        assert_relative_eq!(ctl.cursor().y, 0.0);
    }

    #[test]
    fn axes_clamp_independently() {
        let mut ctl = controller();

        ctl.process(Some(&pinched(0.5, 0.5)));
        // Large x move, none in y.
        let update = ctl.process(Some(&pinched(0.95, 0.5))).unwrap();

        assert_relative_eq!(update.x, 1.0);
        assert_relative_eq!(update.y, 0.5);
    }

    #[test]
    fn reset_restores_start_position_and_clears_the_pinch() {
        let mut ctl = controller();

        ctl.process(Some(&pinched(0.4, 0.4)));
        ctl.process(Some(&pinched(0.5, 0.4)));
        assert!(ctl.is_pinching());
        assert!(ctl.cursor().x > 0.5);

        ctl.reset();
        assert!(!ctl.is_pinching());
        assert_relative_eq!(ctl.cursor().x, 0.5);
        assert_relative_eq!(ctl.cursor().y, 0.5);
        assert_eq!(ctl.frames_processed(), 0);
        assert_eq!(ctl.updates_emitted(), 0);
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        let mut config = ControllerConfig::default();
        assert!(config.validate().is_ok());

        config.sensitivity_x = 0.0;
        assert!(config.validate().is_err());

        config.sensitivity_x = 2.5;
        config.start_y = 1.5;
        assert!(config.validate().is_err());
    }
}
