//! Integration tests for the gesture pipeline.
//!
//! Drives scripted observation sequences end to end through the
//! controller and streamer, asserting on the pointer updates that reach
//! the transport.

use approx::assert_relative_eq;
use gesture_tracker::{
    run_pipeline, ControllerConfig, GestureController, HandObservation, JsonLineProvider,
    PipelineConfig, PointerStreamer, RecordingTransport, ScriptedProvider, Vec2,
    DEFAULT_PINCH_THRESHOLD, DEFAULT_QUEUE_CAPACITY,
};
use std::time::Duration;
use tokio::io::BufReader;

fn pinched(x: f32, y: f32) -> Option<HandObservation> {
    Some(HandObservation {
        x,
        y,
        is_pinched: true,
        thumb: Vec2::new(x, y),
        index_tip: Vec2::new(x, y),
    })
}

fn open_hand(x: f32, y: f32) -> Option<HandObservation> {
    pinched(x, y).map(|o| HandObservation {
        is_pinched: false,
        ..o
    })
}

fn fast_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        idle_yield: Duration::from_micros(10),
    }
}

fn controller() -> GestureController {
    GestureController::new(ControllerConfig::default()).unwrap()
}

#[tokio::test]
async fn drag_scenario_produces_ordered_cursor_path() {
    let mut provider = ScriptedProvider::new(vec![
        open_hand(0.4, 0.4),
        pinched(0.40, 0.40), // anchor frame, no update
        pinched(0.42, 0.40),
        pinched(0.44, 0.40),
        open_hand(0.44, 0.40),
    ]);

    let (transport, sent) = RecordingTransport::new();
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);
    let mut controller = controller();

    let report = run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &fast_pipeline_config(),
        std::future::pending(),
    )
    .await;
    let drain = streamer.stop().await;

    assert_eq!(report.frames, 5);
    assert_eq!(report.updates, 2);
    assert_eq!(drain.sent, 2);

    let sent = sent.lock().unwrap();
    assert_relative_eq!(sent[0].x, 0.55, max_relative = 1e-3);
    assert_relative_eq!(sent[1].x, 0.60, max_relative = 1e-3);
    assert_relative_eq!(sent[0].y, 0.5, max_relative = 1e-3);
}

#[tokio::test]
async fn tracking_loss_mid_drag_does_not_jump_on_resume() {
    let mut provider = ScriptedProvider::new(vec![
        pinched(0.2, 0.2),
        pinched(0.24, 0.2),
        None, // hand lost mid-drag
        pinched(0.8, 0.8), // resumes far away: anchor only
        pinched(0.82, 0.8),
    ]);

    let (transport, sent) = RecordingTransport::new();
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);
    let mut controller = controller();

    run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &fast_pipeline_config(),
        std::future::pending(),
    )
    .await;
    streamer.stop().await;

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);

    // First update: 0.5 + 0.04 * 2.5 = 0.6. The resume frame emits
    // nothing; the following frame moves by its own small delta only.
    assert_relative_eq!(sent[0].x, 0.6, max_relative = 1e-3);
    assert_relative_eq!(sent[1].x, 0.65, max_relative = 1e-3);
}

#[tokio::test]
async fn sustained_drag_is_clamped_at_the_edge() {
    let mut frames = vec![pinched(0.0, 0.5)];
    for i in 1..=10 {
        frames.push(pinched(0.1 * i as f32, 0.5));
    }

    let mut provider = ScriptedProvider::new(frames);
    let (transport, sent) = RecordingTransport::new();
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);
    let mut controller = controller();

    run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &fast_pipeline_config(),
        std::future::pending(),
    )
    .await;
    streamer.stop().await;

    let sent = sent.lock().unwrap();
    assert!(!sent.is_empty());
    for update in sent.iter() {
        assert!((0.0..=1.0).contains(&update.x));
        assert!((0.0..=1.0).contains(&update.y));
    }
    assert_relative_eq!(sent.last().unwrap().x, 1.0);
}

#[tokio::test]
async fn malformed_lines_are_skipped_and_clear_the_anchor() {
    // A garbled line between two pinched frames behaves like a no-hand
    // frame: the drag is interrupted and the next pinch re-anchors.
    let input = concat!(
        "{\"thumb\":{\"x\":0.5,\"y\":0.5},\"index_tip\":{\"x\":0.5,\"y\":0.5},",
        "\"wrist\":{\"x\":0.0,\"y\":0.0},\"index_mcp\":{\"x\":0.0,\"y\":0.5}}\n",
        "garbage\n",
        "{\"thumb\":{\"x\":0.6,\"y\":0.6},\"index_tip\":{\"x\":0.6,\"y\":0.6},",
        "\"wrist\":{\"x\":0.1,\"y\":0.1},\"index_mcp\":{\"x\":0.1,\"y\":0.6}}\n",
    );

    let mut provider =
        JsonLineProvider::new(BufReader::new(input.as_bytes()), DEFAULT_PINCH_THRESHOLD);
    let (transport, sent) = RecordingTransport::new();
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);
    let mut controller = controller();

    let report = run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &fast_pipeline_config(),
        std::future::pending(),
    )
    .await;
    streamer.stop().await;

    assert_eq!(report.malformed, 1);
    // Both valid frames are anchor frames (the bad line released the
    // pinch in between), so nothing was emitted.
    assert_eq!(report.updates, 0);
    assert!(sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn shutdown_future_ends_the_session() {
    let mut frames = Vec::new();
    for _ in 0..10_000 {
        frames.push(open_hand(0.5, 0.5));
    }

    let mut provider = ScriptedProvider::new(frames);
    let (transport, _sent) = RecordingTransport::new();
    let mut streamer = PointerStreamer::start(transport, DEFAULT_QUEUE_CAPACITY);
    let mut controller = controller();

    let report = run_pipeline(
        &mut provider,
        &mut controller,
        &mut streamer,
        &fast_pipeline_config(),
        tokio::time::sleep(Duration::from_millis(20)),
    )
    .await;
    streamer.stop().await;

    assert!(report.frames < 10_000);
    assert_eq!(report.updates, 0);
}
