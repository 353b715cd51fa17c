//! PCM frame type and the capture ring buffer.
//!
//! `CaptureBuffer` holds a short rolling window of microphone samples
//! between the audio callback thread and the async frame reader. When the
//! buffer is full the oldest samples are dropped; capture never blocks the
//! audio thread.

use cache_padded::CachePadded;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::warn;

/// Audio sample format (16-bit PCM, mono).
pub type AudioSample = i16;

/// Samples per frame handed to the detector.
pub const FRAME_SIZE_SAMPLES: usize = 1024;

/// Capture sample rate, constant for the session.
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Capture buffer depth in frames (~0.37 s at 44.1 kHz).
pub const CAPTURE_BUFFER_FRAMES: usize = 16;

/// One fixed-size frame of PCM samples, immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<AudioSample>,
}

impl AudioFrame {
    /// Wrap captured samples. Frames are nominally `FRAME_SIZE_SAMPLES`
    /// long; a short frame from a garbled read is accepted rather than
    /// aborting the pipeline.
    pub fn new(samples: Vec<AudioSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[AudioSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

type RingBuffer = HeapRb<AudioSample>;
type RingProducer = <RingBuffer as Split>::Prod;
type RingConsumer = <RingBuffer as Split>::Cons;

/// Sample ring buffer between the capture callback and the frame reader.
///
/// Writers call [`CaptureBuffer::push`] from the audio thread; the reader
/// awaits [`CaptureBuffer::frame_ready`] and drains whole frames.
pub struct CaptureBuffer {
    producer: CachePadded<Mutex<RingProducer>>,
    consumer: CachePadded<Mutex<RingConsumer>>,
    notify: Notify,
}

impl CaptureBuffer {
    pub fn new(capacity_samples: usize) -> Self {
        let rb = HeapRb::<AudioSample>::new(capacity_samples);
        let (producer, consumer) = rb.split();

        Self {
            producer: CachePadded::new(Mutex::new(producer)),
            consumer: CachePadded::new(Mutex::new(consumer)),
            notify: Notify::new(),
        }
    }

    /// Default-sized buffer used by the microphone source.
    pub fn for_capture() -> Self {
        Self::new(FRAME_SIZE_SAMPLES * CAPTURE_BUFFER_FRAMES)
    }

    /// Append samples, dropping the oldest buffered samples if the new
    /// data does not fit. Returns the number of samples written.
    pub fn push(&self, samples: &[AudioSample]) -> usize {
        let mut producer = self.producer.lock().unwrap();

        let vacant = producer.vacant_len();
        if samples.len() > vacant {
            let to_drop = samples.len() - vacant;
            let mut consumer = self.consumer.lock().unwrap();
            consumer.skip(to_drop);
            drop(consumer);

            warn!("capture buffer full, dropped {} oldest samples", to_drop);
        }

        let written = producer.push_slice(samples);
        self.notify.notify_one();
        written
    }

    /// Remove and return one full frame, or `None` if fewer than
    /// `FRAME_SIZE_SAMPLES` samples are buffered.
    pub fn pop_frame(&self) -> Option<AudioFrame> {
        let mut consumer = self.consumer.lock().unwrap();

        if consumer.occupied_len() < FRAME_SIZE_SAMPLES {
            return None;
        }

        let mut samples = vec![0 as AudioSample; FRAME_SIZE_SAMPLES];
        let read = consumer.pop_slice(&mut samples);
        samples.truncate(read);

        Some(AudioFrame::new(samples))
    }

    /// Wait until more samples have been pushed.
    pub async fn frame_ready(&self) {
        self.notify.notified().await;
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.consumer.lock().unwrap().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.consumer.lock().unwrap().capacity().get()
    }
}
