//! Waveform envelope extraction for overview displays
//!
//! An envelope is a fixed number of loudness points covering the whole
//! source, normalized so the loudest point is 1.0. Computing it for a long
//! file takes a noticeable amount of time, so each player owns a
//! [`WaveformWorker`] that runs the extraction off the control thread:
//!
//! 1. `Player::load_source` calls [`WaveformWorker::request`] with the new
//!    source; the slot takes a fresh ticket and flips to `Pending`
//! 2. The worker thread computes the envelope (windows in parallel via rayon)
//! 3. The result is stored only if the slot still holds that ticket, so a
//!    newer load or an unload in the meantime discards it
//! 4. Callers poll [`WaveformWorker::state`]
//!
//! ```ignore
//! match player.waveform_envelope() {
//!     EnvelopeState::Ready(envelope) => draw(&envelope.points),
//!     EnvelopeState::Pending => draw_placeholder(),
//!     EnvelopeState::Empty => {}
//! }
//! ```

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use basedrop::Shared;
use rayon::prelude::*;

use crate::source::AudioSource;

/// Points per envelope unless configured otherwise
pub const DEFAULT_ENVELOPE_POINTS: usize = 1000;

/// Normalized loudness envelope of one source
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformEnvelope {
    /// One value in [0, 1] per window, in time order
    pub points: Vec<f32>,
}

impl WaveformEnvelope {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Envelope value under a fraction of the source length
    pub fn at_fraction(&self, fraction: f64) -> f32 {
        if self.points.is_empty() || !fraction.is_finite() {
            return 0.0;
        }
        let idx = (fraction.clamp(0.0, 1.0) * self.points.len() as f64) as usize;
        self.points[idx.min(self.points.len() - 1)]
    }
}

/// Compute a `points`-long RMS envelope of `source`
///
/// The source is cut into `points` equal windows of `frames / points` frames
/// (the remainder at the end is ignored). Each window's value is the RMS of
/// every channel, averaged over channels. Sources shorter than `points`
/// frames use one-frame windows and leave the trailing points at 0.
pub fn extract_envelope(source: &AudioSource, points: usize) -> WaveformEnvelope {
    if points == 0 {
        return WaveformEnvelope { points: Vec::new() };
    }

    let frames = source.frames();
    let channels = source.channels() as usize;
    let window = (frames / points).max(1);
    let samples = source.interleaved();

    let mut values: Vec<f32> = (0..points)
        .into_par_iter()
        .map(|i| {
            let start = i * window;
            if start >= frames {
                return 0.0;
            }
            let end = (start + window).min(frames);
            let chunk = &samples[start * channels..end * channels];
            window_rms(chunk, channels)
        })
        .collect();

    let max = values.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in &mut values {
            *v /= max;
        }
    }

    WaveformEnvelope { points: values }
}

/// Mean over channels of each channel's RMS
fn window_rms(interleaved: &[f32], channels: usize) -> f32 {
    let frames = interleaved.len() / channels;
    if frames == 0 {
        return 0.0;
    }
    let mut total = 0.0f64;
    for ch in 0..channels {
        let sum_sq: f64 = interleaved
            .iter()
            .skip(ch)
            .step_by(channels)
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        total += (sum_sq / frames as f64).sqrt();
    }
    (total / channels as f64) as f32
}

/// What a consumer sees when polling for an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeState {
    /// Nothing has been loaded
    Empty,
    /// A load happened and its envelope is still being computed
    Pending,
    Ready(Arc<WaveformEnvelope>),
}

impl EnvelopeState {
    pub fn is_pending(&self) -> bool {
        matches!(self, EnvelopeState::Pending)
    }
}

/// Latest envelope tagged with the ticket of the request it answers
///
/// Every request and every clear takes a new ticket.
#[derive(Debug)]
struct EnvelopeSlot {
    ticket: u64,
    state: EnvelopeState,
}

impl EnvelopeSlot {
    fn next_ticket(&mut self, state: EnvelopeState) -> u64 {
        self.ticket += 1;
        self.state = state;
        self.ticket
    }
}

struct EnvelopeRequest {
    ticket: u64,
    source: Shared<AudioSource>,
}

/// Background envelope extraction for one player
pub struct WaveformWorker {
    tx: Sender<EnvelopeRequest>,
    slot: Arc<Mutex<EnvelopeSlot>>,
    points: usize,
}

impl WaveformWorker {
    /// Spawn the worker thread
    ///
    /// The thread exits once the worker is dropped.
    pub fn spawn(points: usize) -> Self {
        let (tx, rx) = mpsc::channel::<EnvelopeRequest>();
        let slot = Arc::new(Mutex::new(EnvelopeSlot {
            ticket: 0,
            state: EnvelopeState::Empty,
        }));

        let thread_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("waveform-worker".to_string())
            .spawn(move || worker_thread(rx, thread_slot, points));
        if let Err(e) = spawned {
            // Requests will fail to send and the slot stays Pending
            log::error!("Failed to spawn waveform worker: {}", e);
        }

        Self { tx, slot, points }
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// Start computing the envelope for a newly loaded source
    ///
    /// Any result still in flight for an earlier request is discarded.
    pub fn request(&self, source: Shared<AudioSource>) {
        let ticket = lock_slot(&self.slot).next_ticket(EnvelopeState::Pending);
        if self.tx.send(EnvelopeRequest { ticket, source }).is_err() {
            log::error!("Waveform worker is not running; envelope stays pending");
        }
    }

    /// Forget the current envelope (after an unload)
    ///
    /// A computation still running for the old source is discarded.
    pub fn clear(&self) {
        lock_slot(&self.slot).next_ticket(EnvelopeState::Empty);
    }

    pub fn state(&self) -> EnvelopeState {
        lock_slot(&self.slot).state.clone()
    }

    /// Poll until the envelope leaves `Pending` or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> EnvelopeState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state();
            if !state.is_pending() || Instant::now() >= deadline {
                return state;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// A panic while holding the lock leaves a still-valid slot
fn lock_slot(slot: &Mutex<EnvelopeSlot>) -> MutexGuard<'_, EnvelopeSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn worker_thread(rx: Receiver<EnvelopeRequest>, slot: Arc<Mutex<EnvelopeSlot>>, points: usize) {
    log::debug!("Waveform worker thread starting");

    while let Ok(mut request) = rx.recv() {
        // Skip straight to the newest load
        while let Ok(newer) = rx.try_recv() {
            request = newer;
        }

        let started = Instant::now();
        let envelope = extract_envelope(&request.source, points);

        let mut slot = lock_slot(&slot);
        if slot.ticket == request.ticket {
            log::debug!(
                "Envelope for request {} ready in {:?} ({} frames)",
                request.ticket,
                started.elapsed(),
                request.source.frames()
            );
            slot.state = EnvelopeState::Ready(Arc::new(envelope));
        } else {
            log::debug!(
                "Discarding envelope for request {} (now {})",
                request.ticket,
                slot.ticket
            );
        }
    }

    log::debug!("Waveform worker thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc_handle;

    fn sine(seconds: f64, rate: u32, channels: u16) -> AudioSource {
        let frames = (seconds * rate as f64) as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let t = i as f32 / rate as f32;
                // Fade in so the envelope is not flat
                let v = (t * 220.0 * std::f32::consts::TAU).sin() * (t / seconds as f32);
                std::iter::repeat(v).take(channels as usize)
            })
            .collect();
        AudioSource::from_interleaved(samples, channels, rate).unwrap()
    }

    #[test]
    fn test_envelope_has_exact_length_and_unit_peak() {
        for seconds in [0.1, 1.0, 100.0] {
            let source = sine(seconds, 8000, 2);
            let envelope = extract_envelope(&source, DEFAULT_ENVELOPE_POINTS);
            assert_eq!(envelope.len(), 1000, "length for {}s", seconds);
            let max = envelope.points.iter().copied().fold(0.0f32, f32::max);
            assert!((max - 1.0).abs() < 1e-6, "max {} for {}s", max, seconds);
            assert!(envelope.points.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_fade_in_rises() {
        let envelope = extract_envelope(&sine(2.0, 8000, 1), 100);
        assert!(envelope.points[10] < envelope.points[90]);
        assert!(envelope.at_fraction(1.0) > envelope.at_fraction(0.1));
    }

    #[test]
    fn test_silent_source_is_all_zero() {
        let source = AudioSource::from_interleaved(vec![0.0; 4000], 2, 8000).unwrap();
        let envelope = extract_envelope(&source, 50);
        assert_eq!(envelope.len(), 50);
        assert!(envelope.points.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_source_pads_with_zero() {
        let source = AudioSource::from_interleaved(vec![0.5, 0.5, 0.25, 0.25], 2, 8000).unwrap();
        let envelope = extract_envelope(&source, 4);
        assert_eq!(envelope.points, vec![1.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_channels_are_averaged() {
        // Left at 1.0, right silent: RMS (1 + 0) / 2 = 0.5 before normalizing
        let source = AudioSource::from_interleaved(vec![1.0, 0.0, 1.0, 0.0], 2, 8000).unwrap();
        assert!((window_rms(source.interleaved(), 2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_worker_publishes_latest_generation() {
        let worker = WaveformWorker::spawn(64);
        assert_eq!(worker.state(), EnvelopeState::Empty);

        let handle = gc_handle();
        worker.request(Shared::new(&handle, sine(1.0, 8000, 1)));
        worker.request(Shared::new(&handle, sine(0.5, 8000, 2)));

        match worker.wait(Duration::from_secs(10)) {
            EnvelopeState::Ready(envelope) => assert_eq!(envelope.len(), 64),
            other => panic!("envelope not ready: {:?}", other),
        }

        worker.clear();
        assert_eq!(worker.state(), EnvelopeState::Empty);
    }

    #[test]
    fn test_clear_discards_envelope_in_flight() {
        let worker = WaveformWorker::spawn(DEFAULT_ENVELOPE_POINTS);
        let long = sine(120.0, 44100, 2);
        worker.request(Shared::new(&gc_handle(), long));
        worker.clear();

        // Give the worker time to finish the extraction it already started
        thread::sleep(Duration::from_secs(3));
        assert_eq!(worker.state(), EnvelopeState::Empty);

        worker.request(Shared::new(&gc_handle(), sine(0.5, 8000, 1)));
        assert!(matches!(
            worker.wait(Duration::from_secs(10)),
            EnvelopeState::Ready(_)
        ));
    }
}
