// Audio clock backed by the number of frames rendered by the output callback

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared frame counter turning rendered frames into audio clock seconds
///
/// The audio callback advances the counter after each buffer; the scheduler
/// thread reads it. Resolution is one frame, the clock only moves while the
/// stream is running.
#[derive(Clone, Debug)]
pub struct AudioTiming {
    /// Frames rendered so far (incremented by audio callback)
    sample_position: Arc<AtomicU64>,
    sample_rate: f64,
}

impl AudioTiming {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_position: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate as f64,
        }
    }

    /// Frame index of the next frame the callback will render
    pub fn current_sample(&self) -> u64 {
        self.sample_position.load(Ordering::Acquire)
    }

    /// Advance frame position (called from audio callback)
    pub fn advance(&self, frames: usize) {
        self.sample_position
            .fetch_add(frames as u64, Ordering::Release);
    }

    /// Current audio clock time in seconds
    pub fn now_seconds(&self) -> f64 {
        self.samples_to_seconds(self.current_sample())
    }

    pub fn samples_to_seconds(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate
    }

    /// Frame index at which a clock time falls (rounded to nearest frame)
    pub fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if seconds <= 0.0 {
            return 0;
        }
        (seconds * self.sample_rate).round() as u64
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }
}
