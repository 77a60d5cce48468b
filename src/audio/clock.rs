// Audio clock abstraction - the precise playback clock and the coarse wall clock
//
// The scheduler reads two clocks:
// - the audio clock (seconds, sub-millisecond resolution) on which tones are committed
// - the wall clock (milliseconds) driving the polling timer and UI timestamps

use crate::error::DeviceError;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Run state of an audio device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Clock advances and committed tones sound
    Running,
    /// Clock frozen (e.g. created before any user interaction, or throttled by the host)
    Suspended,
    /// Device torn down, cannot be resumed
    Closed,
}

/// A tone committed to the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    /// Linear gain in [0, 1]
    pub gain: f32,
    /// Audio clock time (seconds) at which the tone starts
    pub start_time: f64,
    /// Length in seconds
    pub duration: f64,
}

impl Tone {
    pub fn new(frequency_hz: f32, gain: f32, start_time: f64, duration: f64) -> Self {
        Self {
            frequency_hz,
            gain: gain.clamp(0.0, 1.0),
            start_time,
            duration: duration.max(0.0),
        }
    }

    /// Audio clock time at which the tone stops
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// High-resolution playback clock plus tone output
///
/// Owned by the runtime environment. Schedulers only read the clock and
/// commit tones; a commit cannot be revoked once made.
pub trait AudioDevice {
    /// Current audio clock time in seconds
    fn now(&self) -> f64;

    fn state(&self) -> DeviceState;

    /// Resume a suspended device. No-op when already running.
    fn resume(&self) -> Result<(), DeviceError>;

    /// Commit a tone to start at `tone.start_time` on the audio clock
    fn schedule_tone(&self, tone: Tone) -> Result<(), DeviceError>;
}

/// Coarse host clock used for polling and UI synchronisation
pub trait WallClock {
    /// Milliseconds since an arbitrary origin
    fn now_ms(&self) -> f64;

    /// Block the host loop until `deadline_ms`. Only the event loop calls this.
    fn sleep_until_ms(&self, deadline_ms: f64);
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone)]
pub struct SystemWallClock {
    origin: Instant,
}

impl SystemWallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemWallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemWallClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn sleep_until_ms(&self, deadline_ms: f64) {
        let remaining = deadline_ms - self.now_ms();
        if remaining > 0.0 {
            thread::sleep(Duration::from_secs_f64(remaining / 1000.0));
        }
    }
}

/// Handles to the clocks a scheduler component runs against
#[derive(Clone)]
pub struct PlaybackContext {
    pub device: Rc<dyn AudioDevice>,
    pub wall: Rc<dyn WallClock>,
}

impl PlaybackContext {
    pub fn new(device: Rc<dyn AudioDevice>, wall: Rc<dyn WallClock>) -> Self {
        Self { device, wall }
    }

    /// Make sure the audio clock advances before a session starts
    ///
    /// A device that stays suspended would freeze the session forever, so a
    /// failed resume aborts the session instead.
    pub fn ensure_running(&self) -> Result<(), DeviceError> {
        match self.device.state() {
            DeviceState::Running => Ok(()),
            DeviceState::Suspended => {
                self.device.resume()?;
                match self.device.state() {
                    DeviceState::Running => Ok(()),
                    state => Err(DeviceError::ResumeFailed(format!(
                        "device still {:?} after resume",
                        state
                    ))),
                }
            }
            DeviceState::Closed => Err(DeviceError::ResumeFailed("device is closed".to_string())),
        }
    }

    /// Approximate wall-clock time (ms) at which an audio clock time will be heard
    pub fn wall_time_for(&self, audio_time: f64) -> f64 {
        let until = audio_time - self.device.now();
        self.wall.now_ms() + until * 1000.0
    }
}
