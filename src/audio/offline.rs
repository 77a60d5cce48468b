// Offline device - simulated audio and wall clocks for tests and dry runs
//
// Time only moves when the owner advances it (or when the event loop sleeps
// on it), which makes whole scheduling sessions deterministic.

use crate::audio::clock::{AudioDevice, DeviceState, PlaybackContext, Tone, WallClock};
use crate::error::DeviceError;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A tone as it was handed to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommittedTone {
    pub tone: Tone,
    /// Audio clock time at which the commit happened
    pub committed_at: f64,
}

/// Source of extra milliseconds added to every timer wake-up
pub type LatenessFn = Box<dyn FnMut() -> f64>;

pub struct OfflineDevice {
    audio_time: Cell<f64>,
    wall_ms: Cell<f64>,
    state: Cell<DeviceState>,
    resume_fails: Cell<bool>,
    tones: RefCell<Vec<CommittedTone>>,
    lateness: RefCell<Option<LatenessFn>>,
}

impl OfflineDevice {
    /// Running device with both clocks at zero
    pub fn new() -> Self {
        Self::with_state(DeviceState::Running)
    }

    /// Device that has to be resumed before its clock moves
    pub fn suspended() -> Self {
        Self::with_state(DeviceState::Suspended)
    }

    fn with_state(state: DeviceState) -> Self {
        Self {
            audio_time: Cell::new(0.0),
            wall_ms: Cell::new(0.0),
            state: Cell::new(state),
            resume_fails: Cell::new(false),
            tones: RefCell::new(Vec::new()),
            lateness: RefCell::new(None),
        }
    }

    /// Shared handle plus a context using it as both clocks
    pub fn into_context(self) -> (Rc<OfflineDevice>, PlaybackContext) {
        let device = Rc::new(self);
        let context = PlaybackContext::new(device.clone(), device.clone());
        (device, context)
    }

    /// Move time forward. The audio clock only moves while running.
    pub fn advance(&self, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        self.wall_ms.set(self.wall_ms.get() + seconds * 1000.0);
        if self.state.get() == DeviceState::Running {
            self.audio_time.set(self.audio_time.get() + seconds);
        }
    }

    /// Delay every timer wake-up by the returned number of milliseconds
    pub fn set_lateness(&self, lateness: impl FnMut() -> f64 + 'static) {
        *self.lateness.borrow_mut() = Some(Box::new(lateness));
    }

    /// Make subsequent `resume` calls fail
    pub fn fail_resume(&self, fail: bool) {
        self.resume_fails.set(fail);
    }

    pub fn suspend(&self) {
        if self.state.get() == DeviceState::Running {
            self.state.set(DeviceState::Suspended);
        }
    }

    pub fn close(&self) {
        self.state.set(DeviceState::Closed);
    }

    /// Every tone committed so far, in commit order
    pub fn tones(&self) -> Vec<CommittedTone> {
        self.tones.borrow().clone()
    }

    /// Drain the committed tones
    pub fn take_tones(&self) -> Vec<CommittedTone> {
        std::mem::take(&mut *self.tones.borrow_mut())
    }
}

impl Default for OfflineDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for OfflineDevice {
    fn now(&self) -> f64 {
        self.audio_time.get()
    }

    fn state(&self) -> DeviceState {
        self.state.get()
    }

    fn resume(&self) -> Result<(), DeviceError> {
        match self.state.get() {
            DeviceState::Running => Ok(()),
            DeviceState::Closed => Err(DeviceError::ResumeFailed("device is closed".to_string())),
            DeviceState::Suspended if self.resume_fails.get() => Err(DeviceError::ResumeFailed(
                "resume refused by host".to_string(),
            )),
            DeviceState::Suspended => {
                self.state.set(DeviceState::Running);
                Ok(())
            }
        }
    }

    fn schedule_tone(&self, tone: Tone) -> Result<(), DeviceError> {
        self.tones.borrow_mut().push(CommittedTone {
            tone,
            committed_at: self.audio_time.get(),
        });
        Ok(())
    }
}

impl WallClock for OfflineDevice {
    fn now_ms(&self) -> f64 {
        self.wall_ms.get()
    }

    fn sleep_until_ms(&self, deadline_ms: f64) {
        let late = match self.lateness.borrow_mut().as_mut() {
            Some(lateness) => lateness().max(0.0),
            None => 0.0,
        };
        let target = deadline_ms + late;
        let now = self.wall_ms.get();
        if target > now {
            self.advance((target - now) / 1000.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clocks_advance_together_while_running() {
        let device = OfflineDevice::new();
        device.advance(0.5);
        assert_eq!(device.now(), 0.5);
        assert_eq!(device.now_ms(), 500.0);
    }

    #[test]
    fn test_suspended_audio_clock_is_frozen() {
        let device = OfflineDevice::suspended();
        device.advance(1.0);
        assert_eq!(device.now(), 0.0);
        assert_eq!(device.now_ms(), 1000.0);

        device.resume().unwrap();
        device.advance(1.0);
        assert_eq!(device.now(), 1.0);
    }

    #[test]
    fn test_resume_failure() {
        let device = OfflineDevice::suspended();
        device.fail_resume(true);
        assert!(device.resume().is_err());
        assert_eq!(device.state(), DeviceState::Suspended);

        device.close();
        device.fail_resume(false);
        assert!(device.resume().is_err());
    }

    #[test]
    fn test_sleep_adds_lateness() {
        let device = OfflineDevice::new();
        device.set_lateness(|| 7.0);
        device.sleep_until_ms(50.0);
        assert_eq!(device.now_ms(), 57.0);
    }

    #[test]
    fn test_records_commits() {
        let device = OfflineDevice::new();
        device.advance(0.25);
        device
            .schedule_tone(Tone::new(300.0, 1.0, 0.3, 0.04))
            .unwrap();

        let tones = device.take_tones();
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].committed_at, 0.25);
        assert!(device.tones().is_empty());
    }
}
