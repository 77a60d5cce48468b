// Poll timer and cooperative event loop
//
// Components never block. Each one owns a PollTimer with at most one pending
// poll and exposes its next deadline through `Tick`; the host loop sleeps on
// the wall clock until the earliest deadline and ticks whoever is due.

use crate::audio::clock::WallClock;
use std::rc::Rc;

/// Identity of one armed poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Single-slot repeating timer
///
/// Arming always replaces the outstanding handle, so a component can never
/// have two polls in flight.
#[derive(Debug, Default)]
pub struct PollTimer {
    next_id: u64,
    pending: Option<(TimerHandle, f64)>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the next poll `delay_ms` after `now_ms`, cancelling any stale one
    pub fn arm(&mut self, now_ms: f64, delay_ms: f64) -> TimerHandle {
        self.cancel();
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.pending = Some((handle, now_ms + delay_ms.max(0.0)));
        handle
    }

    /// Drop the pending poll, returns the cancelled handle if there was one
    pub fn cancel(&mut self) -> Option<TimerHandle> {
        self.pending.take().map(|(handle, _)| handle)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn handle(&self) -> Option<TimerHandle> {
        self.pending.map(|(handle, _)| handle)
    }

    pub fn deadline_ms(&self) -> Option<f64> {
        self.pending.map(|(_, deadline)| deadline)
    }

    /// Consume the pending poll if its deadline has passed
    pub fn take_due(&mut self, now_ms: f64) -> Option<TimerHandle> {
        match self.pending {
            Some((handle, deadline)) if deadline <= now_ms => {
                self.pending = None;
                Some(handle)
            }
            _ => None,
        }
    }
}

/// A component driven by the event loop
pub trait Tick {
    /// Wall time (ms) of the next wanted poll, `None` when idle
    fn next_deadline_ms(&self) -> Option<f64>;

    /// Run the poll if it is due
    fn tick(&mut self);
}

/// Single-threaded host loop
pub struct EventLoop {
    wall: Rc<dyn WallClock>,
}

impl EventLoop {
    pub fn new(wall: Rc<dyn WallClock>) -> Self {
        Self { wall }
    }

    /// Earliest deadline over all tasks
    fn earliest(tasks: &[&mut dyn Tick]) -> Option<f64> {
        tasks
            .iter()
            .filter_map(|task| task.next_deadline_ms())
            .min_by(f64::total_cmp)
    }

    /// Tick every task whose deadline has passed, returns how many ran
    fn tick_due(&self, tasks: &mut [&mut dyn Tick]) -> usize {
        let now = self.wall.now_ms();
        let mut ticked = 0;
        for task in tasks.iter_mut() {
            if task.next_deadline_ms().is_some_and(|deadline| deadline <= now) {
                task.tick();
                ticked += 1;
            }
        }
        ticked
    }

    /// Run until no task has a pending poll
    ///
    /// Never returns while an unbounded metronome is running.
    pub fn run_until_idle(&self, tasks: &mut [&mut dyn Tick]) -> usize {
        let mut ticks = 0;
        while let Some(deadline) = Self::earliest(tasks) {
            self.wall.sleep_until_ms(deadline);
            ticks += self.tick_due(tasks);
        }
        ticks
    }

    /// Run for `duration_ms` of wall time, or less if every task goes idle
    pub fn run_for(&self, duration_ms: f64, tasks: &mut [&mut dyn Tick]) -> usize {
        let end = self.wall.now_ms() + duration_ms;
        let mut ticks = 0;
        loop {
            match Self::earliest(tasks) {
                Some(deadline) if deadline <= end => {
                    self.wall.sleep_until_ms(deadline);
                    ticks += self.tick_due(tasks);
                }
                Some(_) => {
                    self.wall.sleep_until_ms(end);
                    return ticks;
                }
                None => return ticks,
            }
        }
    }
}
