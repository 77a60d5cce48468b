// Lookahead scheduler - commits due events to the audio clock ahead of time
//
// The polling timer is coarse and jittery, the audio clock is precise. On
// every poll, each pending event whose target time falls inside
// [now, now + lookahead) is committed with its exact start time, so poll
// jitter never reaches the ear as long as the poll interval (plus jitter)
// stays below the lookahead window.

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::sequencer::timeline::TimedEvent;

/// Ordered supply of pending events
pub trait EventSource {
    type Payload;

    /// Offset of the next event, `None` once nothing more will be yielded
    fn peek_offset(&self) -> Option<f64>;

    /// Take the next event
    fn next_event(&mut self) -> Option<TimedEvent<Self::Payload>>;

    fn is_exhausted(&self) -> bool {
        self.peek_offset().is_none()
    }
}

/// An event handed to the audio clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commit<P> {
    /// Absolute audio clock time at which the event must sound
    pub target_time: f64,
    /// Audio clock time of the poll that committed it
    pub committed_at: f64,
    pub event: TimedEvent<P>,
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub committed: usize,
    /// The source has nothing left to yield
    pub exhausted: bool,
}

/// Decouples the decision cadence (poll interval) from timing precision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookaheadScheduler {
    lookahead: f64,
    poll_interval_ms: f64,
}

impl LookaheadScheduler {
    /// `lookahead` in seconds, `poll_interval_ms` in milliseconds
    ///
    /// The poll interval must be strictly shorter than the lookahead window,
    /// otherwise an event can become due between two polls.
    pub fn new(lookahead: f64, poll_interval_ms: f64) -> SchedulerResult<Self> {
        if !lookahead.is_finite() || lookahead <= 0.0 {
            return Err(SchedulerError::invalid("lookahead", lookahead));
        }
        if !poll_interval_ms.is_finite()
            || poll_interval_ms <= 0.0
            || poll_interval_ms >= lookahead * 1000.0
        {
            return Err(SchedulerError::invalid("poll interval", poll_interval_ms));
        }
        Ok(Self {
            lookahead,
            poll_interval_ms,
        })
    }

    pub fn for_metronome(config: &SchedulerConfig) -> SchedulerResult<Self> {
        Self::new(config.lookahead_secs, config.metronome_poll_ms)
    }

    pub fn for_player(config: &SchedulerConfig) -> SchedulerResult<Self> {
        Self::new(config.lookahead_secs, config.player_poll_ms)
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn poll_interval_ms(&self) -> f64 {
        self.poll_interval_ms
    }

    /// Commit every event due before `now + lookahead`, in order
    ///
    /// `session_start` is the audio clock time that offset 0 maps to.
    pub fn poll<S, F>(&self, session_start: f64, now: f64, source: &mut S, mut commit: F) -> PollOutcome
    where
        S: EventSource,
        F: FnMut(Commit<S::Payload>),
    {
        let horizon = now + self.lookahead;
        let mut committed = 0;

        while let Some(offset) = source.peek_offset() {
            let target_time = session_start + offset;
            if target_time >= horizon {
                break;
            }
            let Some(event) = source.next_event() else {
                break;
            };
            commit(Commit {
                target_time,
                committed_at: now,
                event,
            });
            committed += 1;
        }

        PollOutcome {
            committed,
            exhausted: source.is_exhausted(),
        }
    }
}
