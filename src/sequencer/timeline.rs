// Timeline - ordered, time-offset events for one playback session
// Handles sorting, trimming to a start time and scaling by playback speed

use crate::error::{SchedulerError, SchedulerResult};
use crate::sequencer::lookahead::EventSource;
use crate::sequencer::note::{Note, NoteId, song_duration};
use std::collections::VecDeque;
use std::fmt;

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo, BPM must be a positive finite number
    pub fn new(bpm: f64) -> SchedulerResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(SchedulerError::invalid("bpm", bpm));
        }
        Ok(Self { bpm })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// One scheduled occurrence, `offset` seconds after the session origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent<P> {
    pub offset: f64,
    pub payload: P,
}

impl<P> TimedEvent<P> {
    pub fn new(offset: f64, payload: P) -> Self {
        Self { offset, payload }
    }
}

/// Payload of a note event, duration already scaled by playback speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub note_id: NoteId,
    pub pitch: u8,
    /// Sounding length on the audio clock (seconds)
    pub duration: f64,
    /// Onset in song time, before trimming and scaling
    pub song_onset: f64,
}

/// Ordered sequence of timed events, non-decreasing by offset
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline<P> {
    events: Vec<TimedEvent<P>>,
    duration: f64,
}

impl<P> Timeline<P> {
    /// Build from events in any order
    pub fn new(mut events: Vec<TimedEvent<P>>, duration: f64) -> Self {
        // Stable sort keeps simultaneous events in input order
        events.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self { events, duration }
    }

    pub fn events(&self) -> &[TimedEvent<P>] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Playback length on the audio clock
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Cursor over the events; offsets at or past `end_offset` are never yielded
    pub fn into_cursor(self, end_offset: Option<f64>) -> TimelineCursor<P> {
        TimelineCursor {
            events: self.events.into(),
            end_offset,
        }
    }
}

/// Timeline of a note recording prepared for one session
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTimeline {
    pub timeline: Timeline<NoteEvent>,
    /// Length of the whole recording in song time (untrimmed, unscaled)
    pub song_duration: f64,
    /// Notes dropped because of a broken onset or duration
    pub skipped: usize,
}

impl NoteTimeline {
    /// Sort notes by onset, keep those at or after `start_at`, shift the
    /// window start to offset 0 and scale offsets and durations by `1 / speed`
    ///
    /// `speed` must be positive, callers validate it first.
    pub fn build(notes: &[Note], start_at: f64, speed: f64) -> Self {
        let playable: Vec<Note> = notes.iter().copied().filter(Note::is_playable).collect();
        let skipped = notes.len() - playable.len();
        let song_duration = song_duration(&playable);

        let events = playable
            .iter()
            .filter(|note| note.onset >= start_at)
            .map(|note| {
                TimedEvent::new(
                    (note.onset - start_at) / speed,
                    NoteEvent {
                        note_id: note.id,
                        pitch: note.pitch,
                        duration: note.duration / speed,
                        song_onset: note.onset,
                    },
                )
            })
            .collect();

        let duration = (song_duration - start_at).max(0.0) / speed;

        Self {
            timeline: Timeline::new(events, duration),
            song_duration,
            skipped,
        }
    }
}

/// Remaining events of a running session
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineCursor<P> {
    events: VecDeque<TimedEvent<P>>,
    end_offset: Option<f64>,
}

impl<P> TimelineCursor<P> {
    /// Events not yet handed out, including those past the end bound
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl<P> EventSource for TimelineCursor<P> {
    type Payload = P;

    fn peek_offset(&self) -> Option<f64> {
        let offset = self.events.front()?.offset;
        match self.end_offset {
            Some(end) if offset >= end => None,
            _ => Some(offset),
        }
    }

    fn next_event(&mut self) -> Option<TimedEvent<P>> {
        self.peek_offset()?;
        self.events.pop_front()
    }
}
