// Sequence Player - plays a recorded note sequence through the lookahead scheduler
//
// Supports a [start_at, end_at) trim window, speed scaling, pause/resume and
// looping. Positions reported to observers are in song time (seconds of the
// original recording), whatever the playback speed.

use crate::audio::clock::{PlaybackContext, Tone};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::sequencer::lookahead::{Commit, EventSource, LookaheadScheduler};
use crate::sequencer::note::{Note, midi_to_frequency, note_name, song_duration};
use crate::sequencer::timeline::{NoteEvent, NoteTimeline, TimelineCursor};
use crate::sequencer::timer::{PollTimer, Tick};
use crate::sequencer::transport::TransportState;

/// Arguments of one `play` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// Song time (seconds) where playback starts
    pub start_at: f64,
    /// Song time where playback ends (exclusive), `None` for the whole song
    pub end_at: Option<f64>,
    /// Relative speed, 0.5 plays at half speed
    pub speed: f64,
    /// Restart from `start_at` when the end is reached
    pub looping: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            start_at: 0.0,
            end_at: None,
            speed: 1.0,
            looping: false,
        }
    }
}

impl PlayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_at(mut self, start_at: f64) -> Self {
        self.start_at = start_at;
        self
    }

    /// A negative value (conventionally -1) means unbounded
    pub fn with_end_at(mut self, end_at: f64) -> Self {
        self.end_at = (end_at >= 0.0).then_some(end_at);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Check the trim window and speed before a session is created
    pub fn validate(&self) -> SchedulerResult<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SchedulerError::invalid("speed", self.speed));
        }
        if !self.start_at.is_finite() || self.start_at < 0.0 {
            return Err(SchedulerError::invalid("start time", self.start_at));
        }
        match self.end_at {
            Some(end_at) if !end_at.is_finite() || end_at <= self.start_at => {
                Err(SchedulerError::invalid("end time", end_at))
            }
            _ => Ok(()),
        }
    }
}

struct PlayerSession {
    /// Untrimmed, unscaled input, kept for resume and loop restarts
    notes: Vec<Note>,
    options: PlayOptions,
    /// Where a loop restarts; stays put across pause/resume
    loop_start: f64,
    start_time: f64,
    song_duration: f64,
    cursor: TimelineCursor<NoteEvent>,
}

impl PlayerSession {
    fn play_time(&self, now: f64) -> f64 {
        (now - self.start_time) * self.options.speed + self.options.start_at
    }

    /// With an end bound, the bound alone ends the session. Otherwise the
    /// session ends once every note is committed and the unscaled elapsed
    /// time, counted from `start_at`, covers the speed-scaled song.
    fn reached_end(&self, now: f64) -> bool {
        match self.options.end_at {
            Some(end) => self.play_time(now) >= end,
            None => {
                let elapsed = now - self.start_time;
                self.cursor.is_exhausted()
                    && elapsed + self.options.start_at >= self.song_duration / self.options.speed
            }
        }
    }
}

type TimeObserver = Box<dyn FnMut(Option<f64>)>;
type StopObserver = Box<dyn FnMut()>;

/// Player for finite note sequences
///
/// `Stopped -> Playing <-> Paused -> Stopped`, with loop completion restarting
/// the session in place.
pub struct SequencePlayer {
    context: PlaybackContext,
    scheduler: LookaheadScheduler,
    timer: PollTimer,

    volume: f32,
    logging: bool,

    state: TransportState,
    session: Option<PlayerSession>,
    current_play_time: Option<f64>,

    on_time_change: Option<TimeObserver>,
    on_stop: Option<StopObserver>,
}

impl SequencePlayer {
    pub fn new(context: PlaybackContext, config: &SchedulerConfig) -> SchedulerResult<Self> {
        Ok(Self {
            context,
            scheduler: LookaheadScheduler::for_player(config)?,
            timer: PollTimer::new(),
            volume: 1.0,
            logging: false,
            state: TransportState::Stopped,
            session: None,
            current_play_time: None,
            on_time_change: None,
            on_stop: None,
        })
    }

    /// Called on every poll with the song position, and with `None` on stop
    pub fn on_time_change(&mut self, observer: impl FnMut(Option<f64>) + 'static) {
        self.on_time_change = Some(Box::new(observer));
    }

    /// Called when playback stops, unless stopped with `notify = false`
    pub fn on_stop(&mut self, observer: impl FnMut() + 'static) {
        self.on_stop = Some(Box::new(observer));
    }

    /// Linear gain in [0, 1] applied to notes committed from now on
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Log every committed note
    pub fn set_logging(&mut self, logging: bool) {
        self.logging = logging;
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// True while a session exists, paused or not
    pub fn is_playing(&self) -> bool {
        self.state.has_session()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Song position of the last poll, `None` when stopped
    pub fn current_play_time(&self) -> Option<f64> {
        self.current_play_time
    }

    /// Options of the current session
    pub fn options(&self) -> Option<PlayOptions> {
        self.session.as_ref().map(|s| s.options)
    }

    /// Play `notes` in their onset order
    ///
    /// Replaces an active session without notifying the stop observer.
    pub fn play(&mut self, notes: &[Note], options: PlayOptions) -> SchedulerResult<()> {
        if !notes.iter().any(Note::is_playable) {
            log::warn!(target: "Player", "Was called with no data");
            return Err(SchedulerError::EmptyInput);
        }
        if let Err(e) = options.validate() {
            log::error!(target: "Player", "{}", e);
            return Err(e);
        }
        let duration = song_duration(notes);
        if options.start_at > 0.0 && options.start_at >= duration {
            let err = SchedulerError::invalid("start time", options.start_at);
            log::error!(target: "Player", "{} (song lasts {:.2}s)", err, duration);
            return Err(err);
        }
        if let Err(e) = self.context.ensure_running() {
            log::error!(target: "Player", "Cannot play: {}", e);
            return Err(e.into());
        }

        if self.state.has_session() {
            log::info!(target: "Player", "Replacing current session");
        }
        self.begin(notes.to_vec(), options, options.start_at);
        Ok(())
    }

    /// Stop if a session exists, otherwise play
    pub fn toggle(&mut self, notes: &[Note], options: PlayOptions) -> SchedulerResult<()> {
        if self.state.has_session() {
            self.stop(true);
            Ok(())
        } else {
            self.play(notes, options)
        }
    }

    /// Suspend polling, keeping the session and its position
    ///
    /// Notes already committed to the audio clock still sound.
    pub fn pause(&mut self) -> SchedulerResult<()> {
        match self.state {
            TransportState::Paused => Ok(()),
            TransportState::Stopped => {
                log::warn!(target: "Player", "Cannot pause when not playing");
                Err(SchedulerError::InvalidOperation("pause without an active session"))
            }
            TransportState::Playing => {
                self.timer.cancel();
                self.state = TransportState::Paused;
                log::info!(
                    target: "Player",
                    "Paused at {:.2}s",
                    self.current_play_time.unwrap_or_default()
                );
                Ok(())
            }
        }
    }

    /// Continue a paused session from its last reported position
    pub fn resume(&mut self) -> SchedulerResult<()> {
        if !self.state.is_paused() {
            log::warn!(target: "Player", "Cannot resume player since it has not been paused");
            return Err(SchedulerError::InvalidOperation("resume without a paused session"));
        }
        if let Err(e) = self.context.ensure_running() {
            log::error!(target: "Player", "Cannot resume: {}", e);
            return Err(e.into());
        }
        let Some(session) = self.session.take() else {
            self.state = TransportState::Stopped;
            return Err(SchedulerError::InvalidOperation("resume without a paused session"));
        };

        let position = self.current_play_time.unwrap_or(session.options.start_at);
        log::info!(target: "Player", "Resuming at {:.2}s", position);
        let options = session.options.with_start_at(position);
        self.begin(session.notes, options, session.loop_start);
        Ok(())
    }

    /// Pause when playing, resume when paused
    pub fn pause_or_resume(&mut self) -> SchedulerResult<()> {
        match self.state {
            TransportState::Stopped => {
                log::warn!(target: "Player", "Cannot pause / resume when player is not playing");
                Err(SchedulerError::InvalidOperation("pause/resume without an active session"))
            }
            TransportState::Paused => self.resume(),
            TransportState::Playing => self.pause(),
        }
    }

    /// End the session. No-op when stopped.
    ///
    /// Observers see `on_time_change(None)`, then `on_stop()` if `notify` is set.
    pub fn stop(&mut self, notify: bool) {
        if !self.state.has_session() {
            return;
        }
        self.timer.cancel();
        self.state = TransportState::Stopped;
        self.session = None;
        self.current_play_time = None;
        log::info!(target: "Player", "Stopping player");

        if let Some(on_time_change) = self.on_time_change.as_mut() {
            on_time_change(None);
        }
        if notify {
            if let Some(on_stop) = self.on_stop.as_mut() {
                on_stop();
            }
        }
    }

    fn begin(&mut self, notes: Vec<Note>, options: PlayOptions, loop_start: f64) {
        self.timer.cancel();

        let built = NoteTimeline::build(&notes, options.start_at, options.speed);
        if built.skipped > 0 {
            log::warn!(target: "Player", "Skipping {} notes with invalid timing", built.skipped);
        }
        let end_offset = options
            .end_at
            .map(|end| (end - options.start_at) / options.speed);

        log::info!(
            target: "Player",
            "Playing {} notes from {:.2}s, speed {}, volume {}",
            built.timeline.len(),
            options.start_at,
            options.speed,
            self.volume
        );

        self.session = Some(PlayerSession {
            notes,
            options,
            loop_start,
            start_time: self.context.device.now(),
            song_duration: built.song_duration,
            cursor: built.timeline.into_cursor(end_offset),
        });
        self.state = TransportState::Playing;
        // A fresh session always runs until its first timer poll, so a loop
        // over an empty or zero-length range restarts once per poll interval
        self.poll(false);
    }

    fn poll(&mut self, check_end: bool) {
        let now = self.context.device.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let play_time = session.play_time(now);
        let mut commits = Vec::new();
        self.scheduler
            .poll(session.start_time, now, &mut session.cursor, |commit| commits.push(commit));
        let reached_end = check_end && session.reached_end(now);

        self.current_play_time = Some(play_time);
        if let Some(on_time_change) = self.on_time_change.as_mut() {
            on_time_change(Some(play_time));
        }

        for commit in commits {
            self.emit(commit);
        }

        if reached_end {
            self.stop_or_loop();
        } else {
            self.timer
                .arm(self.context.wall.now_ms(), self.scheduler.poll_interval_ms());
        }
    }

    fn stop_or_loop(&mut self) {
        let looping = self.session.as_ref().is_some_and(|s| s.options.looping);
        if !looping {
            self.stop(true);
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };
        log::info!(target: "Player", "Looping back to {:.2}s", session.loop_start);
        let options = session.options.with_start_at(session.loop_start);
        self.begin(session.notes, options, session.loop_start);
    }

    fn emit(&mut self, commit: Commit<NoteEvent>) {
        let event = commit.event.payload;
        if self.logging {
            log::info!(
                target: "Player",
                "Playing {} for {:.3}s",
                note_name(event.pitch),
                event.duration
            );
        }

        let tone = Tone::new(
            midi_to_frequency(event.pitch),
            self.volume,
            commit.target_time,
            event.duration,
        );
        if let Err(e) = self.context.device.schedule_tone(tone) {
            log::warn!(target: "Player", "Note {} not scheduled: {}", event.note_id, e);
        }
    }
}

impl Tick for SequencePlayer {
    fn next_deadline_ms(&self) -> Option<f64> {
        self.timer.deadline_ms()
    }

    fn tick(&mut self) {
        if self.timer.take_due(self.context.wall.now_ms()).is_some() {
            self.poll(true);
        }
    }
}
