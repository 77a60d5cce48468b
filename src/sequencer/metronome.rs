// Metronome - evenly spaced, accented clicks committed ahead of the audio clock
//
// The pulse scheduler generates a (possibly unbounded) beat grid and feeds it
// to the lookahead scheduler. Bounded runs stop themselves, which is how
// count-ins are played.

use crate::audio::clock::{PlaybackContext, Tone};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::sequencer::lookahead::{Commit, EventSource, LookaheadScheduler};
use crate::sequencer::timeline::{Tempo, TimedEvent};
use crate::sequencer::timer::{PollTimer, Tick};
use crate::sequencer::transport::TransportState;

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// Accented click (higher pitch)
    Accent,
    /// Click on other beats
    Regular,
}

impl ClickType {
    pub fn is_accent(self) -> bool {
        matches!(self, ClickType::Accent)
    }
}

/// Click type of beat `index` when accenting every `accent_every` beats
///
/// The first beat is always accented; afterwards beat `i` is accented when
/// `i % accent_every == accent_every - 1`.
pub fn click_type(index: u64, accent_every: u32) -> ClickType {
    let every = u64::from(accent_every.max(1));
    if index == 0 || index % every == every - 1 {
        ClickType::Accent
    } else {
        ClickType::Regular
    }
}

/// One beat of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    pub index: u64,
    pub click: ClickType,
}

/// Endless (or bounded) grid of beats
///
/// Offsets are computed from the beat index rather than accumulated, so the
/// grid does not drift over long sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatGrid {
    seconds_per_beat: f64,
    accent_every: u32,
    max_beats: Option<u64>,
    next_index: u64,
}

impl BeatGrid {
    pub fn new(tempo: Tempo, accent_every: u32, max_beats: Option<u64>) -> Self {
        Self {
            seconds_per_beat: tempo.beat_duration_seconds(),
            accent_every,
            max_beats,
            next_index: 0,
        }
    }

    /// Beats handed out so far
    pub fn emitted(&self) -> u64 {
        self.next_index
    }
}

impl EventSource for BeatGrid {
    type Payload = Beat;

    fn peek_offset(&self) -> Option<f64> {
        match self.max_beats {
            Some(max) if self.next_index >= max => None,
            _ => Some(self.next_index as f64 * self.seconds_per_beat),
        }
    }

    fn next_event(&mut self) -> Option<TimedEvent<Beat>> {
        let offset = self.peek_offset()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(TimedEvent::new(
            offset,
            Beat {
                index,
                click: click_type(index, self.accent_every),
            },
        ))
    }
}

/// Notification sent for every committed beat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Click {
    pub index: u64,
    /// Audio clock time at which the click sounds
    pub time: f64,
    /// Approximate wall clock time (ms) of the click, for UI synchronisation
    pub wall_time_ms: f64,
    pub accent: bool,
}

struct MetronomeSession {
    start_time: f64,
    grid: BeatGrid,
}

type ClickObserver = Box<dyn FnMut(Click)>;
type StopObserver = Box<dyn FnMut()>;

/// Metronome driven by the lookahead scheduler
///
/// `Stopped -> Playing -> Stopped`. Observers are called synchronously from
/// the poll and must not block.
pub struct PulseScheduler {
    context: PlaybackContext,
    scheduler: LookaheadScheduler,
    timer: PollTimer,

    beep_duration: f64,
    accent_frequency: f32,
    regular_frequency: f32,
    volume: f32,

    state: TransportState,
    tempo: Option<Tempo>,
    accent_every: u32,
    max_beats: Option<u64>,
    beat_count: u64,
    session: Option<MetronomeSession>,

    on_click: Option<ClickObserver>,
    on_stop: Option<StopObserver>,
}

impl PulseScheduler {
    pub fn new(context: PlaybackContext, config: &SchedulerConfig) -> SchedulerResult<Self> {
        Ok(Self {
            context,
            scheduler: LookaheadScheduler::for_metronome(config)?,
            timer: PollTimer::new(),
            beep_duration: config.beep_duration_secs,
            accent_frequency: config.accent_frequency_hz,
            regular_frequency: config.regular_frequency_hz,
            volume: 1.0,
            state: TransportState::Stopped,
            tempo: None,
            accent_every: 4,
            max_beats: None,
            beat_count: 0,
            session: None,
            on_click: None,
            on_stop: None,
        })
    }

    /// Called for every committed beat
    pub fn on_click(&mut self, observer: impl FnMut(Click) + 'static) {
        self.on_click = Some(Box::new(observer));
    }

    /// Called whenever a running metronome stops, explicitly or on its own
    pub fn on_stop(&mut self, observer: impl FnMut() + 'static) {
        self.on_stop = Some(Box::new(observer));
    }

    /// Start clicking at `bpm`, accenting every `accent_every` beats
    ///
    /// With `max_beats` set, the metronome stops itself after that many beats.
    /// Starting while running restarts the beat grid.
    pub fn start(&mut self, bpm: f64, accent_every: u32, max_beats: Option<u64>) -> SchedulerResult<()> {
        let tempo = Tempo::new(bpm).inspect_err(|e| log::error!(target: "Metronome", "{}", e))?;
        if accent_every == 0 {
            let err = SchedulerError::invalid("accent", 0.0);
            log::error!(target: "Metronome", "{}", err);
            return Err(err);
        }
        if max_beats == Some(0) {
            let err = SchedulerError::invalid("max beats", 0.0);
            log::error!(target: "Metronome", "{}", err);
            return Err(err);
        }

        if let Err(e) = self.context.ensure_running() {
            log::error!(target: "Metronome", "Cannot start: {}", e);
            return Err(e.into());
        }

        self.timer.cancel();
        self.tempo = Some(tempo);
        self.accent_every = accent_every;
        self.max_beats = max_beats;
        self.beat_count = 0;
        self.state = TransportState::Playing;
        self.session = Some(MetronomeSession {
            start_time: self.context.device.now(),
            grid: BeatGrid::new(tempo, accent_every, max_beats),
        });

        match max_beats {
            Some(max) => log::info!(
                target: "Metronome",
                "Started @ {}, accent every {}. beat, limited to {} beats",
                tempo, accent_every, max
            ),
            None => log::info!(
                target: "Metronome",
                "Started @ {}, accent every {}. beat",
                tempo, accent_every
            ),
        }

        self.poll();
        Ok(())
    }

    /// Stop clicking. No-op when already stopped.
    ///
    /// Clicks already committed to the audio clock still sound.
    pub fn stop(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.timer.cancel();
        self.state = TransportState::Stopped;
        self.session = None;
        log::info!(target: "Metronome", "Stopped");

        if let Some(on_stop) = self.on_stop.as_mut() {
            on_stop();
        }
    }

    /// Stop when running, otherwise start (falling back to the last tempo)
    pub fn toggle(&mut self, bpm: Option<f64>, accent_every: u32, max_beats: Option<u64>) -> SchedulerResult<()> {
        if self.state.is_playing() {
            self.stop();
            return Ok(());
        }
        let bpm = match bpm.or(self.tempo.map(|t| t.bpm())) {
            Some(bpm) => bpm,
            None => {
                let err = SchedulerError::InvalidOperation("no tempo to start the metronome with");
                log::error!(target: "Metronome", "{}", err);
                return Err(err);
            }
        };
        self.start(bpm, accent_every, max_beats)
    }

    /// Linear gain in [0, 1] applied to clicks committed from now on
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Tempo of the last started session
    pub fn bpm(&self) -> Option<f64> {
        self.tempo.map(|t| t.bpm())
    }

    pub fn accent_every(&self) -> u32 {
        self.accent_every
    }

    pub fn max_beats(&self) -> Option<u64> {
        self.max_beats
    }

    /// Beats committed since the last start, kept after stopping
    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_playing()
    }

    fn poll(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let now = self.context.device.now();
        let mut commits = Vec::new();
        let outcome = self
            .scheduler
            .poll(session.start_time, now, &mut session.grid, |commit| commits.push(commit));

        for commit in commits {
            self.emit(commit);
        }

        if outcome.exhausted {
            log::info!(target: "Metronome", "All {} beats scheduled", self.beat_count());
            self.stop();
        } else {
            self.timer
                .arm(self.context.wall.now_ms(), self.scheduler.poll_interval_ms());
        }
    }

    fn emit(&mut self, commit: Commit<Beat>) {
        let beat = commit.event.payload;
        self.beat_count += 1;
        let frequency = match beat.click {
            ClickType::Accent => self.accent_frequency,
            ClickType::Regular => self.regular_frequency,
        };

        let tone = Tone::new(frequency, self.volume, commit.target_time, self.beep_duration);
        if let Err(e) = self.context.device.schedule_tone(tone) {
            log::warn!(target: "Metronome", "Beat {} not scheduled: {}", beat.index, e);
        }

        log::debug!(
            target: "Metronome",
            "Beat {} at {:.4}s ({:?})",
            beat.index, commit.target_time, beat.click
        );

        let click = Click {
            index: beat.index,
            time: commit.target_time,
            wall_time_ms: self.context.wall_time_for(commit.target_time),
            accent: beat.click.is_accent(),
        };
        if let Some(on_click) = self.on_click.as_mut() {
            on_click(click);
        }
    }
}

impl Tick for PulseScheduler {
    fn next_deadline_ms(&self) -> Option<f64> {
        self.timer.deadline_ms()
    }

    fn tick(&mut self) {
        if self.timer.take_due(self.context.wall.now_ms()).is_some() {
            self.poll();
        }
    }
}
