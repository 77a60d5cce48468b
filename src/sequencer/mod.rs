// Sequencer module
// Lookahead scheduling, the metronome and the note sequence player

pub mod lookahead;
pub mod metronome;
pub mod note;
pub mod player;
pub mod rhythm;
pub mod timeline;
pub mod timer;
pub mod transport;

pub use lookahead::{Commit, EventSource, LookaheadScheduler, PollOutcome};
pub use metronome::{Beat, BeatGrid, Click, ClickType, PulseScheduler};
pub use note::{Note, NoteId};
pub use player::{PlayOptions, SequencePlayer};
pub use rhythm::{NoteValue, RhythmStep, rhythm_to_notes};
pub use timeline::{NoteEvent, NoteTimeline, Tempo, TimedEvent, Timeline, TimelineCursor};
pub use timer::{EventLoop, PollTimer, Tick, TimerHandle};
pub use transport::TransportState;
