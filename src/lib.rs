// Practice Audio - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod error;
pub mod messaging;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::clock::{AudioDevice, DeviceState, PlaybackContext, SystemWallClock, Tone, WallClock};
pub use audio::device::CpalDevice;
pub use audio::offline::OfflineDevice;
pub use audio::timing::AudioTiming;
pub use config::SchedulerConfig;
pub use error::{ConfigError, DeviceError, SchedulerError, SchedulerResult};
pub use messaging::channels::create_command_channel;
pub use sequencer::{
    Click, ClickType, EventLoop, LookaheadScheduler, Note, NoteValue, PlayOptions, PulseScheduler,
    SequencePlayer, Tempo, Tick, TransportState,
};
