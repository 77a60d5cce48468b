// Error types for the scheduling components and the audio device

use thiserror::Error;

/// Errors raised by the audio output device
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("Device configuration error: {0}")]
    Config(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to resume audio device: {0}")]
    ResumeFailed(String),

    #[error("Tone queue is full")]
    QueueFull,
}

/// Errors raised when a scheduler refuses a requested transition
///
/// None of these are fatal: the component keeps its previous state and the
/// caller may reissue the call with corrected arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Cannot play an empty note sequence")]
    EmptyInput,

    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),
}

impl SchedulerError {
    pub(crate) fn invalid(name: &'static str, value: f64) -> Self {
        SchedulerError::InvalidParameter { name, value }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised while loading a scheduler configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
