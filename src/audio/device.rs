// cpal output device - the real audio clock and tone output
//
// The clock is the number of frames the output callback has rendered, so it
// only advances while the stream plays. Tones travel to the callback through
// a lock-free ringbuffer and are rendered at their exact start frame.
//
// Note: on macOS (CoreAudio) `Stream` is not Send, so the device lives on the
// thread that runs the scheduling loop (see `CpalDevice::shared`).

use crate::audio::clock::{AudioDevice, DeviceState, Tone};
use crate::audio::format_conversion::{write_mono_to_interleaved_frame, write_silence};
use crate::audio::timing::AudioTiming;
use crate::audio::tone::ToneMixer;
use crate::config::SchedulerConfig;
use crate::error::DeviceError;
use crate::messaging::channels::{CommandConsumer, CommandProducer, create_command_channel};
use crate::messaging::command::Command;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::cell::{Cell, OnceCell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Maximum number of simultaneously sounding tones
const MAX_VOICES: usize = 64;

thread_local! {
    static SHARED_DEVICE: OnceCell<Rc<CpalDevice>> = const { OnceCell::new() };
}

pub struct CpalDevice {
    _device: Device,
    stream: Stream,
    timing: AudioTiming,
    state: Cell<DeviceState>,
    commands: RefCell<CommandProducer>,
    stream_failed: Arc<AtomicBool>,
    dropped_tones: DroppedTones,
}

/// Count of tones the callback had no voice for, published by the callback
/// and read on the scheduling thread
#[derive(Debug, Default)]
struct DroppedTones {
    published: Arc<AtomicU64>,
    reported: Cell<u64>,
}

impl DroppedTones {
    fn publisher(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.published)
    }

    /// Drops since the previous call
    fn take_new(&self) -> u64 {
        let dropped = self.published.load(Ordering::Relaxed);
        dropped.saturating_sub(self.reported.replace(dropped))
    }
}

impl CpalDevice {
    /// Process-wide (per scheduling thread) device, opened on first use
    ///
    /// The device starts suspended; schedulers resume it when a session starts.
    pub fn shared(config: &SchedulerConfig) -> Result<Rc<CpalDevice>, DeviceError> {
        SHARED_DEVICE.with(|cell| {
            if let Some(device) = cell.get() {
                return Ok(Rc::clone(device));
            }
            let device = Rc::new(CpalDevice::open_default(config)?);
            // Cell was empty above and nothing else runs on this thread
            let _ = cell.set(Rc::clone(&device));
            Ok(device)
        })
    }

    /// Open the host's default output device (suspended)
    pub fn open_default(config: &SchedulerConfig) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        Self::open(device, config)
    }

    /// Open a specific output device (suspended)
    pub fn open(device: Device, config: &SchedulerConfig) -> Result<Self, DeviceError> {
        log::info!(
            target: "Device",
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| DeviceError::Config(e.to_string()))?;
        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let stream_config: StreamConfig = supported_config.into();

        log::debug!(
            target: "Device",
            "Stream config: {} Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let timing = AudioTiming::new(sample_rate);
        let (producer, consumer) = create_command_channel(config.tone_queue_capacity);
        let stream_failed = Arc::new(AtomicBool::new(false));
        let dropped_tones = DroppedTones::default();

        let parts = CallbackParts {
            channels,
            consumer,
            timing: timing.clone(),
            mixer: ToneMixer::new(sample_rate, MAX_VOICES),
            stream_failed: Arc::clone(&stream_failed),
            dropped_tones: dropped_tones.publisher(),
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, parts),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, parts),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, parts),
            other => Err(DeviceError::Config(format!(
                "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                other
            ))),
        }?;

        // Some backends start streams on creation, others cannot pause at all
        let state = match stream.pause() {
            Ok(()) => DeviceState::Suspended,
            Err(e) => {
                log::warn!(target: "Device", "Cannot pause new stream ({}), starting it", e);
                stream
                    .play()
                    .map_err(|e| DeviceError::Stream(e.to_string()))?;
                DeviceState::Running
            }
        };

        Ok(Self {
            _device: device,
            stream,
            timing,
            state: Cell::new(state),
            commands: RefCell::new(producer),
            stream_failed,
            dropped_tones,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.timing.sample_rate()
    }

    /// Freeze the audio clock
    pub fn suspend(&self) -> Result<(), DeviceError> {
        if self.state() != DeviceState::Running {
            return Ok(());
        }
        self.stream
            .pause()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        self.state.set(DeviceState::Suspended);
        log::info!(target: "Device", "Suspended at {:.3}s", self.now());
        Ok(())
    }

    /// Scale everything the device renders
    pub fn set_master_gain(&self, gain: f32) -> Result<(), DeviceError> {
        self.push(Command::SetMasterGain(gain.clamp(0.0, 1.0)))
    }

    /// Warn about tones the callback dropped since the last report
    fn report_dropped_tones(&self) {
        let dropped = self.dropped_tones.take_new();
        if dropped > 0 {
            log::warn!(
                target: "Device",
                "{} tones dropped, all {} voices busy",
                dropped,
                MAX_VOICES
            );
        }
    }

    fn push(&self, command: Command) -> Result<(), DeviceError> {
        self.commands
            .borrow_mut()
            .try_push(command)
            .map_err(|_| DeviceError::QueueFull)
    }
}

impl AudioDevice for CpalDevice {
    fn now(&self) -> f64 {
        self.timing.now_seconds()
    }

    fn state(&self) -> DeviceState {
        if self.stream_failed.load(Ordering::Relaxed) {
            DeviceState::Closed
        } else {
            self.state.get()
        }
    }

    fn resume(&self) -> Result<(), DeviceError> {
        match self.state() {
            DeviceState::Running => Ok(()),
            DeviceState::Closed => Err(DeviceError::ResumeFailed(
                "stream reported an error".to_string(),
            )),
            DeviceState::Suspended => {
                self.stream
                    .play()
                    .map_err(|e| DeviceError::ResumeFailed(e.to_string()))?;
                self.state.set(DeviceState::Running);
                log::info!(target: "Device", "Resumed at {:.3}s", self.now());
                Ok(())
            }
        }
    }

    fn schedule_tone(&self, tone: Tone) -> Result<(), DeviceError> {
        self.report_dropped_tones();
        self.push(Command::ScheduleTone(tone))
    }
}

/// Everything the output callback owns
struct CallbackParts {
    channels: usize,
    consumer: CommandConsumer,
    timing: AudioTiming,
    mixer: ToneMixer,
    stream_failed: Arc<AtomicBool>,
    dropped_tones: Arc<AtomicU64>,
}

/// Build an output stream for any sample type the device asks for
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    parts: CallbackParts,
) -> Result<Stream, DeviceError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let CallbackParts {
        channels,
        mut consumer,
        timing,
        mut mixer,
        stream_failed,
        dropped_tones,
    } = parts;
    let mut master_gain = 1.0f32;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // No allocations, no I/O, no blocking locks
                if channels == 0 {
                    write_silence(data);
                    return;
                }
                let position = timing.current_sample();

                while let Some(command) = consumer.try_pop() {
                    match command {
                        Command::ScheduleTone(tone) => {
                            mixer.add(&tone, position);
                        }
                        Command::SetMasterGain(gain) => master_gain = gain,
                    }
                }

                let frames = data.len() / channels;
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    let sample = mixer.next_sample(position + i as u64) * master_gain;
                    write_mono_to_interleaved_frame(sample, frame);
                }

                mixer.retire_finished(position + frames as u64);
                dropped_tones.store(mixer.dropped(), Ordering::Relaxed);
                timing.advance(frames);
            },
            move |err| {
                log::error!(target: "Device", "Audio stream error: {}", err);
                stream_failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))
}
