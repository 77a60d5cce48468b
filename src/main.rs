//! practice_audio - metronome and rhythm playback on the default output device
//!
//! Usage:
//!   practice_audio metronome <bpm> [accent] [beats] [--volume v] [--config file.ron]
//!   practice_audio rhythm <bpm> <values...> [--speed s] [--loop] [--count-in] [--volume v] [--config file.ron]
//!
//! Rhythm values are note value names (`quarter`, `dotted-eighth`,
//! `eighth-triplet`, ...), rests are written `rest:<value>`.

use practice_audio::sequencer::rhythm::{RhythmStep, rhythm_to_notes};
use practice_audio::{
    Click, CpalDevice, EventLoop, PlayOptions, PlaybackContext, PulseScheduler, SchedulerConfig,
    SequencePlayer, SystemWallClock, Tempo, WallClock,
};
use std::cell::RefCell;
use std::env;
use std::error::Error;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:
  practice_audio metronome <bpm> [accent] [beats] [--volume v] [--config file.ron]
  practice_audio rhythm <bpm> <values...> [--speed s] [--loop] [--count-in] [--volume v] [--config file.ron]";

/// Pitch used for rhythm playback (E5)
const RHYTHM_PITCH: u8 = 76;

/// Beats in a count-in
const COUNT_IN_BEATS: u64 = 4;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (flags, positional) = split_flags(&args);

    let config = match flags.value("--config") {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };

    let wall = Rc::new(SystemWallClock::new());
    let device = CpalDevice::shared(&config)?;
    if let Some(volume) = flags.value("--volume") {
        device.set_master_gain(volume.parse::<f32>()?)?;
    }
    let context = PlaybackContext::new(device.clone(), wall.clone());
    let event_loop = EventLoop::new(wall.clone());

    let result = match positional.first().map(String::as_str) {
        Some("metronome") => run_metronome(&positional[1..], context, &event_loop, &config),
        Some("rhythm") => run_rhythm(&positional[1..], &flags, context, wall, &event_loop, &config),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    // Let the last committed tones ring out before freezing the clock
    std::thread::sleep(std::time::Duration::from_millis(200));
    device.suspend()?;
    result
}

fn run_metronome(
    args: &[String],
    context: PlaybackContext,
    event_loop: &EventLoop,
    config: &SchedulerConfig,
) -> Result<(), Box<dyn Error>> {
    let bpm: f64 = args.first().ok_or(USAGE)?.parse()?;
    let accent: u32 = args.get(1).map(|a| a.parse::<u32>()).transpose()?.unwrap_or(4);
    let beats: Option<u64> = args.get(2).map(|b| b.parse::<u64>()).transpose()?;

    let mut metronome = PulseScheduler::new(context, config)?;
    metronome.on_click(|click| {
        println!(
            "{} beat {:>4} at {:8.3}s",
            if click.accent { "*" } else { " " },
            click.index + 1,
            click.time
        );
    });
    metronome.start(bpm, accent, beats)?;

    event_loop.run_until_idle(&mut [&mut metronome]);
    Ok(())
}

fn run_rhythm(
    args: &[String],
    flags: &Flags,
    context: PlaybackContext,
    wall: Rc<SystemWallClock>,
    event_loop: &EventLoop,
    config: &SchedulerConfig,
) -> Result<(), Box<dyn Error>> {
    let bpm: f64 = args.first().ok_or(USAGE)?.parse()?;
    let tempo = Tempo::new(bpm)?;

    let mut steps = Vec::new();
    for value in &args[1..] {
        let step = RhythmStep::parse(value).ok_or_else(|| format!("Unknown note value: {}", value))?;
        steps.push(step);
    }
    let notes = rhythm_to_notes(&steps, tempo, RHYTHM_PITCH);

    let speed = flags.value("--speed").map(str::parse::<f64>).transpose()?.unwrap_or(1.0);
    let options = PlayOptions::new()
        .with_speed(speed)
        .with_looping(flags.has("--loop"));

    if flags.has("--count-in") {
        count_in(bpm * speed, context.clone(), &wall, event_loop, config)?;
    }

    let mut player = SequencePlayer::new(context, config)?;
    player.on_stop(|| println!("Done."));
    player.play(&notes, options)?;

    event_loop.run_until_idle(&mut [&mut player]);
    Ok(())
}

/// Play a bar of clicks and return once the bar is over
fn count_in(
    bpm: f64,
    context: PlaybackContext,
    wall: &Rc<SystemWallClock>,
    event_loop: &EventLoop,
    config: &SchedulerConfig,
) -> Result<(), Box<dyn Error>> {
    let last_click: Rc<RefCell<Option<Click>>> = Rc::new(RefCell::new(None));
    let sink = last_click.clone();

    let mut metronome = PulseScheduler::new(context, config)?;
    metronome.on_click(move |click| *sink.borrow_mut() = Some(click));
    metronome.start(bpm, COUNT_IN_BEATS as u32, Some(COUNT_IN_BEATS))?;

    event_loop.run_until_idle(&mut [&mut metronome]);

    // The metronome stops once its last click is committed, one beat before
    // the bar actually ends
    if let Some(click) = *last_click.borrow() {
        wall.sleep_until_ms(click.wall_time_ms + 60_000.0 / bpm);
    }
    Ok(())
}

/// `--name value` pairs and bare `--switch`es
struct Flags {
    pairs: Vec<(String, Option<String>)>,
}

impl Flags {
    fn value(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(flag, _)| flag == name)
            .and_then(|(_, value)| value.as_deref())
    }

    fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(flag, _)| flag == name)
    }
}

const VALUE_FLAGS: [&str; 3] = ["--config", "--speed", "--volume"];

fn split_flags(args: &[String]) -> (Flags, Vec<String>) {
    let mut pairs = Vec::new();
    let mut positional = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            pairs.push((arg.clone(), iter.next().cloned()));
        } else if arg.starts_with("--") {
            pairs.push((arg.clone(), None));
        } else {
            positional.push(arg.clone());
        }
    }

    (Flags { pairs }, positional)
}
