// Integration test: sequence player sessions on a simulated audio device

use practice_audio::audio::offline::OfflineDevice;
use practice_audio::sequencer::note::midi_to_frequency;
use practice_audio::{
    AudioDevice, EventLoop, Note, PlayOptions, PulseScheduler, SchedulerConfig, SchedulerError,
    SequencePlayer, Tick, TransportState,
};
use std::cell::RefCell;
use std::rc::Rc;

struct Harness {
    device: Rc<OfflineDevice>,
    event_loop: EventLoop,
    player: SequencePlayer,
    times: Rc<RefCell<Vec<Option<f64>>>>,
    stops: Rc<RefCell<u32>>,
}

fn harness(device: OfflineDevice) -> Harness {
    let (device, context) = device.into_context();
    let mut player = SequencePlayer::new(context, &SchedulerConfig::default()).unwrap();

    let times = Rc::new(RefCell::new(Vec::new()));
    let sink = times.clone();
    player.on_time_change(move |t| sink.borrow_mut().push(t));

    let stops = Rc::new(RefCell::new(0));
    let counter = stops.clone();
    player.on_stop(move || *counter.borrow_mut() += 1);

    Harness {
        event_loop: EventLoop::new(device.clone()),
        device,
        player,
        times,
        stops,
    }
}

/// Notes at onsets 0, 1 and 2 seconds, one second each
fn three_notes() -> Vec<Note> {
    vec![
        Note::new(1, 60, 0.0, 1.0, 100),
        Note::new(2, 62, 1.0, 1.0, 100),
        Note::new(3, 64, 2.0, 1.0, 100),
    ]
}

fn positions(times: &[Option<f64>]) -> Vec<f64> {
    times.iter().filter_map(|t| *t).collect()
}

#[test]
fn test_trimmed_double_speed_run() {
    let mut h = harness(OfflineDevice::new());
    let options = PlayOptions::new().with_start_at(1.0).with_speed(2.0);
    h.player.play(&three_notes(), options).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    // Onset 0 trimmed, the rest shifted to 0 and compressed by 2
    let tones = h.device.tones();
    assert_eq!(tones.len(), 2);
    assert_eq!(tones[0].tone.start_time, 0.0);
    assert_eq!(tones[1].tone.start_time, 0.5);
    assert!(tones.iter().all(|t| t.tone.duration == 0.5));
    assert_eq!(tones[0].tone.frequency_hz, midi_to_frequency(62));
    assert_eq!(tones[1].tone.frequency_hz, midi_to_frequency(64));

    // The 3s song lasts 1.5s at double speed; counted from start_at = 1 that
    // is reached after 0.5s of audio, at position 2
    let times = h.times.borrow();
    let reported = positions(&times);
    let last = *reported.last().unwrap();
    assert!(last >= 2.0 && last < 2.07, "stopped at {}", last);
    assert_eq!(times.last(), Some(&None));
    assert!(h.device.now() >= 0.5 && h.device.now() < 0.54);

    assert!(reported.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reported[0], 1.0);
    assert_eq!(*h.stops.borrow(), 1);
    assert!(!h.player.is_playing());
}

#[test]
fn test_doubling_speed_halves_duration() {
    let run = |speed: f64| {
        let mut h = harness(OfflineDevice::new());
        h.player
            .play(&three_notes(), PlayOptions::new().with_speed(speed))
            .unwrap();
        h.event_loop.run_until_idle(&mut [&mut h.player]);
        h.device.now()
    };

    let normal = run(1.0);
    let double = run(2.0);
    let half = run(0.5);

    assert!((normal - 3.0).abs() < 0.04);
    assert!((double - 1.5).abs() < 0.04);
    assert!((half - 6.0).abs() < 0.04);
}

#[test]
fn test_reported_time_maps_back_to_song_time() {
    let mut h = harness(OfflineDevice::new());
    let samples = Rc::new(RefCell::new(Vec::new()));
    let sink = samples.clone();
    let device = h.device.clone();
    h.player
        .on_time_change(move |t| sink.borrow_mut().push((device.now(), t)));

    h.player
        .play(&three_notes(), PlayOptions::new().with_start_at(0.5).with_speed(0.5))
        .unwrap();
    h.event_loop.run_for(2_000.0, &mut [&mut h.player]);

    // position = (audio elapsed) * speed + start_at
    let samples = samples.borrow();
    assert!(samples.len() > 50);
    for &(now, reported) in samples.iter() {
        let reported = reported.unwrap();
        assert!((reported - (now * 0.5 + 0.5)).abs() < 1e-9);
    }
}

#[test]
fn test_pause_and_resume_continue_from_position() {
    let mut h = harness(OfflineDevice::new());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.event_loop.run_for(500.0, &mut [&mut h.player]);

    h.player.pause().unwrap();
    let paused_at = h.player.current_play_time().unwrap();
    assert!(paused_at > 0.4 && paused_at <= 0.5);
    assert!(h.player.is_paused());
    assert!(h.player.next_deadline_ms().is_none());

    // Nothing polls while paused
    let reports = h.times.borrow().len();
    h.device.advance(5.0);
    assert_eq!(h.event_loop.run_until_idle(&mut [&mut h.player]), 0);
    assert_eq!(h.times.borrow().len(), reports);

    let resumed_at = h.device.now();
    h.player.resume().unwrap();
    assert_eq!(h.player.current_play_time(), Some(paused_at));
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    // Notes 2 and 3 land where the song says, relative to the resume point
    let tones = h.device.tones();
    assert_eq!(tones.len(), 3);
    assert!((tones[1].tone.start_time - (resumed_at + 1.0 - paused_at)).abs() < 1e-9);
    assert!((tones[2].tone.start_time - (resumed_at + 2.0 - paused_at)).abs() < 1e-9);
    assert_eq!(*h.stops.borrow(), 1);
}

#[test]
fn test_second_pause_notifies_nobody() {
    let mut h = harness(OfflineDevice::new());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.event_loop.run_for(400.0, &mut [&mut h.player]);

    h.player.pause().unwrap();
    let reports = h.times.borrow().len();
    let tones = h.device.tones().len();

    h.player.pause().unwrap();
    h.device.advance(1.0);
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    assert!(h.player.is_paused());
    assert_eq!(h.times.borrow().len(), reports);
    assert_eq!(h.device.tones().len(), tones);
    assert_eq!(*h.stops.borrow(), 0);
}

#[test]
fn test_zero_length_note_plays_then_stops() {
    let mut h = harness(OfflineDevice::new());
    let tick = vec![Note::new(1, 76, 0.0, 0.0, 100)];
    h.player.play(&tick, PlayOptions::default()).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    let tones = h.device.tones();
    assert_eq!(tones.len(), 1);
    assert_eq!(tones[0].tone.start_time, 0.0);
    assert_eq!(*h.stops.borrow(), 1);
    assert!(!h.player.is_playing());
}

#[test]
fn test_zero_length_loop_repeats_per_poll() {
    let mut h = harness(OfflineDevice::new());
    let tick = vec![Note::new(1, 76, 0.0, 0.0, 100)];
    h.player
        .play(&tick, PlayOptions::new().with_looping(true))
        .unwrap();
    h.event_loop.run_for(200.0, &mut [&mut h.player]);

    // Each restart waits for the next poll instead of restarting in place
    assert!(h.player.is_playing());
    assert_eq!(*h.stops.borrow(), 0);
    let tones = h.device.tones();
    assert!(tones.len() >= 4 && tones.len() <= 8, "{} tones", tones.len());
    assert!(tones.windows(2).all(|w| w[0].tone.start_time < w[1].tone.start_time));

    h.player.stop(true);
    assert_eq!(*h.stops.borrow(), 1);
}

#[test]
fn test_invalid_transitions_are_rejected() {
    let mut h = harness(OfflineDevice::new());

    assert!(matches!(
        h.player.resume(),
        Err(SchedulerError::InvalidOperation(_))
    ));
    assert!(matches!(
        h.player.pause(),
        Err(SchedulerError::InvalidOperation(_))
    ));
    assert_eq!(
        h.player.play(&[], PlayOptions::default()),
        Err(SchedulerError::EmptyInput)
    );
    assert!(matches!(
        h.player.play(&three_notes(), PlayOptions::new().with_speed(0.0)),
        Err(SchedulerError::InvalidParameter { name: "speed", .. })
    ));

    assert_eq!(h.player.state(), TransportState::Stopped);
    assert!(h.times.borrow().is_empty());
    assert_eq!(*h.stops.borrow(), 0);
    assert!(h.device.tones().is_empty());
}

#[test]
fn test_looping_wraps_without_stopping() {
    let mut h = harness(OfflineDevice::new());
    h.player
        .play(&three_notes(), PlayOptions::new().with_looping(true))
        .unwrap();
    h.event_loop.run_for(7_000.0, &mut [&mut h.player]);

    assert!(h.player.is_playing());
    assert_eq!(*h.stops.borrow(), 0);

    let reported = positions(&h.times.borrow());
    let wraps: Vec<usize> = (1..reported.len())
        .filter(|&i| reported[i] < reported[i - 1])
        .collect();
    assert_eq!(wraps.len(), 2);
    for &i in &wraps {
        // Position reached the song end then snapped back to the start
        assert!(reported[i - 1] >= 3.0 && reported[i - 1] < 3.04);
        assert_eq!(reported[i], 0.0);
    }

    // Every pass committed the whole sequence
    assert!(h.device.tones().len() >= 7);

    h.player.stop(true);
    assert_eq!(*h.stops.borrow(), 1);
    assert_eq!(h.times.borrow().last(), Some(&None));
}

#[test]
fn test_loop_window_repeats_trimmed_range() {
    let mut h = harness(OfflineDevice::new());
    let options = PlayOptions::new()
        .with_start_at(1.0)
        .with_end_at(2.0)
        .with_looping(true);
    h.player.play(&three_notes(), options).unwrap();
    h.event_loop.run_for(3_500.0, &mut [&mut h.player]);

    // Only the note at onset 1 falls inside [1, 2)
    let frequencies: Vec<f32> = h.device.tones().iter().map(|t| t.tone.frequency_hz).collect();
    assert!(frequencies.len() >= 3);
    assert!(frequencies.iter().all(|&f| f == midi_to_frequency(62)));

    let reported = positions(&h.times.borrow());
    assert!(reported.iter().all(|&t| (1.0..2.04).contains(&t)));
}

#[test]
fn test_resumed_loop_restarts_from_original_start() {
    let mut h = harness(OfflineDevice::new());
    h.player
        .play(&three_notes(), PlayOptions::new().with_looping(true))
        .unwrap();
    h.event_loop.run_for(1_200.0, &mut [&mut h.player]);
    h.player.pause().unwrap();
    h.player.resume().unwrap();
    h.event_loop.run_for(2_500.0, &mut [&mut h.player]);

    let reported = positions(&h.times.borrow());
    let wrap = (1..reported.len())
        .find(|&i| reported[i] < reported[i - 1])
        .unwrap();
    assert_eq!(reported[wrap], 0.0);
}

#[test]
fn test_play_replaces_active_session() {
    let mut h = harness(OfflineDevice::new());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.event_loop.run_for(300.0, &mut [&mut h.player]);

    let other = vec![Note::new(10, 72, 0.0, 0.25, 90)];
    h.player.play(&other, PlayOptions::default()).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    // Only the explicit end of the second session is reported
    assert_eq!(*h.stops.borrow(), 1);
    let last_tone = *h.device.tones().last().unwrap();
    assert_eq!(last_tone.tone.frequency_hz, midi_to_frequency(72));
}

#[test]
fn test_stop_is_idempotent() {
    let mut h = harness(OfflineDevice::new());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.player.stop(true);
    h.player.stop(true);
    h.player.stop(false);

    assert_eq!(*h.stops.borrow(), 1);
    let nulls = h.times.borrow().iter().filter(|t| t.is_none()).count();
    assert_eq!(nulls, 1);
}

#[test]
fn test_paused_player_can_be_stopped() {
    let mut h = harness(OfflineDevice::new());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.player.pause().unwrap();
    h.player.stop(true);

    assert_eq!(h.player.state(), TransportState::Stopped);
    assert_eq!(*h.stops.borrow(), 1);
    assert!(h.player.resume().is_err());
}

#[test]
fn test_suspended_device_resumed_on_play() {
    let mut h = harness(OfflineDevice::suspended());
    h.player.play(&three_notes(), PlayOptions::default()).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.player]);

    assert_eq!(h.device.tones().len(), 3);
    assert!(h.device.now() >= 3.0);
}

#[test]
fn test_metronome_and_player_share_device() {
    let (device, context) = OfflineDevice::new().into_context();
    let config = SchedulerConfig::default();
    let event_loop = EventLoop::new(device.clone());

    let mut metronome = PulseScheduler::new(context.clone(), &config).unwrap();
    let mut player = SequencePlayer::new(context, &config).unwrap();

    metronome.start(120.0, 4, Some(6)).unwrap();
    player.play(&three_notes(), PlayOptions::default()).unwrap();
    event_loop.run_until_idle(&mut [&mut metronome, &mut player]);

    let tones = device.tones();
    let clicks = tones.iter().filter(|t| t.tone.duration == 0.04).count();
    assert_eq!(clicks, 6);
    assert_eq!(tones.len(), 9);
    assert!(!metronome.is_running());
    assert!(!player.is_playing());
}
