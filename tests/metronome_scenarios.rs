// Integration test: metronome sessions on a simulated audio device
//
// The offline device advances both clocks whenever the event loop sleeps, so
// whole sessions run instantly and deterministically.

use practice_audio::audio::offline::OfflineDevice;
use practice_audio::{
    AudioDevice, Click, DeviceError, DeviceState, EventLoop, PulseScheduler, SchedulerConfig,
    SchedulerError, Tick, TransportState, WallClock,
};
use std::cell::RefCell;
use std::rc::Rc;

struct Harness {
    device: Rc<OfflineDevice>,
    event_loop: EventLoop,
    metronome: PulseScheduler,
    clicks: Rc<RefCell<Vec<Click>>>,
    stops: Rc<RefCell<u32>>,
}

fn harness(device: OfflineDevice) -> Harness {
    let (device, context) = device.into_context();
    let mut metronome = PulseScheduler::new(context, &SchedulerConfig::default()).unwrap();

    let clicks = Rc::new(RefCell::new(Vec::new()));
    let sink = clicks.clone();
    metronome.on_click(move |click| sink.borrow_mut().push(click));

    let stops = Rc::new(RefCell::new(0));
    let counter = stops.clone();
    metronome.on_stop(move || *counter.borrow_mut() += 1);

    Harness {
        event_loop: EventLoop::new(device.clone()),
        device,
        metronome,
        clicks,
        stops,
    }
}

#[test]
fn test_bounded_run_120_bpm() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.start(120.0, 4, Some(8)).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.metronome]);

    let clicks = h.clicks.borrow();
    assert_eq!(clicks.len(), 8);

    for (i, click) in clicks.iter().enumerate() {
        assert_eq!(click.index, i as u64);
        assert!((click.time - i as f64 * 0.5).abs() < 1e-9);
    }

    let accents: Vec<u64> = clicks.iter().filter(|c| c.accent).map(|c| c.index).collect();
    assert_eq!(accents, vec![0, 3, 7]);

    // Stopped by itself as soon as the last beat was committed
    assert_eq!(*h.stops.borrow(), 1);
    assert_eq!(h.metronome.state(), TransportState::Stopped);
    assert_eq!(h.metronome.beat_count(), 8);
    assert!(h.device.now() < 3.5);
}

#[test]
fn test_tones_follow_accents() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.start(120.0, 4, Some(4)).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.metronome]);

    let frequencies: Vec<f32> = h.device.tones().iter().map(|t| t.tone.frequency_hz).collect();
    assert_eq!(frequencies, vec![300.0, 200.0, 200.0, 300.0]);
    assert!(h.device.tones().iter().all(|t| t.tone.duration == 0.04));
}

#[test]
fn test_invalid_tempo_creates_no_session() {
    let mut h = harness(OfflineDevice::new());

    let result = h.metronome.start(0.0, 4, None);
    assert!(matches!(
        result,
        Err(SchedulerError::InvalidParameter { name: "bpm", .. })
    ));

    let ticks = h.event_loop.run_until_idle(&mut [&mut h.metronome]);
    assert_eq!(ticks, 0);
    assert!(h.clicks.borrow().is_empty());
    assert_eq!(*h.stops.borrow(), 0);
    assert!(h.device.tones().is_empty());
    assert!(!h.metronome.is_running());
}

#[test]
fn test_unbounded_run_stays_on_grid() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.start(120.0, 4, None).unwrap();
    h.event_loop.run_for(10_000.0, &mut [&mut h.metronome]);

    assert!(h.metronome.is_running());
    // Committed up to 10s + lookahead
    assert_eq!(h.clicks.borrow().len(), 21);
    for click in h.clicks.borrow().iter() {
        assert_eq!(click.time, click.index as f64 * 0.5);
    }

    h.metronome.stop();
    h.metronome.stop();
    assert_eq!(*h.stops.borrow(), 1);
    assert!(h.metronome.next_deadline_ms().is_none());
}

#[test]
fn test_suspended_device_is_resumed() {
    let mut h = harness(OfflineDevice::suspended());
    // Time passes before the first interaction
    h.device.advance(2.0);
    assert_eq!(h.device.now(), 0.0);

    h.metronome.start(60.0, 4, Some(2)).unwrap();
    assert_eq!(h.device.state(), DeviceState::Running);

    h.event_loop.run_until_idle(&mut [&mut h.metronome]);
    let clicks = h.clicks.borrow();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[1].time, 1.0);
    // Wall clock ran ahead while the device was suspended
    assert!((clicks[0].wall_time_ms - 2000.0).abs() < 1e-6);
}

#[test]
fn test_failed_resume_aborts_start() {
    let device = OfflineDevice::suspended();
    device.fail_resume(true);
    let mut h = harness(device);

    let result = h.metronome.start(120.0, 4, None);
    assert!(matches!(
        result,
        Err(SchedulerError::Device(DeviceError::ResumeFailed(_)))
    ));
    assert!(!h.metronome.is_running());
    assert!(h.metronome.bpm().is_none());
    assert!(h.device.tones().is_empty());
}

#[test]
fn test_restart_resets_grid_without_stop_notification() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.start(120.0, 4, None).unwrap();
    h.event_loop.run_for(1_000.0, &mut [&mut h.metronome]);

    h.metronome.start(60.0, 3, None).unwrap();
    assert_eq!(*h.stops.borrow(), 0);
    assert_eq!(h.metronome.beat_count(), 1);

    let last = *h.clicks.borrow().last().unwrap();
    assert_eq!(last.index, 0);
    assert!(last.accent);
    assert_eq!(last.time, h.device.now());
}

#[test]
fn test_volume_change_applies_to_later_beats() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.start(120.0, 4, None).unwrap();
    h.event_loop.run_for(600.0, &mut [&mut h.metronome]);
    h.metronome.set_volume(0.3);
    h.event_loop.run_for(600.0, &mut [&mut h.metronome]);
    h.metronome.stop();

    let gains: Vec<f32> = h.device.tones().iter().map(|t| t.tone.gain).collect();
    assert_eq!(gains.first(), Some(&1.0));
    assert_eq!(gains.last(), Some(&0.3));
}

#[test]
fn test_count_in_then_toggle() {
    let mut h = harness(OfflineDevice::new());
    h.metronome.toggle(Some(90.0), 4, Some(4)).unwrap();
    h.event_loop.run_until_idle(&mut [&mut h.metronome]);
    assert_eq!(h.clicks.borrow().len(), 4);

    // Toggle again reuses the last tempo
    h.metronome.toggle(None, 4, None).unwrap();
    assert!(h.metronome.is_running());
    assert_eq!(h.metronome.bpm(), Some(90.0));
    h.metronome.toggle(None, 4, None).unwrap();
    assert!(!h.metronome.is_running());
    assert_eq!(*h.stops.borrow(), 2);
    assert!(h.device.now_ms() > 0.0);
}
