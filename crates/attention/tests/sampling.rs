//! Sampling loop behaviour: hysteresis, transient failures, failure bound

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use attention::{AttentionStatus, Monitor, MonitorConfig, MonitorHealth};
use common::{fast_config, wait_until, FakeCamera, FakeDetector};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_transient_read_failures_keep_loop_alive() {
    let camera = FakeCamera::with_devices(&[0]);
    camera.state.fail_next.store(3, Ordering::SeqCst);
    let detector = FakeDetector::seeing_face(true);
    let calls = detector.calls.clone();
    let monitor = Monitor::new(fast_config(), camera.clone(), detector).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.snapshot().samples >= 2));

    assert!(monitor.is_running());
    assert_eq!(monitor.status(), AttentionStatus::Focused);
    assert!(camera.reads() >= 5);
    assert_eq!(camera.releases(), 0);

    monitor.stop().unwrap();
    assert_eq!(camera.releases(), 1);
    // Failed reads never reached the detector
    assert_eq!(camera.reads() - calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_failed_reads_alone_do_not_distract() {
    // Reads fail for far longer than the threshold, but no sample ever
    // reaches the state machine, so the status cannot flip
    let camera = FakeCamera::with_devices(&[0]);
    camera.state.always_fail.store(true, Ordering::SeqCst);
    let config = MonitorConfig {
        distraction_threshold_ms: 20,
        ..fast_config()
    };
    let monitor = Monitor::new(config, camera.clone(), FakeDetector::seeing_face(false)).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || camera.reads() >= 20));
    assert_eq!(monitor.status(), AttentionStatus::Focused);
    assert_eq!(monitor.snapshot().samples, 0);
    monitor.stop().unwrap();
}

#[test]
fn test_absence_beyond_threshold_distracts_and_presence_restores() {
    let camera = FakeCamera::with_devices(&[0]);
    let detector = FakeDetector::seeing_face(false);
    let face = detector.face.clone();
    let config = MonitorConfig {
        distraction_threshold_ms: 50,
        ..fast_config()
    };
    let monitor = Monitor::new(config, camera, detector).unwrap();
    let mut rx = monitor.subscribe();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.status() == AttentionStatus::Distracted));
    assert!(rx.has_changed().unwrap());
    assert!(rx.borrow_and_update().last_presence_at.is_none());

    face.store(true, Ordering::SeqCst);
    assert!(wait_until(WAIT, || monitor.status() == AttentionStatus::Focused));
    assert!(monitor.snapshot().last_presence_at.is_some());

    monitor.stop().unwrap();
    // Last known status survives stop
    assert_eq!(monitor.status(), AttentionStatus::Focused);
}

#[test]
fn test_short_gaps_stay_focused() {
    let camera = FakeCamera::with_devices(&[0]);
    let detector = FakeDetector::seeing_face(true);
    let face = detector.face.clone();
    let config = MonitorConfig {
        distraction_threshold_ms: 10_000,
        ..fast_config()
    };
    let monitor = Monitor::new(config, camera, detector).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.snapshot().samples >= 1));
    face.store(false, Ordering::SeqCst);
    let before = monitor.snapshot().samples;
    assert!(wait_until(WAIT, || monitor.snapshot().samples >= before + 10));
    assert_eq!(monitor.status(), AttentionStatus::Focused);
    monitor.stop().unwrap();
}

#[test]
fn test_failure_bound_marks_unavailable_and_releases() {
    let camera = FakeCamera::with_devices(&[0]);
    camera.state.always_fail.store(true, Ordering::SeqCst);
    let config = MonitorConfig {
        max_consecutive_failures: Some(3),
        ..fast_config()
    };
    let monitor = Monitor::new(config, camera.clone(), FakeDetector::seeing_face(true)).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.health() == MonitorHealth::Unavailable));
    assert!(wait_until(WAIT, || camera.releases() == 1));
    assert_eq!(camera.reads(), 3);
    assert!(!monitor.is_running());
    assert_eq!(monitor.status(), AttentionStatus::Focused);

    // A later start reclaims the detector and tries again
    camera.state.always_fail.store(false, Ordering::SeqCst);
    monitor.start().unwrap();
    assert!(monitor.is_running());
    assert_eq!(camera.opens(), 2);
    monitor.stop().unwrap();
    assert_eq!(camera.releases(), 2);
}

#[test]
fn test_lost_model_mid_run_marks_unavailable() {
    // No failure bound: only the fatal classification can end the loop
    let camera = FakeCamera::with_devices(&[0]);
    let detector = FakeDetector::seeing_face(true);
    let lost_model = detector.lost_model.clone();
    let calls = detector.calls.clone();
    let monitor = Monitor::new(fast_config(), camera.clone(), detector).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.snapshot().samples >= 2));
    lost_model.store(true, Ordering::SeqCst);

    assert!(wait_until(WAIT, || monitor.health() == MonitorHealth::Unavailable));
    assert!(wait_until(WAIT, || camera.releases() == 1));
    assert!(!monitor.is_running());
    assert_eq!(monitor.snapshot().device_index, None);

    // Gave up on the first fatal error instead of retrying
    let after = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(calls.load(Ordering::SeqCst), after);
    assert_eq!(monitor.status(), AttentionStatus::Focused);
}

#[test]
fn test_disconnected_camera_marks_unavailable() {
    let camera = FakeCamera::with_devices(&[0]);
    let monitor = Monitor::new(fast_config(), camera.clone(), FakeDetector::seeing_face(true)).unwrap();

    monitor.start().unwrap();
    assert!(wait_until(WAIT, || monitor.snapshot().samples >= 1));
    camera.state.disconnected.store(true, Ordering::SeqCst);

    assert!(wait_until(WAIT, || monitor.health() == MonitorHealth::Unavailable));
    assert!(wait_until(WAIT, || camera.releases() == 1));
    let reads = camera.reads();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(camera.reads(), reads);

    // The camera comes back and a restart picks it up
    camera.state.disconnected.store(false, Ordering::SeqCst);
    monitor.start().unwrap();
    assert!(monitor.is_running());
    assert_eq!(camera.opens(), 2);
    monitor.stop().unwrap();
    assert_eq!(camera.releases(), 2);
}
