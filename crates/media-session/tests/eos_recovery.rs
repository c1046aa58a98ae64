use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use media_session::{DecoderSession, MediaSource, SessionError};

fn source(media_id: &str, duration_ms: f64) -> MediaSource {
    MediaSource {
        media_id: media_id.into(),
        path: format!("{media_id}.mp4").into(),
        duration_ms,
        frame_rate: 10.0,
    }
}

fn opened(duration_ms: f64) -> DecoderSession {
    let session = DecoderSession::new("clip-a");
    session
        .open(source("clip-a", duration_ms))
        .expect("open should succeed");
    session
}

#[test]
fn spurious_eos_after_stop_is_ignored_until_play_rearms() {
    let session = opened(1_000.0);
    session.play(0.0).expect("play");
    session.stop();

    for _ in 0..5 {
        assert!(!session.signal_native_eos());
    }
    assert_eq!(session.eos_seek_backs(), 0);

    session.play(0.0).expect("play");
    assert!(session.signal_native_eos());
    assert_eq!(session.eos_seek_backs(), 1);
    assert_eq!(session.position_ms(), 800.0);
    assert!(!session.is_running());
}

#[test]
fn media_switch_suppresses_late_eos_from_previous_media() {
    let session = opened(1_000.0);
    session.play(0.0).expect("play");

    session
        .open(source("clip-b", 2_000.0))
        .expect("switch should succeed");

    assert!(session.is_stopping());
    assert!(!session.signal_native_eos());
    assert_eq!(session.eos_listener_count(), 1);
}

#[test]
fn eos_without_registered_listener_does_nothing() {
    let session = opened(1_000.0);
    assert!(!session.is_eos_guarded());
    assert!(!session.signal_native_eos());
    assert_eq!(session.eos_seek_backs(), 0);
}

#[test]
fn replaying_does_not_register_a_second_listener() {
    let session = opened(1_000.0);
    session.play(0.0).expect("play");
    session.stop();
    session.play(0.1).expect("play");

    assert!(session.is_eos_guarded());
    assert_eq!(session.eos_listener_count(), 1);
}

#[test]
fn destroy_detaches_the_listener() {
    let session = opened(1_000.0);
    session.play(0.0).expect("play");

    session.destroy();

    assert!(session.is_stopping());
    assert!(!session.is_eos_guarded());
    assert_eq!(session.eos_listener_count(), 0);
}

#[test]
fn duration_throttle_pauses_before_native_end_of_stream() {
    let session = opened(1_000.0);
    session.play(0.5).expect("play");
    let now = Instant::now();

    let mut delivered = Vec::new();
    while let Some(frame) = session.pump(now) {
        delivered.push(frame.timestamp_ms);
    }

    assert_eq!(delivered, vec![500.0, 600.0, 700.0, 800.0]);
    assert!(!session.is_running());
    assert!(!session.is_playing());
    assert_eq!(session.eos_seek_backs(), 0);
}

#[test]
fn clip_end_callback_fires_once_at_range_end() {
    let session = opened(5_000.0);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    session
        .configure(
            0.0,
            300.0,
            Some(Box::new(move |frame_ms, clip_end_ms| {
                sink.lock().push((frame_ms, clip_end_ms));
            })),
        )
        .expect("configure");
    session.play(0.0).expect("play");

    let now = Instant::now();
    for _ in 0..6 {
        session.pump(now);
    }

    assert_eq!(*calls.lock(), vec![(300.0, 300.0)]);
}

#[test]
fn stall_marks_eos_and_seek_recovers_first() {
    let session = opened(5_000.0);
    session.play(0.0).expect("play");

    assert!(session.poll_stall(Instant::now() + Duration::from_millis(450)));
    assert!(session.at_eos());
    assert!(!session.is_playing());

    session.seek(0.2).expect("seek should recover and succeed");

    assert!(!session.at_eos());
    assert_eq!(session.position_ms(), 200.0);
    assert!(session.source().is_some());

    session.play(0.2).expect("play after recovery");
    let frame = session.pump(Instant::now()).expect("frame after recovery");
    assert_eq!(frame.timestamp_ms, 200.0);
}

#[test]
fn recovery_requires_a_ready_decode_module() {
    let session = opened(5_000.0);
    session.play(0.0).expect("play");
    assert!(session.poll_stall(Instant::now() + Duration::from_millis(450)));
    session.set_module_ready(false);

    assert!(matches!(
        session.recover_from_eos(),
        Err(SessionError::ModuleNotReady { .. })
    ));
    assert!(session.at_eos());

    session.set_module_ready(true);
    session.recover_from_eos().expect("recovery should succeed");
    assert!(!session.at_eos());
}

#[test]
fn recovery_requires_end_of_stream() {
    let session = opened(5_000.0);
    assert!(matches!(
        session.recover_from_eos(),
        Err(SessionError::NotAtEos { .. })
    ));
}

#[tokio::test]
async fn burst_decode_leaves_playback_untouched() {
    let session = opened(1_000.0);
    session.seek(0.3).expect("seek");

    let frames = session
        .burst_decode(0.0, 500.0)
        .await
        .expect("burst should succeed");

    let timestamps: Vec<f64> = frames.iter().map(|frame| frame.timestamp_ms).collect();
    assert_eq!(timestamps, vec![0.0, 100.0, 200.0, 300.0, 400.0]);
    assert_eq!(session.position_ms(), 300.0);
    assert!(!session.is_active());
}

#[tokio::test]
async fn open_rejects_a_non_positive_frame_rate() {
    let session = DecoderSession::new("clip-a");
    let mut bad = source("clip-a", 1_000.0);
    bad.frame_rate = -25.0;

    assert!(matches!(
        session.open(bad),
        Err(SessionError::InvalidFrameRate { frame_rate, .. }) if frame_rate == -25.0
    ));
    assert!(matches!(
        session.burst_decode(0.0, 500.0).await,
        Err(SessionError::NoMediaLoaded { .. })
    ));
}
