/// Distance before the media end at which playback pauses itself.
pub const DURATION_THROTTLE_MS: f64 = 200.0;

/// Returns true when a frame at `frame_ms` is close enough to the end of
/// the media that a playing session must pause before the native decoder
/// reaches a real end of stream.
///
/// Unknown durations (`<= 0`) never throttle.
pub fn should_throttle(frame_ms: f64, duration_ms: f64, playing: bool) -> bool {
    playing && duration_ms > 0.0 && frame_ms >= duration_ms - DURATION_THROTTLE_MS
}

/// Clamps a seek target that is at or past the media end to a safe offset.
///
/// # Example
/// ```
/// use media_session::clamp_seek_ms;
///
/// assert_eq!(clamp_seek_ms(10_000.0, 10_000.0), 9_800.0);
/// assert_eq!(clamp_seek_ms(9_999.0, 10_000.0), 9_999.0);
/// assert_eq!(clamp_seek_ms(500.0, -1.0), 500.0);
/// ```
pub fn clamp_seek_ms(time_ms: f64, duration_ms: f64) -> f64 {
    if duration_ms > 0.0 && time_ms >= duration_ms {
        (duration_ms - DURATION_THROTTLE_MS).max(0.0)
    } else {
        time_ms
    }
}
