use crate::error::{EngineError, Result};
use crate::timeline::Clip;

/// Validates a sequence frame rate.
///
/// # Example
/// ```
/// use engine::time::validate_fps;
///
/// assert!(validate_fps(29.97).is_ok());
/// assert!(validate_fps(0.0).is_err());
/// ```
pub fn validate_fps(fps: f64) -> Result<f64> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(EngineError::InvalidFrameRate(fps));
    }
    Ok(fps)
}

/// Converts a frame index to milliseconds.
pub fn frames_to_ms(frame: i64, fps: f64) -> f64 {
    frame as f64 / fps * 1_000.0
}

/// Converts a frame index to seconds.
pub fn frames_to_seconds(frame: i64, fps: f64) -> f64 {
    frame as f64 / fps
}

/// Duration of one timeline frame in milliseconds.
pub fn frame_duration_ms(fps: f64) -> f64 {
    1_000.0 / fps
}

/// Source frame shown by `clip` at `timeline_frame`.
///
/// `sourceInFrame + round(offsetInClip * speed)`.
///
/// # Example
/// ```
/// use engine::time::source_frame_at;
/// use engine::timeline::Clip;
///
/// let clip = Clip {
///     id: "c".into(),
///     track_id: "v1".into(),
///     media_id: Some("m".into()),
///     start_frame: 100,
///     source_in_frame: 40,
///     source_out_frame: 240,
///     speed: 2.0,
///     disabled: false,
/// };
/// assert_eq!(source_frame_at(&clip, 110), 60);
/// ```
pub fn source_frame_at(clip: &Clip, timeline_frame: i64) -> i64 {
    let offset = (timeline_frame - clip.start_frame) as f64;
    clip.source_in_frame + (offset * clip.speed).round() as i64
}

/// Source time in seconds shown by `clip` at `timeline_frame`.
pub fn source_seconds_at(clip: &Clip, timeline_frame: i64, fps: f64) -> f64 {
    frames_to_seconds(source_frame_at(clip, timeline_frame), fps)
}
