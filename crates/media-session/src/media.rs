use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Media resource a session can open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    pub media_id: String,
    pub path: PathBuf,
    /// Known media duration; `<= 0` means unknown.
    pub duration_ms: f64,
    pub frame_rate: f64,
}

impl MediaSource {
    /// True when the frame rate is finite and positive.
    pub fn has_valid_frame_rate(&self) -> bool {
        self.frame_rate.is_finite() && self.frame_rate > 0.0
    }

    /// Duration of one source frame in milliseconds.
    ///
    /// # Example
    /// ```
    /// use media_session::MediaSource;
    ///
    /// let source = MediaSource {
    ///     media_id: "a".into(),
    ///     path: "a.mp4".into(),
    ///     duration_ms: 1_000.0,
    ///     frame_rate: 25.0,
    /// };
    /// assert_eq!(source.frame_duration_ms(), 40.0);
    /// ```
    pub fn frame_duration_ms(&self) -> f64 {
        1_000.0 / self.frame_rate
    }

    /// Timestamp of source frame `index` in milliseconds.
    pub fn frame_time_ms(&self, index: i64) -> f64 {
        index as f64 * 1_000.0 / self.frame_rate
    }

    /// Index of the first frame presented at or after `time_ms`.
    pub fn frame_index_at(&self, time_ms: f64) -> i64 {
        let exact = time_ms.max(0.0) * self.frame_rate / 1_000.0;
        // Snap values within float noise of an integer onto it.
        let nearest = exact.round();
        if (exact - nearest).abs() < 1e-6 {
            nearest as i64
        } else {
            exact.ceil() as i64
        }
    }
}

/// One decoded frame handed downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub media_id: String,
    pub timestamp_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::MediaSource;

    fn source(frame_rate: f64) -> MediaSource {
        MediaSource {
            media_id: "m".into(),
            path: "m.mp4".into(),
            duration_ms: 10_000.0,
            frame_rate,
        }
    }

    #[test]
    fn frame_index_snaps_exact_frame_times() {
        let media = source(29.97);
        let t = media.frame_time_ms(3);
        assert_eq!(media.frame_index_at(t), 3);
    }

    #[test]
    fn frame_index_rounds_up_between_frames() {
        let media = source(25.0);
        assert_eq!(media.frame_index_at(41.0), 2);
        assert_eq!(media.frame_index_at(-5.0), 0);
    }

    #[test]
    fn frame_rate_must_be_finite_and_positive() {
        assert!(source(25.0).has_valid_frame_rate());
        assert!(!source(0.0).has_valid_frame_rate());
        assert!(!source(-25.0).has_valid_frame_rate());
        assert!(!source(f64::NAN).has_valid_frame_rate());
    }
}
