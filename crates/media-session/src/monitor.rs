use std::time::{Duration, Instant};

/// Frame gap after which a playing session is considered to be at end of stream.
pub const EOS_TIMEOUT: Duration = Duration::from_millis(400);

/// Timeout-based end-of-stream detection.
///
/// Used where the native signal cannot be trusted to fire at all, e.g. a
/// stalled codec that simply stops producing frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EosMonitor {
    is_playing: bool,
    at_eos: bool,
    last_frame_at: Option<Instant>,
}

impl EosMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playing_started(&mut self, now: Instant) {
        self.is_playing = true;
        self.last_frame_at = Some(now);
    }

    pub fn paused(&mut self) {
        self.is_playing = false;
    }

    pub fn frame_decoded(&mut self, now: Instant) {
        self.last_frame_at = Some(now);
    }

    /// Flags end of stream when playing and no frame arrived within [`EOS_TIMEOUT`].
    ///
    /// Returns true only on the transition into `at_eos`.
    pub fn check(&mut self, now: Instant) -> bool {
        if !self.is_playing {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return false;
        };
        if now.saturating_duration_since(last_frame_at) <= EOS_TIMEOUT {
            return false;
        }

        self.is_playing = false;
        self.at_eos = true;
        true
    }

    pub fn clear_eos(&mut self) {
        self.at_eos = false;
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn at_eos(&self) -> bool {
        self.at_eos
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::EosMonitor;

    #[test]
    fn stall_past_timeout_marks_eos() {
        let t0 = Instant::now();
        let mut monitor = EosMonitor::new();
        monitor.playing_started(t0);

        assert!(!monitor.check(t0 + Duration::from_millis(400)));
        assert!(monitor.check(t0 + Duration::from_millis(401)));
        assert!(monitor.at_eos());
        assert!(!monitor.is_playing());
    }

    #[test]
    fn decoded_frames_reset_the_timer() {
        let t0 = Instant::now();
        let mut monitor = EosMonitor::new();
        monitor.playing_started(t0);
        monitor.frame_decoded(t0 + Duration::from_millis(300));

        assert!(!monitor.check(t0 + Duration::from_millis(600)));
        assert!(!monitor.at_eos());
    }

    #[test]
    fn paused_sessions_never_stall() {
        let t0 = Instant::now();
        let mut monitor = EosMonitor::new();
        monitor.playing_started(t0);
        monitor.paused();

        assert!(!monitor.check(t0 + Duration::from_secs(5)));
        assert!(!monitor.at_eos());
    }
}
