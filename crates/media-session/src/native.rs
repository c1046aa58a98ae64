use crate::media::MediaSource;

/// Output of one native decode step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeOutput {
    Frame { timestamp_ms: f64 },
    EndOfStream,
    Idle,
}

/// In-process stand-in for the platform decoder.
///
/// It produces frames at the media frame rate while running and reports
/// end of stream once the read position passes the media duration. It has
/// no notion of intentional stops, which is what [`crate::EosGuard`] adds.
#[derive(Debug)]
pub struct NativeDecoder {
    source: Option<MediaSource>,
    next_frame: i64,
    running: bool,
    eos_listeners: usize,
    module_ready: bool,
}

impl Default for NativeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDecoder {
    pub fn new() -> Self {
        Self {
            source: None,
            next_frame: 0,
            running: false,
            eos_listeners: 0,
            module_ready: true,
        }
    }

    /// Loads a source and rewinds to its first frame.
    pub fn load(&mut self, source: MediaSource) {
        self.source = Some(source);
        self.next_frame = 0;
        self.running = false;
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    pub fn run(&mut self) {
        self.running = true;
    }

    pub fn halt(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Moves the read position to the first frame at or after `time_ms`.
    pub fn seek_to(&mut self, time_ms: f64) {
        if let Some(source) = &self.source {
            self.next_frame = source.frame_index_at(time_ms);
        }
    }

    /// Timestamp of the next frame the decoder would emit.
    pub fn position_ms(&self) -> f64 {
        self.source
            .as_ref()
            .map(|source| source.frame_time_ms(self.next_frame))
            .unwrap_or(0.0)
    }

    pub fn attach_eos_listener(&mut self) {
        self.eos_listeners += 1;
    }

    pub fn detach_eos_listener(&mut self) {
        self.eos_listeners = self.eos_listeners.saturating_sub(1);
    }

    pub fn eos_listener_count(&self) -> usize {
        self.eos_listeners
    }

    pub fn is_module_ready(&self) -> bool {
        self.module_ready
    }

    pub fn set_module_ready(&mut self, ready: bool) {
        self.module_ready = ready;
    }

    /// Advances the decoder by one frame.
    pub fn step(&mut self) -> NativeOutput {
        if !self.running {
            return NativeOutput::Idle;
        }
        let Some(source) = &self.source else {
            return NativeOutput::Idle;
        };

        let timestamp_ms = source.frame_time_ms(self.next_frame);
        if source.duration_ms > 0.0 && timestamp_ms >= source.duration_ms {
            self.running = false;
            return NativeOutput::EndOfStream;
        }

        self.next_frame += 1;
        NativeOutput::Frame { timestamp_ms }
    }

    /// Frame timestamps in `[start_ms, end_ms)` without touching the read position.
    pub fn frames_in_range(&self, start_ms: f64, end_ms: f64) -> Vec<f64> {
        let Some(source) = &self.source else {
            return Vec::new();
        };
        let limit_ms = if source.duration_ms > 0.0 {
            end_ms.min(source.duration_ms)
        } else {
            end_ms
        };
        if !source.has_valid_frame_rate() || !limit_ms.is_finite() {
            return Vec::new();
        }

        let mut index = source.frame_index_at(start_ms);
        let mut timestamps = Vec::new();
        loop {
            let timestamp_ms = source.frame_time_ms(index);
            if timestamp_ms >= limit_ms {
                break;
            }
            timestamps.push(timestamp_ms);
            index += 1;
        }
        timestamps
    }
}
