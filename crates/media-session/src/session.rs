use std::fmt::{Debug, Formatter};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::eos::EosGuard;
use crate::error::{Result, SessionError};
use crate::media::{DecodedFrame, MediaSource};
use crate::monitor::EosMonitor;
use crate::native::{NativeDecoder, NativeOutput};
use crate::throttle::{clamp_seek_ms, should_throttle};

/// Called once when the playhead reaches the configured range end, with
/// `(frame_ms, clip_end_ms)`.
///
/// Invoked while the session is locked; it must not call back into the session.
pub type ClipEndCallback = Box<dyn Fn(f64, f64) + Send + Sync>;

const BURST_YIELD_EVERY: usize = 8;

struct Bounds {
    start_ms: f64,
    end_ms: f64,
    on_clip_end: Option<ClipEndCallback>,
    end_reached: bool,
}

struct SessionState {
    native: NativeDecoder,
    eos: EosGuard,
    monitor: EosMonitor,
    bounds: Option<Bounds>,
    active: bool,
    destroyed: bool,
}

/// One decode session bound to a single media resource.
///
/// Wraps the native decoder with the end-of-stream guard, the timeout
/// monitor and the duration throttle, and adds bounded playback with a
/// clip-end callback.
///
/// # Example
/// ```
/// use std::time::Instant;
///
/// use media_session::{DecoderSession, MediaSource};
///
/// let session = DecoderSession::new("a");
/// session
///     .open(MediaSource {
///         media_id: "a".into(),
///         path: "a.mp4".into(),
///         duration_ms: 2_000.0,
///         frame_rate: 25.0,
///     })
///     .expect("open");
/// session.play(1.0).expect("play");
///
/// let frame = session.pump(Instant::now()).expect("frame");
/// assert_eq!(frame.timestamp_ms, 1_000.0);
/// ```
pub struct DecoderSession {
    media_id: String,
    state: Mutex<SessionState>,
}

impl Debug for DecoderSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DecoderSession")
            .field("media_id", &self.media_id)
            .field("active", &state.active)
            .field("stopping", &state.eos.is_stopping())
            .field("at_eos", &state.monitor.at_eos())
            .finish()
    }
}

impl DecoderSession {
    pub fn new(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            state: Mutex::new(SessionState {
                native: NativeDecoder::new(),
                eos: EosGuard::new(),
                monitor: EosMonitor::new(),
                bounds: None,
                active: false,
                destroyed: false,
            }),
        }
    }

    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    /// Opens `source`, stopping whatever was loaded before.
    pub fn open(&self, source: MediaSource) -> Result<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(self.closed());
        }
        if !source.has_valid_frame_rate() {
            return Err(SessionError::InvalidFrameRate {
                media_id: source.media_id,
                frame_rate: source.frame_rate,
            });
        }

        let had_media = state.native.source().is_some();
        if had_media {
            state.native.halt();
            state.monitor.paused();
            state.active = false;
        }
        state.eos.on_open(had_media);
        state.native.load(source);
        state.bounds = None;
        Ok(())
    }

    /// Sets the bounded playback range and the optional clip-end callback.
    pub fn configure(
        &self,
        start_ms: f64,
        end_ms: f64,
        on_clip_end: Option<ClipEndCallback>,
    ) -> Result<()> {
        if !start_ms.is_finite() || !end_ms.is_finite() || end_ms < start_ms {
            return Err(SessionError::InvalidRange { start_ms, end_ms });
        }

        let mut state = self.state.lock();
        state.bounds = Some(Bounds {
            start_ms,
            end_ms,
            on_clip_end,
            end_reached: false,
        });
        Ok(())
    }

    pub fn clear_bounds(&self) {
        self.state.lock().bounds = None;
    }

    /// Configured `(start_ms, end_ms)` range, if any.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.state
            .lock()
            .bounds
            .as_ref()
            .map(|bounds| (bounds.start_ms, bounds.end_ms))
    }

    /// Starts playback at `source_time_seconds`. The only call that re-arms
    /// the end-of-stream gate.
    pub fn play(&self, source_time_seconds: f64) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.ensure_loaded(state)?;
        if state.monitor.at_eos() {
            self.reopen(state)?;
        }

        let duration_ms = state
            .native
            .source()
            .map(|source| source.duration_ms)
            .unwrap_or(0.0);
        let target_ms = clamp_seek_ms(source_time_seconds * 1_000.0, duration_ms);
        state.native.seek_to(target_ms);
        state.eos.register(&mut state.native);
        state.eos.arm();
        state.native.run();
        state.monitor.playing_started(Instant::now());
        state.active = true;
        if let Some(bounds) = state.bounds.as_mut() {
            bounds.end_reached = false;
        }

        debug!(media_id = %self.media_id, target_ms, "session playing");
        Ok(())
    }

    /// Halts playback. Safe to call any number of times.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.eos.disarm();
        state.native.halt();
        state.monitor.paused();
        state.active = false;
    }

    /// Moves to `source_time_seconds` without changing the running state.
    ///
    /// A session flagged at end of stream is recovered first.
    pub fn seek(&self, source_time_seconds: f64) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.ensure_loaded(state)?;
        if state.monitor.at_eos() {
            self.reopen(state)?;
        }

        let duration_ms = state
            .native
            .source()
            .map(|source| source.duration_ms)
            .unwrap_or(0.0);
        let target_ms = clamp_seek_ms(source_time_seconds * 1_000.0, duration_ms);
        state.native.seek_to(target_ms);
        if let Some(bounds) = state.bounds.as_mut() {
            bounds.end_reached = false;
        }
        Ok(())
    }

    /// Drives the native decoder by one step and returns the decoded frame.
    pub fn pump(&self, now: Instant) -> Option<DecodedFrame> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.native.step() {
            NativeOutput::Frame { timestamp_ms } => {
                state.monitor.frame_decoded(now);

                let duration_ms = state
                    .native
                    .source()
                    .map(|source| source.duration_ms)
                    .unwrap_or(0.0);
                if should_throttle(timestamp_ms, duration_ms, state.native.is_running()) {
                    state.native.halt();
                    state.monitor.paused();
                    debug!(
                        media_id = %self.media_id,
                        timestamp_ms,
                        duration_ms,
                        "paused ahead of media end"
                    );
                }

                if let Some(bounds) = state.bounds.as_mut() {
                    if !bounds.end_reached && timestamp_ms >= bounds.end_ms {
                        bounds.end_reached = true;
                        if let Some(on_clip_end) = &bounds.on_clip_end {
                            on_clip_end(timestamp_ms, bounds.end_ms);
                        }
                    }
                }

                Some(DecodedFrame {
                    media_id: self.media_id.clone(),
                    timestamp_ms,
                })
            }
            NativeOutput::EndOfStream => {
                self.handle_native_eos(state);
                None
            }
            NativeOutput::Idle => None,
        }
    }

    /// Delivers a native end-of-stream signal, as the platform decoder does
    /// asynchronously. Returns true when the signal was acted on.
    pub fn signal_native_eos(&self) -> bool {
        let mut guard = self.state.lock();
        self.handle_native_eos(&mut guard)
    }

    /// Runs timeout-based end-of-stream detection. Returns true when the
    /// session just transitioned to end of stream.
    pub fn poll_stall(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if !state.monitor.check(now) {
            return false;
        }
        warn!(media_id = %self.media_id, "no frame within eos timeout, marking end of stream");
        true
    }

    /// Stops and reopens the same media after a detected end of stream.
    pub fn recover_from_eos(&self) -> Result<()> {
        let mut guard = self.state.lock();
        self.reopen(&mut guard)
    }

    /// Tears the session down for good.
    pub fn destroy(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.eos.release(&mut state.native);
        state.native.halt();
        state.monitor.paused();
        state.bounds = None;
        state.active = false;
        state.destroyed = true;
    }

    /// Decodes `[start_ms, end_ms)` without disturbing playback.
    pub async fn burst_decode(&self, start_ms: f64, end_ms: f64) -> Result<Vec<DecodedFrame>> {
        if !start_ms.is_finite() || !end_ms.is_finite() || end_ms < start_ms {
            return Err(SessionError::InvalidRange { start_ms, end_ms });
        }

        let timestamps = {
            let mut guard = self.state.lock();
            self.ensure_loaded(&mut guard)?;
            guard.native.frames_in_range(start_ms, end_ms)
        };

        let mut frames = Vec::with_capacity(timestamps.len());
        for (index, timestamp_ms) in timestamps.into_iter().enumerate() {
            if index > 0 && index % BURST_YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
            frames.push(DecodedFrame {
                media_id: self.media_id.clone(),
                timestamp_ms,
            });
        }
        Ok(frames)
    }

    /// True between `play` and the next `stop`.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().native.is_running()
    }

    pub fn is_stopping(&self) -> bool {
        self.state.lock().eos.is_stopping()
    }

    pub fn is_eos_guarded(&self) -> bool {
        self.state.lock().eos.is_guarded()
    }

    pub fn eos_listener_count(&self) -> usize {
        self.state.lock().native.eos_listener_count()
    }

    /// Number of native end-of-stream signals acted on.
    pub fn eos_seek_backs(&self) -> u64 {
        self.state.lock().eos.admitted()
    }

    pub fn at_eos(&self) -> bool {
        self.state.lock().monitor.at_eos()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().monitor.is_playing()
    }

    pub fn position_ms(&self) -> f64 {
        self.state.lock().native.position_ms()
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.state.lock().native.source().cloned()
    }

    pub fn set_module_ready(&self, ready: bool) {
        self.state.lock().native.set_module_ready(ready);
    }

    fn ensure_loaded(&self, state: &mut SessionState) -> Result<()> {
        if state.destroyed {
            return Err(self.closed());
        }
        if state.native.source().is_none() {
            return Err(SessionError::NoMediaLoaded {
                media_id: self.media_id.clone(),
            });
        }
        Ok(())
    }

    fn reopen(&self, state: &mut SessionState) -> Result<()> {
        if !state.monitor.at_eos() {
            return Err(SessionError::NotAtEos {
                media_id: self.media_id.clone(),
            });
        }
        if state.destroyed {
            return Err(self.closed());
        }
        let Some(source) = state.native.source().cloned() else {
            return Err(SessionError::MissingSource {
                media_id: self.media_id.clone(),
            });
        };
        if !state.native.is_module_ready() {
            warn!(media_id = %self.media_id, "eos recovery skipped: decode module not ready");
            return Err(SessionError::ModuleNotReady {
                media_id: self.media_id.clone(),
            });
        }

        state.monitor.clear_eos();
        state.eos.disarm();
        state.native.halt();
        state.active = false;
        state.eos.on_open(true);
        state.native.load(source);

        debug!(media_id = %self.media_id, "session reopened after end of stream");
        Ok(())
    }

    fn handle_native_eos(&self, state: &mut SessionState) -> bool {
        if state.native.eos_listener_count() == 0 {
            return false;
        }

        let SessionState {
            native,
            eos,
            monitor,
            ..
        } = state;
        let handled = eos.admit(|| {
            let duration_ms = native
                .source()
                .map(|source| source.duration_ms)
                .unwrap_or(0.0);
            native.halt();
            native.seek_to(clamp_seek_ms(duration_ms, duration_ms));
            monitor.paused();
        });

        match handled {
            Some(()) => {
                debug!(media_id = %self.media_id, "end of stream, seeked back from media end");
                true
            }
            None => {
                debug!(media_id = %self.media_id, "end of stream ignored while stopping");
                false
            }
        }
    }

    fn closed(&self) -> SessionError {
        SessionError::SessionClosed {
            media_id: self.media_id.clone(),
        }
    }
}
