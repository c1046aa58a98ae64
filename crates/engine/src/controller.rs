use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::burst::BurstPool;
use crate::cache::SharedFrameCache;
use crate::config::PlaybackConfig;
use crate::error::Result;
use crate::schedule::{ScheduleEntry, StreamKey, build_schedule};
use crate::session::{ClipEndCallback, DecodeSession, SessionResolver};
use crate::time::{frame_duration_ms, source_seconds_at};
use crate::timeline::{ClipId, MediaId, Sequence, TrackId};

/// Receives the keys of streams whose session reached the clip end.
pub type ClipEndReceiver = mpsc::UnboundedReceiver<StreamKey>;

struct StreamEntry<S> {
    media_id: MediaId,
    /// `None` for placeholders: media claimed by another stream or not warmed up.
    session: Option<Arc<S>>,
    clip_id: ClipId,
    track_id: TrackId,
    activated: bool,
}

struct ControllerState<S> {
    streams: BTreeMap<StreamKey, StreamEntry<S>>,
    generation: u64,
    sequence: Arc<Sequence>,
    playing: bool,
    last_pass_frame: Option<i64>,
    /// Latest frame reported by start, seek or tick while playing.
    playhead: Option<i64>,
}

impl<S: DecodeSession> ControllerState<S> {
    fn stop_all(&mut self) {
        for (key, entry) in std::mem::take(&mut self.streams) {
            if let Some(session) = entry.session {
                session.stop();
            }
            debug!(stream = %key, "stream torn down");
        }
    }

    fn teardown_all(&mut self) {
        self.stop_all();
        self.generation += 1;
    }

    /// True when a completion captured at `generation` must be discarded.
    fn is_stale(&self, generation: u64, mode: OpenMode) -> bool {
        self.generation != generation || (mode == OpenMode::Play && !self.playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    /// Bounds with a clip-end callback; active clips start playing.
    Play,
    /// Bounds without callback and a direct seek.
    Scrub,
}

enum BurstTarget<S> {
    Session(Arc<S>),
    Resolve,
}

/// Per-stream row of a [`StreamSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub key: String,
    pub track_id: TrackId,
    pub clip_id: ClipId,
    pub media_id: MediaId,
    /// No session: playback for this clip falls back to frame-by-frame decode.
    pub placeholder: bool,
    pub activated: bool,
    pub session_active: bool,
}

/// Immutable view of the controller consumed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub generation: u64,
    pub playing: bool,
    pub streams: Vec<StreamSummary>,
    pub in_flight_bursts: usize,
}

/// Keeps one live decode session per concurrently needed media resource in
/// step with the playhead.
///
/// All methods take `&self`; the stream map is only touched between
/// suspension points. Every session resolution is a cancellation point: a
/// pass whose generation was superseded while it waited writes nothing.
pub struct StreamController<R: SessionResolver> {
    resolver: Arc<R>,
    cache: SharedFrameCache,
    config: PlaybackConfig,
    state: Mutex<ControllerState<R::Session>>,
    bursts: BurstPool,
    clip_end_tx: mpsc::UnboundedSender<StreamKey>,
}

impl<R: SessionResolver> StreamController<R> {
    /// Creates a controller for `sequence`.
    ///
    /// The receiver yields keys of streams whose session hit the clip end;
    /// feed them back through [`on_clip_end_reached`](Self::on_clip_end_reached).
    pub fn new(
        resolver: Arc<R>,
        cache: SharedFrameCache,
        config: PlaybackConfig,
        sequence: Sequence,
    ) -> Result<(Self, ClipEndReceiver)> {
        config.validate()?;
        sequence.validate()?;
        cache
            .lock()
            .reconfigure_frame_ms(frame_duration_ms(sequence.fps));

        let (clip_end_tx, clip_end_rx) = mpsc::unbounded_channel();
        let controller = Self {
            resolver,
            cache,
            config,
            state: Mutex::new(ControllerState {
                streams: BTreeMap::new(),
                generation: 0,
                sequence: Arc::new(sequence),
                playing: false,
                last_pass_frame: None,
                playhead: None,
            }),
            bursts: BurstPool::new(),
            clip_end_tx,
        };
        Ok((controller, clip_end_rx))
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn stream_count(&self) -> usize {
        self.state.lock().streams.len()
    }

    pub fn in_flight_bursts(&self) -> usize {
        self.bursts.len()
    }

    pub fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.state.lock().sequence)
    }

    /// Tears everything down and opens the streams needed at `start_frame`.
    pub async fn start_playback(&self, start_frame: i64) {
        let (generation, sequence) = {
            let mut state = self.state.lock();
            state.teardown_all();
            state.playing = true;
            state.last_pass_frame = Some(start_frame);
            state.playhead = Some(start_frame);
            (state.generation, Arc::clone(&state.sequence))
        };
        debug!(start_frame, generation, "start playback");

        let schedule = build_schedule(
            &sequence.tracks,
            start_frame,
            self.config.lookahead_frames,
            sequence.fps,
        );
        let mut assigned = HashSet::new();
        for entry in &schedule {
            let opened = self
                .open_stream(
                    entry,
                    start_frame,
                    sequence.fps,
                    generation,
                    &mut assigned,
                    OpenMode::Play,
                )
                .await;
            if !opened {
                return;
            }
        }
    }

    /// Reconciles the stream map with the schedule at `current_frame`.
    ///
    /// Evicts streams that left the window, starts pre-rolled streams that
    /// became active exactly once, opens new streams and fires pre-cache
    /// bursts for clips about to start. Placeholders whose media was freed
    /// are reopened with a session. No-op while stopped.
    pub async fn advance_playback(&self, current_frame: i64) {
        let (generation, sequence) = {
            let mut state = self.state.lock();
            if !state.playing {
                return;
            }
            state.last_pass_frame = Some(current_frame);
            state.playhead = Some(current_frame);
            (state.generation, Arc::clone(&state.sequence))
        };
        let fps = sequence.fps;
        let schedule = build_schedule(
            &sequence.tracks,
            current_frame,
            self.config.lookahead_frames,
            fps,
        );

        let (pending, mut assigned) = {
            let mut state = self.state.lock();
            let relevant: HashSet<StreamKey> = schedule.iter().map(ScheduleEntry::key).collect();
            let stale: Vec<StreamKey> = state
                .streams
                .keys()
                .filter(|key| !relevant.contains(*key))
                .cloned()
                .collect();
            for key in stale {
                if let Some(entry) = state.streams.remove(&key) {
                    if let Some(session) = entry.session {
                        session.stop();
                    }
                    debug!(stream = %key, current_frame, "stream left the window");
                }
            }

            let assigned: HashSet<MediaId> = state
                .streams
                .values()
                .filter(|stream| stream.session.is_some())
                .map(|stream| stream.media_id.clone())
                .collect();
            let mut pending = Vec::new();
            for entry in &schedule {
                let key = entry.key();
                let placeholder = match state.streams.get(&key) {
                    None => {
                        pending.push(entry);
                        continue;
                    }
                    Some(stream) => stream.session.is_none(),
                };
                if placeholder {
                    if !assigned.contains(entry.media_id) {
                        state.streams.remove(&key);
                        debug!(
                            stream = %key,
                            media_id = entry.media_id,
                            "placeholder reclaims freed media"
                        );
                        pending.push(entry);
                    }
                    continue;
                }
                let Some(stream) = state.streams.get_mut(&key) else {
                    continue;
                };
                if !entry.is_active || stream.activated {
                    continue;
                }
                if let Some(session) = &stream.session {
                    session.start(source_seconds_at(entry.clip, current_frame, fps));
                    stream.activated = true;
                    debug!(stream = %key, current_frame, "pre-rolled stream promoted");
                }
            }
            (pending, assigned)
        };

        for entry in pending {
            let opened = self
                .open_stream(
                    entry,
                    current_frame,
                    fps,
                    generation,
                    &mut assigned,
                    OpenMode::Play,
                )
                .await;
            if !opened {
                return;
            }
        }

        self.precache_edit_points(&schedule, current_frame, fps, generation)
            .await;
    }

    /// Runs a scheduling pass when the playhead moved at least the
    /// reschedule interval since the last one, or moved backwards.
    ///
    /// Returns true when a pass ran.
    pub async fn tick(&self, frame: i64) -> bool {
        {
            let mut state = self.state.lock();
            if state.playing {
                state.playhead = Some(frame);
            }
        }
        if !self.pass_due(frame) {
            return false;
        }
        self.advance_playback(frame).await;
        true
    }

    pub fn pass_due(&self, frame: i64) -> bool {
        let state = self.state.lock();
        if !state.playing {
            return false;
        }
        match state.last_pass_frame {
            None => true,
            Some(last) => {
                frame < last || frame - last >= self.config.reschedule_interval_frames
            }
        }
    }

    /// Stops and forgets the stream whose session reached its clip end.
    ///
    /// Unknown keys are ignored. Returns true when a stream was removed.
    pub fn on_clip_end_reached(&self, key: &StreamKey) -> bool {
        let removed = self.state.lock().streams.remove(key);
        let Some(entry) = removed else {
            return false;
        };
        if let Some(session) = entry.session {
            session.stop();
        }
        debug!(stream = %key, "clip end reached");
        true
    }

    /// Stops every stream. Does not bump the generation.
    pub fn stop_playback(&self) {
        let mut state = self.state.lock();
        state.stop_all();
        state.playing = false;
        state.last_pass_frame = None;
        state.playhead = None;
        debug!(generation = state.generation, "stop playback");
    }

    /// Moves the playhead to `frame`.
    ///
    /// While playing this is a full restart at `frame`. While paused only
    /// clips active at `frame` are opened, and their sessions seek instead
    /// of playing.
    pub async fn seek_playback(&self, frame: i64) {
        if self.is_playing() {
            self.start_playback(frame).await;
            return;
        }

        let (generation, sequence) = {
            let mut state = self.state.lock();
            state.teardown_all();
            (state.generation, Arc::clone(&state.sequence))
        };
        debug!(frame, generation, "paused seek");

        let schedule = build_schedule(&sequence.tracks, frame, 0, sequence.fps);
        let mut assigned = HashSet::new();
        for entry in schedule.iter().filter(|entry| entry.is_active) {
            let opened = self
                .open_stream(
                    entry,
                    frame,
                    sequence.fps,
                    generation,
                    &mut assigned,
                    OpenMode::Scrub,
                )
                .await;
            if !opened {
                return;
            }
        }
    }

    /// Replaces the sequence after an edit and, if playing, restarts at the
    /// latest ticked frame.
    pub async fn update_sequence(&self, sequence: Sequence) -> Result<()> {
        sequence.validate()?;
        let resume_at = {
            let mut state = self.state.lock();
            self.cache
                .lock()
                .reconfigure_frame_ms(frame_duration_ms(sequence.fps));
            state.sequence = Arc::new(sequence);
            if state.playing {
                state.playhead
            } else {
                None
            }
        };
        debug!(?resume_at, "timeline updated");

        if let Some(frame) = resume_at {
            self.start_playback(frame).await;
        }
        Ok(())
    }

    /// Switches to another sequence: tears everything down, aborts
    /// pre-cache bursts and picks up the new frame rate.
    pub fn activate_sequence(&self, sequence: Sequence) -> Result<()> {
        sequence.validate()?;
        let fps = sequence.fps;
        let mut state = self.state.lock();
        state.teardown_all();
        self.bursts.abort_all();
        self.cache.lock().reconfigure_frame_ms(frame_duration_ms(fps));
        state.sequence = Arc::new(sequence);
        state.last_pass_frame = None;
        state.playhead = None;
        debug!(fps, generation = state.generation, "sequence activated");
        Ok(())
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        let state = self.state.lock();
        let streams = state
            .streams
            .iter()
            .map(|(key, entry)| StreamSummary {
                key: key.to_string(),
                track_id: entry.track_id.clone(),
                clip_id: entry.clip_id.clone(),
                media_id: entry.media_id.clone(),
                placeholder: entry.session.is_none(),
                activated: entry.activated,
                session_active: entry
                    .session
                    .as_ref()
                    .is_some_and(|session| session.is_active()),
            })
            .collect();
        StreamSnapshot {
            generation: state.generation,
            playing: state.playing,
            streams,
            in_flight_bursts: self.bursts.len(),
        }
    }

    /// Creates the stream entry for `entry`. Returns false when the pass was
    /// superseded and must stop.
    async fn open_stream(
        &self,
        entry: &ScheduleEntry<'_>,
        frame: i64,
        fps: f64,
        generation: u64,
        assigned: &mut HashSet<MediaId>,
        mode: OpenMode,
    ) -> bool {
        let key = entry.key();
        let session = if assigned.insert(entry.media_id.to_string()) {
            let resolved = self.resolver.resolve_session(entry.media_id).await;
            if resolved.is_none() {
                debug!(stream = %key, media_id = entry.media_id, "session unavailable");
            }
            resolved
        } else {
            debug!(stream = %key, media_id = entry.media_id, "media already claimed");
            None
        };

        let mut state = self.state.lock();
        if state.is_stale(generation, mode) {
            debug!(stream = %key, generation, live = state.generation, "stale completion discarded");
            return false;
        }
        if state.streams.contains_key(&key) {
            return true;
        }

        let mut activated = false;
        if let Some(session) = &session {
            let source_seconds = source_seconds_at(entry.clip, frame, fps);
            match mode {
                OpenMode::Play => {
                    session.configure(
                        entry.source_start_ms,
                        entry.source_end_ms,
                        Some(self.clip_end_callback(key.clone())),
                    );
                    if entry.is_active {
                        session.start(source_seconds);
                        activated = true;
                    }
                }
                OpenMode::Scrub => {
                    session.configure(entry.source_start_ms, entry.source_end_ms, None);
                    session.seek(source_seconds);
                }
            }
        }

        debug!(stream = %key, activated, placeholder = session.is_none(), "stream opened");
        state.streams.insert(
            key,
            StreamEntry {
                media_id: entry.media_id.to_string(),
                session,
                clip_id: entry.clip_id.to_string(),
                track_id: entry.track_id.to_string(),
                activated,
            },
        );
        true
    }

    fn clip_end_callback(&self, key: StreamKey) -> ClipEndCallback {
        let tx = self.clip_end_tx.clone();
        Box::new(move |frame_ms, clip_end_ms| {
            debug!(stream = %key, frame_ms, clip_end_ms, "session reported clip end");
            let _ = tx.send(key.clone());
        })
    }

    /// Bursts the head of clips about to start unless their first frames
    /// are already cached.
    async fn precache_edit_points(
        &self,
        schedule: &[ScheduleEntry<'_>],
        current_frame: i64,
        fps: f64,
        generation: u64,
    ) {
        let frame_ms = frame_duration_ms(fps);
        let candidates = schedule.iter().filter(|entry| {
            entry.needs_preroll
                && entry.clip.start_frame - current_frame <= self.config.precache_trigger_frames
        });

        for entry in candidates {
            let key = entry.key();
            let burst_end_ms =
                (entry.source_start_ms + self.config.precache_burst_ms).min(entry.source_end_ms);
            if burst_end_ms <= entry.source_start_ms || self.bursts.contains(&key) {
                continue;
            }

            let target = {
                let state = self.state.lock();
                if state.is_stale(generation, OpenMode::Play) {
                    return;
                }
                match state.streams.get(&key).and_then(|stream| stream.session.as_ref()) {
                    Some(session) if session.is_active() => continue,
                    Some(session) => BurstTarget::Session(Arc::clone(session)),
                    None => {
                        let claimed = state.streams.values().any(|stream| {
                            stream.media_id == entry.media_id && stream.session.is_some()
                        });
                        if claimed {
                            continue;
                        }
                        BurstTarget::Resolve
                    }
                }
            };

            if self.head_is_cached(entry, frame_ms) {
                continue;
            }

            let session = match target {
                BurstTarget::Session(session) => session,
                BurstTarget::Resolve => {
                    let resolved = self.resolver.resolve_session(entry.media_id).await;
                    if self.state.lock().is_stale(generation, OpenMode::Play) {
                        return;
                    }
                    match resolved {
                        Some(session) => session,
                        None => continue,
                    }
                }
            };

            let _ = self
                .bursts
                .spawn(key, session, entry.source_start_ms, burst_end_ms);
        }
    }

    fn head_is_cached(&self, entry: &ScheduleEntry<'_>, frame_ms: f64) -> bool {
        let cache = self.cache.lock();
        (0..self.config.precache_sample_frames).all(|index| {
            let at_ms = entry.source_start_ms + index as f64 * frame_ms;
            at_ms >= entry.source_end_ms || cache.contains(entry.media_id, at_ms)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::StreamController;
    use crate::cache::FrameCache;
    use crate::config::PlaybackConfig;
    use crate::error::EngineError;
    use crate::session::SessionPool;
    use crate::timeline::Sequence;

    fn controller() -> StreamController<SessionPool> {
        let cache = FrameCache::shared(16, 40.0);
        let pool = Arc::new(SessionPool::new(Arc::clone(&cache)));
        let (controller, _clip_ends) = StreamController::new(
            pool,
            cache,
            PlaybackConfig::default(),
            Sequence::empty(25.0),
        )
        .expect("controller");
        controller
    }

    #[tokio::test]
    async fn passes_are_due_every_interval_or_after_rewind() {
        let controller = controller();
        assert!(!controller.pass_due(0));

        controller.start_playback(10).await;
        assert!(!controller.pass_due(14));
        assert!(controller.pass_due(15));
        assert!(controller.pass_due(9));

        assert!(controller.tick(15).await);
        assert!(!controller.tick(16).await);
    }

    #[tokio::test]
    async fn stop_keeps_the_generation_and_start_bumps_it() {
        let controller = controller();
        controller.start_playback(0).await;
        assert_eq!(controller.generation(), 1);

        controller.stop_playback();
        assert_eq!(controller.generation(), 1);
        assert!(!controller.is_playing());

        controller.seek_playback(5).await;
        assert_eq!(controller.generation(), 2);
        assert!(!controller.is_playing());
    }

    #[test]
    fn new_rejects_an_invalid_config() {
        let cache = FrameCache::shared(16, 40.0);
        let pool = Arc::new(SessionPool::new(Arc::clone(&cache)));
        let config = PlaybackConfig {
            reschedule_interval_frames: 0,
            ..PlaybackConfig::default()
        };

        let result = StreamController::new(pool, cache, config, Sequence::empty(25.0));

        assert!(matches!(
            result,
            Err(EngineError::InvalidConfig {
                field: "rescheduleIntervalFrames",
                ..
            })
        ));
    }

    #[test]
    fn activate_sequence_refreshes_the_cache_frame_size() {
        let cache = FrameCache::shared(16, 40.0);
        let pool = Arc::new(SessionPool::new(Arc::clone(&cache)));
        let (controller, _clip_ends) = StreamController::new(
            pool,
            Arc::clone(&cache),
            PlaybackConfig::default(),
            Sequence::empty(25.0),
        )
        .expect("controller");

        controller
            .activate_sequence(Sequence::empty(50.0))
            .expect("valid sequence");

        assert_eq!(cache.lock().frame_ms(), 20.0);
        assert_eq!(controller.generation(), 1);
        assert!(controller.activate_sequence(Sequence::empty(0.0)).is_err());
    }
}
