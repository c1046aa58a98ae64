use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use media_session::{DecodedFrame, DecoderSession, MediaSource};
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::SharedFrameCache;
use crate::error::{EngineError, Result};
use crate::timeline::MediaId;

pub use media_session::ClipEndCallback;

/// Decode operations the stream controller drives.
///
/// Implementations swallow their own failures: a failed call degrades
/// playback for that clip, it never reaches the scheduler.
pub trait DecodeSession: Send + Sync + 'static {
    /// Sets the bounded source range and registers or clears the clip-end callback.
    fn configure(
        &self,
        source_start_ms: f64,
        source_end_ms: f64,
        on_clip_end: Option<ClipEndCallback>,
    );

    /// Begins or resumes playback at `source_time_seconds`.
    fn start(&self, source_time_seconds: f64);

    /// Halts playback. Safe to call multiple times.
    fn stop(&self);

    /// Jumps to `source_time_seconds` without playing.
    fn seek(&self, source_time_seconds: f64);

    /// Decodes `[start_ms, end_ms)` into the frame cache. Resolves to false on failure.
    fn burst_decode(&self, start_ms: f64, end_ms: f64) -> impl Future<Output = bool> + Send;

    /// True between `start` and the next `stop`.
    fn is_active(&self) -> bool;
}

/// Looks up or creates the decode session for a media resource.
pub trait SessionResolver: Send + Sync + 'static {
    type Session: DecodeSession;

    /// Resolves to `None` when the resource is not warmed up yet.
    fn resolve_session(
        &self,
        media_id: &str,
    ) -> impl Future<Output = Option<Arc<Self::Session>>> + Send;
}

/// [`DecoderSession`] feeding a shared frame cache.
#[derive(Debug)]
pub struct PooledSession {
    decoder: DecoderSession,
    cache: SharedFrameCache,
}

impl PooledSession {
    pub fn decoder(&self) -> &DecoderSession {
        &self.decoder
    }

    /// Drives the decoder by one frame and caches what it produced.
    pub fn pump(&self, now: Instant) -> Option<DecodedFrame> {
        let frame = self.decoder.pump(now)?;
        self.cache.lock().insert(frame.clone());
        Some(frame)
    }
}

impl DecodeSession for PooledSession {
    fn configure(
        &self,
        source_start_ms: f64,
        source_end_ms: f64,
        on_clip_end: Option<ClipEndCallback>,
    ) {
        if let Err(error) = self
            .decoder
            .configure(source_start_ms, source_end_ms, on_clip_end)
        {
            debug!(media_id = %self.decoder.media_id(), %error, "configure rejected");
        }
    }

    fn start(&self, source_time_seconds: f64) {
        if let Err(error) = self.decoder.play(source_time_seconds) {
            debug!(media_id = %self.decoder.media_id(), %error, "start failed");
        }
    }

    /// Halts the decoder and drops the clip range with its callback.
    fn stop(&self) {
        self.decoder.stop();
        self.decoder.clear_bounds();
    }

    fn seek(&self, source_time_seconds: f64) {
        if let Err(error) = self.decoder.seek(source_time_seconds) {
            debug!(media_id = %self.decoder.media_id(), %error, "seek failed");
        }
    }

    async fn burst_decode(&self, start_ms: f64, end_ms: f64) -> bool {
        match self.decoder.burst_decode(start_ms, end_ms).await {
            Ok(frames) => {
                let mut cache = self.cache.lock();
                for frame in frames {
                    cache.insert(frame);
                }
                true
            }
            Err(error) => {
                debug!(media_id = %self.decoder.media_id(), %error, "burst decode failed");
                false
            }
        }
    }

    fn is_active(&self) -> bool {
        self.decoder.is_active()
    }
}

#[derive(Debug)]
struct PoolEntry {
    source: MediaSource,
    session: Option<Arc<PooledSession>>,
}

/// Session resolver over registered media, one session per media id.
///
/// Media resolves only after [`warm`](Self::warm) opened its session.
///
/// # Example
/// ```
/// use engine::cache::FrameCache;
/// use engine::session::SessionPool;
/// use media_session::MediaSource;
///
/// let pool = SessionPool::new(FrameCache::shared(64, 40.0));
/// pool.register_media(MediaSource {
///     media_id: "m".into(),
///     path: "m.mp4".into(),
///     duration_ms: 5_000.0,
///     frame_rate: 25.0,
/// });
/// assert!(!pool.is_warm("m"));
///
/// pool.warm("m").expect("warm");
/// assert!(pool.is_warm("m"));
/// ```
#[derive(Debug)]
pub struct SessionPool {
    media: Mutex<HashMap<MediaId, PoolEntry>>,
    cache: SharedFrameCache,
}

impl SessionPool {
    pub fn new(cache: SharedFrameCache) -> Self {
        Self {
            media: Mutex::new(HashMap::new()),
            cache,
        }
    }

    pub fn cache(&self) -> &SharedFrameCache {
        &self.cache
    }

    /// Registers or replaces a media resource. Replacing destroys its session.
    pub fn register_media(&self, source: MediaSource) {
        let media_id = source.media_id.clone();
        let previous = self.media.lock().insert(
            media_id,
            PoolEntry {
                source,
                session: None,
            },
        );
        if let Some(session) = previous.and_then(|entry| entry.session) {
            session.decoder.destroy();
        }
    }

    /// Opens the session for `media_id` so it starts resolving.
    pub fn warm(&self, media_id: &str) -> Result<Arc<PooledSession>> {
        let mut media = self.media.lock();
        let entry = media
            .get_mut(media_id)
            .ok_or_else(|| EngineError::UnknownMedia {
                media_id: media_id.to_string(),
            })?;
        if let Some(session) = &entry.session {
            return Ok(Arc::clone(session));
        }

        let decoder = DecoderSession::new(media_id);
        decoder.open(entry.source.clone())?;
        let session = Arc::new(PooledSession {
            decoder,
            cache: Arc::clone(&self.cache),
        });
        entry.session = Some(Arc::clone(&session));
        debug!(media_id, "session warmed");
        Ok(session)
    }

    /// Warms every registered media resource.
    pub fn warm_all(&self) -> Result<()> {
        let media_ids: Vec<MediaId> = self.media.lock().keys().cloned().collect();
        for media_id in media_ids {
            self.warm(&media_id)?;
        }
        Ok(())
    }

    pub fn is_warm(&self, media_id: &str) -> bool {
        self.media
            .lock()
            .get(media_id)
            .is_some_and(|entry| entry.session.is_some())
    }

    /// All open sessions, for driving their decoders.
    pub fn sessions(&self) -> Vec<Arc<PooledSession>> {
        self.media
            .lock()
            .values()
            .filter_map(|entry| entry.session.clone())
            .collect()
    }
}

impl SessionResolver for SessionPool {
    type Session = PooledSession;

    async fn resolve_session(&self, media_id: &str) -> Option<Arc<PooledSession>> {
        tokio::task::yield_now().await;
        self.media
            .lock()
            .get(media_id)
            .and_then(|entry| entry.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use media_session::MediaSource;

    use super::{DecodeSession, SessionPool, SessionResolver};
    use crate::cache::FrameCache;
    use crate::error::EngineError;

    fn pool() -> SessionPool {
        let pool = SessionPool::new(FrameCache::shared(64, 100.0));
        pool.register_media(MediaSource {
            media_id: "m".into(),
            path: "m.mp4".into(),
            duration_ms: 2_000.0,
            frame_rate: 10.0,
        });
        pool
    }

    #[tokio::test]
    async fn cold_media_resolves_to_none() {
        let pool = pool();
        assert!(pool.resolve_session("m").await.is_none());
        assert!(pool.resolve_session("unknown").await.is_none());
    }

    #[tokio::test]
    async fn warmed_media_resolves_to_the_same_session() {
        let pool = pool();
        let warmed = pool.warm("m").expect("warm");

        let first = pool.resolve_session("m").await.expect("session");
        let second = pool.resolve_session("m").await.expect("session");

        assert!(std::sync::Arc::ptr_eq(&warmed, &first));
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn warming_unknown_media_fails() {
        assert!(matches!(
            pool().warm("nope"),
            Err(EngineError::UnknownMedia { .. })
        ));
    }

    #[tokio::test]
    async fn burst_decode_fills_the_shared_cache() {
        let pool = pool();
        let session = pool.warm("m").expect("warm");

        assert!(session.burst_decode(0.0, 500.0).await);

        let cache = pool.cache().lock();
        assert_eq!(cache.len(), 5);
        assert!(cache.contains("m", 400.0));
        assert!(!cache.contains("m", 500.0));
    }

    #[test]
    fn stop_drops_the_clip_range_and_callback() {
        let pool = pool();
        let session = pool.warm("m").expect("warm");
        session.configure(1_000.0, 1_200.0, Some(Box::new(|_, _| {})));
        session.start(1.0);
        assert_eq!(session.decoder().bounds(), Some((1_000.0, 1_200.0)));

        session.stop();

        assert_eq!(session.decoder().bounds(), None);
        assert!(!session.is_active());
    }

    #[test]
    fn pumped_frames_land_in_the_cache() {
        let pool = pool();
        let session = pool.warm("m").expect("warm");
        session.start(1.0);

        let frame = session.pump(Instant::now()).expect("frame");

        assert_eq!(frame.timestamp_ms, 1_000.0);
        assert!(pool.cache().lock().contains("m", 1_000.0));
        assert!(session.is_active());
    }
}
