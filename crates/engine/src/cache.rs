use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use media_session::DecodedFrame;
use parking_lot::Mutex;

/// Frame cache shared between sessions, the pre-cache sampler and the renderer.
pub type SharedFrameCache = Arc<Mutex<FrameCache>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FrameCacheKey {
    media_id: String,
    bucket: i64,
}

/// LRU cache for decoded frames bucketed by source time.
///
/// A bucket is one frame: timestamps snap to the nearest multiple of
/// `frame_ms`.
///
/// # Example
/// ```
/// use engine::cache::FrameCache;
/// use media_session::DecodedFrame;
///
/// let mut cache = FrameCache::new(8, 1_000.0 / 30.0);
/// cache.insert(DecodedFrame {
///     media_id: "demo".into(),
///     timestamp_ms: 1_500.0,
/// });
///
/// assert!(cache.contains("demo", 1_500.3));
/// ```
#[derive(Debug)]
pub struct FrameCache {
    capacity: usize,
    frame_ms: f64,
    entries: HashMap<FrameCacheKey, DecodedFrame>,
    lru_order: VecDeque<FrameCacheKey>,
}

impl FrameCache {
    /// Creates a frame cache.
    ///
    /// `capacity` and `frame_ms` must be positive.
    pub fn new(capacity: usize, frame_ms: f64) -> Self {
        assert!(capacity > 0, "frame cache capacity must be positive");
        assert!(frame_ms > 0.0, "frame cache bucket size must be positive");
        Self {
            capacity,
            frame_ms,
            entries: HashMap::new(),
            lru_order: VecDeque::new(),
        }
    }

    /// Wraps a new cache for sharing.
    pub fn shared(capacity: usize, frame_ms: f64) -> SharedFrameCache {
        Arc::new(Mutex::new(Self::new(capacity, frame_ms)))
    }

    /// Clears all cached frames.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru_order.clear();
    }

    /// Changes the bucket size and drops every frame bucketed with the old one.
    pub fn reconfigure_frame_ms(&mut self, frame_ms: f64) {
        assert!(frame_ms > 0.0, "frame cache bucket size must be positive");
        if frame_ms != self.frame_ms {
            self.frame_ms = frame_ms;
            self.clear();
        }
    }

    /// Returns the bucket size in milliseconds.
    pub fn frame_ms(&self) -> f64 {
        self.frame_ms
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when a frame for the same bucket already exists.
    pub fn contains(&self, media_id: &str, source_ms: f64) -> bool {
        let key = self.make_key(media_id, source_ms);
        self.entries.contains_key(&key)
    }

    /// Returns one cached frame and marks it as recently used.
    pub fn get(&mut self, media_id: &str, source_ms: f64) -> Option<DecodedFrame> {
        let key = self.make_key(media_id, source_ms);
        let frame = self.entries.get(&key)?.clone();
        self.touch(&key);
        Some(frame)
    }

    /// Inserts or updates one cached frame.
    pub fn insert(&mut self, frame: DecodedFrame) {
        let key = self.make_key(&frame.media_id, frame.timestamp_ms);
        self.entries.insert(key.clone(), frame);
        self.touch(&key);
        self.evict_if_needed();
    }

    fn make_key(&self, media_id: &str, source_ms: f64) -> FrameCacheKey {
        FrameCacheKey {
            media_id: media_id.to_string(),
            bucket: (source_ms.max(0.0) / self.frame_ms).round() as i64,
        }
    }

    fn touch(&mut self, key: &FrameCacheKey) {
        if let Some(index) = self.lru_order.iter().position(|existing| existing == key) {
            let _ = self.lru_order.remove(index);
        }
        self.lru_order.push_back(key.clone());
    }

    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.lru_order.pop_front() else {
                break;
            };
            let _ = self.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use media_session::DecodedFrame;

    use super::FrameCache;

    const FRAME_MS: f64 = 1_000.0 / 30.0;

    #[test]
    fn lookups_hit_within_the_same_frame() {
        let mut cache = FrameCache::new(8, FRAME_MS);
        cache.insert(frame("demo", 1_500.0));

        let hit = cache.get("demo", 1_500.3).expect("frame should be cached");
        assert_eq!(hit.timestamp_ms, 1_500.0);
        assert!(!cache.contains("other", 1_500.0));
    }

    #[test]
    fn media_frame_times_match_timeline_frame_times() {
        let mut cache = FrameCache::new(8, 1_000.0 / 29.97);
        let frame_ms = 1_000.0 / 29.97;
        cache.insert(frame("demo", 3.0 * frame_ms));

        assert!(cache.contains("demo", 3.0 / 29.97 * 1_000.0));
        assert!(!cache.contains("demo", 4.0 / 29.97 * 1_000.0));
    }

    #[test]
    fn insert_evicts_least_recently_used_frame_when_capacity_is_reached() {
        let mut cache = FrameCache::new(2, FRAME_MS);
        cache.insert(frame("demo", 1_000.0));
        cache.insert(frame("demo", 2_000.0));

        let _ = cache.get("demo", 1_000.0).expect("first frame should exist");
        cache.insert(frame("demo", 3_000.0));

        assert!(cache.get("demo", 1_000.0).is_some());
        assert!(cache.get("demo", 2_000.0).is_none());
        assert!(cache.get("demo", 3_000.0).is_some());
    }

    #[test]
    fn reconfigure_drops_frames_bucketed_at_the_old_rate() {
        let mut cache = FrameCache::new(8, FRAME_MS);
        cache.insert(frame("demo", 0.0));

        cache.reconfigure_frame_ms(FRAME_MS);
        assert_eq!(cache.len(), 1);

        cache.reconfigure_frame_ms(40.0);
        assert!(cache.is_empty());
    }

    fn frame(media_id: &str, timestamp_ms: f64) -> DecodedFrame {
        DecodedFrame {
            media_id: media_id.into(),
            timestamp_ms,
        }
    }
}
