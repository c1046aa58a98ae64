use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::SharedFrameCache;
use crate::session::DecodeSession;

/// Source range of one media resource to pre-fill.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferRequest {
    pub media_id: String,
    pub start_ms: f64,
    pub end_ms: f64,
}

/// Outcome of [`ensure_buffered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferReport {
    /// Frames of the range present in the cache when the wait ended.
    pub cached_frames: usize,
    pub expected_frames: usize,
    pub timed_out: bool,
}

impl BufferReport {
    pub fn is_complete(&self) -> bool {
        !self.timed_out && self.cached_frames >= self.expected_frames
    }
}

/// Decodes `request` into `cache`, waiting at most `timeout`.
///
/// On timeout the decode keeps running and fills the cache later; only the
/// caller's wait is cut short.
pub async fn ensure_buffered<S: DecodeSession>(
    session: Arc<S>,
    cache: &SharedFrameCache,
    request: &BufferRequest,
    timeout: Duration,
) -> BufferReport {
    let (start_ms, end_ms) = (request.start_ms, request.end_ms);
    let decode = tokio::spawn(async move { session.burst_decode(start_ms, end_ms).await });

    let timed_out = match tokio::time::timeout(timeout, decode).await {
        Ok(Ok(true)) => false,
        Ok(Ok(false)) => {
            debug!(media_id = %request.media_id, start_ms, end_ms, "pre-fill decode failed");
            false
        }
        Ok(Err(error)) => {
            debug!(media_id = %request.media_id, %error, "pre-fill task ended abnormally");
            false
        }
        Err(_) => {
            debug!(
                media_id = %request.media_id,
                timeout_ms = timeout.as_millis() as u64,
                "pre-fill wait timed out"
            );
            true
        }
    };

    let (cached_frames, expected_frames) = count_cached(cache, request);
    BufferReport {
        cached_frames,
        expected_frames,
        timed_out,
    }
}

fn count_cached(cache: &SharedFrameCache, request: &BufferRequest) -> (usize, usize) {
    let cache = cache.lock();
    let frame_ms = cache.frame_ms();
    let mut expected = 0;
    let mut cached = 0;
    let mut at_ms = request.start_ms;
    while at_ms < request.end_ms - frame_ms * 1e-6 {
        expected += 1;
        if cache.contains(&request.media_id, at_ms) {
            cached += 1;
        }
        at_ms = request.start_ms + expected as f64 * frame_ms;
    }
    (cached, expected)
}
