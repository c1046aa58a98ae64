use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tunables for the stream controller and frame pre-fill.
///
/// Every field falls back to its default when missing from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Frames ahead of the playhead that get pre-rolled.
    pub lookahead_frames: i64,
    /// Minimum playhead distance between two scheduling passes while playing.
    pub reschedule_interval_frames: i64,
    /// Pre-roll clips starting within this many frames get a pre-cache burst.
    pub precache_trigger_frames: i64,
    /// Leading source frames sampled in the frame cache before bursting.
    pub precache_sample_frames: i64,
    pub precache_burst_ms: f64,
    pub frame_cache_capacity: usize,
    pub prefill_timeout_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lookahead_frames: 60,
            reschedule_interval_frames: 5,
            precache_trigger_frames: 30,
            precache_sample_frames: 3,
            precache_burst_ms: 500.0,
            frame_cache_capacity: 256,
            prefill_timeout_ms: 2_000,
        }
    }
}

impl PlaybackConfig {
    /// Reads a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            context: "failed to read playback config",
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&json).map_err(|source| EngineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the controller and frame cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason| Err(EngineError::InvalidConfig { field, reason });
        if self.lookahead_frames < 0 {
            return invalid("lookaheadFrames", "must not be negative");
        }
        if self.reschedule_interval_frames < 1 {
            return invalid("rescheduleIntervalFrames", "must be at least 1");
        }
        if self.precache_trigger_frames < 0 {
            return invalid("precacheTriggerFrames", "must not be negative");
        }
        if self.precache_sample_frames < 0 {
            return invalid("precacheSampleFrames", "must not be negative");
        }
        if !self.precache_burst_ms.is_finite() || self.precache_burst_ms < 0.0 {
            return invalid("precacheBurstMs", "must be finite and not negative");
        }
        if self.frame_cache_capacity == 0 {
            return invalid("frameCacheCapacity", "must be at least 1");
        }
        Ok(())
    }

    pub fn prefill_timeout(&self) -> Duration {
        Duration::from_millis(self.prefill_timeout_ms)
    }
}
