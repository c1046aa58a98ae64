use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::time::validate_fps;

/// Opaque identifier for tracks.
pub type TrackId = String;
/// Opaque identifier for clips, unique within a track.
pub type ClipId = String;
/// Opaque identifier for media resources.
pub type MediaId = String;

/// A placed reference to a media source on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: ClipId,
    pub track_id: TrackId,
    pub media_id: Option<MediaId>,
    pub start_frame: i64,
    pub source_in_frame: i64,
    pub source_out_frame: i64,
    /// Time-dilation divisor, `>= 0`.
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub disabled: bool,
}

fn default_speed() -> f64 {
    1.0
}

impl Clip {
    /// Timeline duration in frames: `round((out - in) / speed)`.
    ///
    /// A zero speed leaves the source length undiluted.
    pub fn duration(&self) -> i64 {
        let source_frames = self.source_out_frame - self.source_in_frame;
        if self.speed > 0.0 {
            (source_frames as f64 / self.speed).round() as i64
        } else {
            source_frames
        }
    }

    /// Exclusive timeline end frame.
    pub fn end_frame(&self) -> i64 {
        self.start_frame + self.duration()
    }

    /// Half-open containment: `start_frame <= frame < end_frame`.
    pub fn contains_frame(&self, frame: i64) -> bool {
        self.start_frame <= frame && frame < self.end_frame()
    }
}

/// Returns true when `clip` covers timeline `frame`.
pub fn clip_contains_frame(clip: &Clip, frame: i64) -> bool {
    clip.contains_frame(frame)
}

/// Ordered clips on one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub muted: bool,
}

/// Tracks played together at one frame rate, bottom track first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub fps: f64,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Sequence {
    /// Empty sequence at `fps`.
    pub fn empty(fps: f64) -> Self {
        Self {
            fps,
            tracks: Vec::new(),
        }
    }

    /// Exclusive end frame of the last clip.
    pub fn duration_frames(&self) -> i64 {
        self.tracks
            .iter()
            .flat_map(|track| track.clips.iter())
            .map(Clip::end_frame)
            .max()
            .unwrap_or(0)
    }

    /// Checks frame rate, clip speeds, source ranges and clip identity.
    pub fn validate(&self) -> Result<()> {
        validate_fps(self.fps)?;

        for track in &self.tracks {
            let mut seen = HashSet::new();
            for clip in &track.clips {
                if !seen.insert(clip.id.as_str()) {
                    warn!(track_id = %track.id, clip_id = %clip.id, "duplicate clip id");
                    return Err(EngineError::DuplicateClip {
                        track_id: track.id.clone(),
                        clip_id: clip.id.clone(),
                    });
                }
                if clip.track_id != track.id {
                    return Err(EngineError::ClipTrackMismatch {
                        track_id: track.id.clone(),
                        clip_id: clip.id.clone(),
                        claimed: clip.track_id.clone(),
                    });
                }
                if !clip.speed.is_finite() || clip.speed < 0.0 {
                    return Err(EngineError::InvalidSpeed {
                        clip_id: clip.id.clone(),
                        speed: clip.speed,
                    });
                }
                if clip.source_out_frame < clip.source_in_frame {
                    return Err(EngineError::InvalidSourceRange {
                        clip_id: clip.id.clone(),
                        source_in_frame: clip.source_in_frame,
                        source_out_frame: clip.source_out_frame,
                    });
                }
            }
        }
        Ok(())
    }
}
