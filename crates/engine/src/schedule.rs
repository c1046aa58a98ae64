use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::time::frames_to_ms;
use crate::timeline::{Clip, ClipId, Track, TrackId, clip_contains_frame};

/// Identity of one stream entry: a clip on a track.
///
/// Displays as `"{track_id}_{clip_id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamKey {
    pub track_id: TrackId,
    pub clip_id: ClipId,
}

impl StreamKey {
    pub fn new(track_id: impl Into<TrackId>, clip_id: impl Into<ClipId>) -> Self {
        Self {
            track_id: track_id.into(),
            clip_id: clip_id.into(),
        }
    }
}

impl Display for StreamKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.track_id, self.clip_id)
    }
}

/// One clip that must be streamed now or pre-rolled soon.
///
/// Rebuilt on every scheduling pass; borrows the clip from the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry<'a> {
    pub track_id: &'a str,
    pub clip_id: &'a str,
    pub media_id: &'a str,
    pub source_start_ms: f64,
    pub source_end_ms: f64,
    pub is_active: bool,
    pub needs_preroll: bool,
    pub clip: &'a Clip,
}

impl ScheduleEntry<'_> {
    pub fn key(&self) -> StreamKey {
        StreamKey::new(self.track_id, self.clip_id)
    }
}

/// Lists clips active at `current_frame` or starting within the next
/// `lookahead_frames`, in track order then clip order.
///
/// Muted tracks, disabled clips and clips without media are skipped. The
/// lookahead boundary is inclusive.
///
/// # Example
/// ```
/// use engine::schedule::build_schedule;
/// use engine::timeline::{Clip, Track};
///
/// let tracks = vec![Track {
///     id: "v1".into(),
///     clips: vec![Clip {
///         id: "a".into(),
///         track_id: "v1".into(),
///         media_id: Some("m".into()),
///         start_frame: 50,
///         source_in_frame: 0,
///         source_out_frame: 100,
///         speed: 1.0,
///         disabled: false,
///     }],
///     muted: false,
/// }];
///
/// let schedule = build_schedule(&tracks, 0, 60, 30.0);
/// assert!(schedule[0].needs_preroll);
/// assert!(!schedule[0].is_active);
/// ```
pub fn build_schedule(
    tracks: &[Track],
    current_frame: i64,
    lookahead_frames: i64,
    fps: f64,
) -> Vec<ScheduleEntry<'_>> {
    let mut entries = Vec::new();

    for track in tracks.iter().filter(|track| !track.muted) {
        for clip in track.clips.iter().filter(|clip| !clip.disabled) {
            let Some(media_id) = clip.media_id.as_deref() else {
                continue;
            };

            let is_active = clip_contains_frame(clip, current_frame);
            let needs_preroll = !is_active
                && clip.start_frame > current_frame
                && clip.start_frame <= current_frame + lookahead_frames;
            if !is_active && !needs_preroll {
                continue;
            }

            entries.push(ScheduleEntry {
                track_id: &track.id,
                clip_id: &clip.id,
                media_id,
                source_start_ms: frames_to_ms(clip.source_in_frame, fps),
                source_end_ms: frames_to_ms(clip.source_out_frame, fps),
                is_active,
                needs_preroll,
                clip,
            });
        }
    }

    entries
}
