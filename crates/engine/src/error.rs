use std::path::PathBuf;

use thiserror::Error;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced while loading, validating or driving playback.
///
/// Scheduling itself never fails; these cover the surfaces around it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(f64),
    #[error("invalid speed {speed} on clip {clip_id}")]
    InvalidSpeed { clip_id: String, speed: f64 },
    #[error("invalid source range on clip {clip_id}: {source_in_frame}..{source_out_frame}")]
    InvalidSourceRange {
        clip_id: String,
        source_in_frame: i64,
        source_out_frame: i64,
    },
    #[error("clip {clip_id} appears twice on track {track_id}")]
    DuplicateClip { track_id: String, clip_id: String },
    #[error("clip {clip_id} claims track {claimed} but sits on track {track_id}")]
    ClipTrackMismatch {
        track_id: String,
        clip_id: String,
        claimed: String,
    },
    #[error("media {media_id} has invalid frame rate {frame_rate}")]
    InvalidMediaRate { media_id: String, frame_rate: f64 },
    #[error("invalid config field {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    #[error("media is not registered: {media_id}")]
    UnknownMedia { media_id: String },
    #[error("{context}: {} ({source})", path.display())]
    SequenceIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("project deserialization failed at {} ({source})", path.display())]
    SequenceSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{context}: {} ({source})", path.display())]
    ConfigIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse failed at {} ({source})", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("decode session error: {0}")]
    Session(#[from] media_session::SessionError),
}
