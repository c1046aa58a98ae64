use thiserror::Error;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error type for decode-session operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no media is loaded in session {media_id}")]
    NoMediaLoaded { media_id: String },
    #[error("session {media_id} is not at end of stream")]
    NotAtEos { media_id: String },
    #[error("session {media_id} has been destroyed")]
    SessionClosed { media_id: String },
    #[error("session {media_id} has no source to reopen")]
    MissingSource { media_id: String },
    #[error("decode module is not ready for session {media_id}")]
    ModuleNotReady { media_id: String },
    #[error("media {media_id} has invalid frame rate {frame_rate}")]
    InvalidFrameRate { media_id: String, frame_rate: f64 },
    #[error("invalid source range {start_ms}..{end_ms} ms")]
    InvalidRange { start_ms: f64, end_ms: f64 },
}
