use tracing::debug;

use crate::controller::{StreamController, StreamSnapshot};
use crate::error::{EngineError, Result};
use crate::schedule::StreamKey;
use crate::session::SessionResolver;
use crate::timeline::Sequence;

/// Commands accepted by the stream controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Playback started at `frame`.
    Start { frame: i64 },
    Stop,
    /// Playhead moved to `frame` while playing or paused.
    Seek { frame: i64 },
    /// Playback clock advanced to `frame`.
    ///
    /// A scheduling pass runs only every few frames; ticks in between emit
    /// nothing.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    ///
    /// use engine::{Command, FrameCache, PlaybackConfig, Sequence, SessionPool, StreamController};
    ///
    /// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
    /// let cache = FrameCache::shared(64, 40.0);
    /// let pool = Arc::new(SessionPool::new(Arc::clone(&cache)));
    /// let (controller, _clip_ends) =
    ///     StreamController::new(pool, cache, PlaybackConfig::default(), Sequence::empty(25.0))
    ///         .expect("valid sequence");
    ///
    /// controller.handle_command(Command::Start { frame: 0 }).await.expect("start");
    /// let events = controller
    ///     .handle_command(Command::Tick { frame: 1 })
    ///     .await
    ///     .expect("tick");
    /// assert!(events.is_empty());
    /// # });
    /// ```
    Tick { frame: i64 },
    /// The active sequence was edited.
    TimelineUpdated(Sequence),
    /// Another sequence became active.
    SequenceActivated(Sequence),
    /// A session reached the end of its clip.
    ClipEnded(StreamKey),
}

/// Events emitted after handling commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StreamsChanged(StreamSnapshot),
    Error(EngineErrorEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    InvalidSequence,
    InvalidConfig,
    Io,
    Session,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::InvalidFrameRate(_)
            | EngineError::InvalidSpeed { .. }
            | EngineError::InvalidSourceRange { .. }
            | EngineError::DuplicateClip { .. }
            | EngineError::ClipTrackMismatch { .. }
            | EngineError::InvalidMediaRate { .. }
            | EngineError::UnknownMedia { .. } => Self::InvalidSequence,
            EngineError::InvalidConfig { .. } => Self::InvalidConfig,
            EngineError::SequenceIo { .. }
            | EngineError::SequenceSerialization { .. }
            | EngineError::ConfigIo { .. }
            | EngineError::ConfigParse { .. } => Self::Io,
            EngineError::Session(_) => Self::Session,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

impl<R: SessionResolver> StreamController<R> {
    /// Handles one command and returns the resulting events.
    pub async fn handle_command(&self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Start { frame } => {
                self.start_playback(frame).await;
            }
            Command::Stop => {
                self.stop_playback();
            }
            Command::Seek { frame } => {
                self.seek_playback(frame).await;
            }
            Command::Tick { frame } => {
                if !self.tick(frame).await {
                    return Ok(Vec::new());
                }
            }
            Command::TimelineUpdated(sequence) => {
                self.update_sequence(sequence).await?;
            }
            Command::SequenceActivated(sequence) => {
                self.activate_sequence(sequence)?;
            }
            Command::ClipEnded(key) => {
                if !self.on_clip_end_reached(&key) {
                    debug!(stream = %key, "clip end for unknown stream ignored");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(vec![Event::StreamsChanged(self.snapshot())])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Command, EngineErrorKind, Event};
    use crate::cache::FrameCache;
    use crate::config::PlaybackConfig;
    use crate::controller::StreamController;
    use crate::schedule::StreamKey;
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
    async fn start_and_stop_emit_snapshots() {
        let controller = controller();

        let events = controller
            .handle_command(Command::Start { frame: 0 })
            .await
            .expect("start");
        let [Event::StreamsChanged(snapshot)] = events.as_slice() else {
            panic!("expected one snapshot, got {events:?}");
        };
        assert!(snapshot.playing);
        assert_eq!(snapshot.generation, 1);

        let events = controller
            .handle_command(Command::Stop)
            .await
            .expect("stop");
        let [Event::StreamsChanged(snapshot)] = events.as_slice() else {
            panic!("expected one snapshot, got {events:?}");
        };
        assert!(!snapshot.playing);
    }

    #[tokio::test]
    async fn invalid_timeline_update_is_rejected() {
        let controller = controller();

        let error = controller
            .handle_command(Command::TimelineUpdated(Sequence::empty(f64::NAN)))
            .await
            .expect_err("invalid fps");

        assert_eq!(EngineErrorKind::from(&error), EngineErrorKind::InvalidSequence);
        assert_eq!(controller.sequence().fps, 25.0);
    }

    #[tokio::test]
    async fn clip_end_for_unknown_stream_emits_nothing() {
        let controller = controller();
        let events = controller
            .handle_command(Command::ClipEnded(StreamKey::new("v1", "gone")))
            .await
            .expect("clip end");
        assert!(events.is_empty());
    }
}
