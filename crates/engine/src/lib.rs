//! Playback scheduling and frame delivery for the editor timeline.
//!
//! The [`StreamController`] keeps decode sessions in step with the playhead
//! using [`build_schedule`], sharing one session per media resource.

pub mod api;
pub mod bridge;
pub mod buffer;
pub mod burst;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod project;
pub mod schedule;
pub mod session;
pub mod time;
pub mod timeline;

pub use api::{Command, EngineErrorEvent, EngineErrorKind, Event};
pub use bridge::{ControllerCommandSender, ControllerEventReceiver, spawn_controller_bridge};
pub use buffer::{BufferReport, BufferRequest, ensure_buffered};
pub use cache::{FrameCache, SharedFrameCache};
pub use config::PlaybackConfig;
pub use controller::{ClipEndReceiver, StreamController, StreamSnapshot, StreamSummary};
pub use error::{EngineError, Result};
pub use project::{MediaAsset, Project, load_project};
pub use schedule::{ScheduleEntry, StreamKey, build_schedule};
pub use session::{ClipEndCallback, DecodeSession, PooledSession, SessionPool, SessionResolver};
pub use timeline::{Clip, Sequence, Track};
