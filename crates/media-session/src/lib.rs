//! Decode sessions with end-of-stream guarding for the playback engine.

mod eos;
mod error;
mod media;
pub mod monitor;
mod native;
mod session;
mod throttle;

pub use eos::EosGuard;
pub use error::{Result, SessionError};
pub use media::{DecodedFrame, MediaSource};
pub use monitor::{EOS_TIMEOUT, EosMonitor};
pub use native::{NativeDecoder, NativeOutput};
pub use session::{ClipEndCallback, DecoderSession};
pub use throttle::{DURATION_THROTTLE_MS, clamp_seek_ms, should_throttle};
