use crate::native::NativeDecoder;

/// Gate between the native end-of-stream signal and the code reacting to it.
///
/// The platform decoder may report end of stream asynchronously after an
/// intentional stop or a media switch. The guard only lets the signal
/// through while playback is armed:
///
/// - `stopping` is set by [`disarm`](Self::disarm), by
///   [`on_open`](Self::on_open) when media was already loaded and by
///   [`release`](Self::release). Only [`arm`](Self::arm) clears it.
/// - `eos_guarded` records that the native listener was attached, so
///   [`register`](Self::register) attaches it at most once.
///
/// # Example
/// ```
/// use media_session::{EosGuard, NativeDecoder};
///
/// let mut native = NativeDecoder::new();
/// let mut guard = EosGuard::new();
/// guard.register(&mut native);
///
/// guard.disarm();
/// assert_eq!(guard.admit(|| "handled"), None);
///
/// guard.arm();
/// assert_eq!(guard.admit(|| "handled"), Some("handled"));
/// ```
#[derive(Debug, Default)]
pub struct EosGuard {
    stopping: bool,
    eos_guarded: bool,
    admitted: u64,
}

impl EosGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a media (re)open. Replacing loaded media stops it first.
    pub fn on_open(&mut self, had_media: bool) {
        if had_media {
            self.stopping = true;
        }
    }

    /// Attaches the native listener once.
    pub fn register(&mut self, native: &mut NativeDecoder) {
        if self.eos_guarded {
            return;
        }
        self.eos_guarded = true;
        native.attach_eos_listener();
    }

    /// Re-arms the gate. Called from play only.
    pub fn arm(&mut self) {
        self.stopping = false;
    }

    /// Closes the gate for an intentional stop.
    pub fn disarm(&mut self) {
        self.stopping = true;
    }

    /// Closes the gate for good and detaches the native listener.
    pub fn release(&mut self, native: &mut NativeDecoder) {
        self.stopping = true;
        if self.eos_guarded {
            native.detach_eos_listener();
        }
        self.eos_guarded = false;
    }

    /// Runs `body` for a native end-of-stream signal unless stopping.
    pub fn admit<T>(&mut self, body: impl FnOnce() -> T) -> Option<T> {
        if self.stopping {
            return None;
        }
        self.admitted += 1;
        Some(body())
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    pub fn is_guarded(&self) -> bool {
        self.eos_guarded
    }

    /// Number of signals that got through the gate.
    pub fn admitted(&self) -> u64 {
        self.admitted
    }
}

#[cfg(test)]
mod tests {
    use super::EosGuard;
    use crate::native::NativeDecoder;

    #[test]
    fn new_guard_is_unarmed_free_and_unregistered() {
        let guard = EosGuard::new();
        assert!(!guard.is_stopping());
        assert!(!guard.is_guarded());
    }

    #[test]
    fn stopping_suppresses_every_signal() {
        let mut guard = EosGuard::new();
        let mut counter = 0;
        guard.disarm();
        guard.disarm();

        for _ in 0..10 {
            guard.admit(|| counter += 1);
        }

        assert_eq!(counter, 0);
        assert_eq!(guard.admitted(), 0);
    }

    #[test]
    fn arm_lets_the_next_signal_through_once() {
        let mut guard = EosGuard::new();
        let mut counter = 0;
        guard.disarm();
        guard.admit(|| counter += 1);

        guard.arm();
        guard.admit(|| counter += 1);

        assert_eq!(counter, 1);
    }

    #[test]
    fn register_attaches_the_listener_once() {
        let mut native = NativeDecoder::new();
        let mut guard = EosGuard::new();

        guard.register(&mut native);
        guard.register(&mut native);

        assert!(guard.is_guarded());
        assert_eq!(native.eos_listener_count(), 1);
    }

    #[test]
    fn open_over_loaded_media_sets_stopping_without_touching_registration() {
        let mut native = NativeDecoder::new();
        let mut guard = EosGuard::new();
        guard.register(&mut native);

        guard.on_open(false);
        assert!(!guard.is_stopping());

        guard.on_open(true);
        assert!(guard.is_stopping());
        assert!(guard.is_guarded());
    }

    #[test]
    fn release_detaches_and_resets_registration() {
        let mut native = NativeDecoder::new();
        let mut guard = EosGuard::new();
        guard.register(&mut native);

        guard.release(&mut native);

        assert!(guard.is_stopping());
        assert!(!guard.is_guarded());
        assert_eq!(native.eos_listener_count(), 0);

        guard.register(&mut native);
        assert_eq!(native.eos_listener_count(), 1);
    }
}
