//! Per-frame stack canaries

use core::sync::atomic::{AtomicU64, Ordering};

use crate::halt::fatal_halt;

/// Canary pattern used before the platform provides entropy. The low byte is NUL so that C-string
/// overruns cannot reproduce the value.
const POWER_ON_CANARY: u64 = 0x9bd6_4e25_c71f_3a00;

static CANARY_SECRET: AtomicU64 = AtomicU64::new(POWER_ON_CANARY);

/// Installs the per-boot canary secret.
///
/// Called once during single-threaded bring-up with platform entropy. Frames armed before the
/// seed must be verified before it, so this must run before any guarded function.
pub fn seed_canary(entropy: u64) {
    // Keep the NUL byte of the power-on pattern.
    CANARY_SECRET.store(entropy & !0xff, Ordering::Relaxed);
}

/// A per-frame integrity token.
///
/// Armed at function entry, verified at exit. `verify` consumes the value so a frame cannot be
/// checked twice, and a canary cannot outlive the check.
pub struct CanaryValue {
    value: u64,
}

impl CanaryValue {
    /// Arms a canary for the current frame.
    #[inline]
    pub fn arm() -> Self {
        Self {
            value: CANARY_SECRET.load(Ordering::Relaxed),
        }
    }

    /// Verifies the canary. On mismatch the frame is corrupted: control diverts to the fatal
    /// halt and never returns to the caller.
    #[inline]
    pub fn verify(self) {
        if self.value != CANARY_SECRET.load(Ordering::Relaxed) {
            stack_chk_fail();
        }
    }
}

/// Runs `f` with the frame guarded by a canary.
pub fn with_canary<T>(f: impl FnOnce() -> T) -> T {
    let canary = CanaryValue::arm();
    let result = f();
    canary.verify();
    result
}

/// Diverts to the fatal halt after a failed stack check.
pub fn stack_chk_fail() -> ! {
    fatal_halt("stack check fails in HV")
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::halt::{install_halt_sink, HaltSink};

    struct RecordingSink {
        calls: AtomicUsize,
    }

    impl HaltSink for RecordingSink {
        fn fatal(&self, msg: &str) -> ! {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("halted: {}", msg);
        }
    }

    static RECORDING_SINK: RecordingSink = RecordingSink {
        calls: AtomicUsize::new(0),
    };

    #[test]
    fn intact_canary_returns_normally() {
        let canary = CanaryValue::arm();
        canary.verify();
        assert_eq!(with_canary(|| 42), 42);
    }

    #[test]
    fn mismatch_halts_exactly_once_and_nothing_runs_after() {
        install_halt_sink(&RECORDING_SINK);

        let reached_after_verify = AtomicUsize::new(0);
        let result = catch_unwind(AssertUnwindSafe(|| {
            let canary = CanaryValue {
                value: CANARY_SECRET.load(Ordering::Relaxed) ^ 0xdead,
            };
            canary.verify();
            reached_after_verify.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(result.is_err());
        assert_eq!(RECORDING_SINK.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reached_after_verify.load(Ordering::SeqCst), 0);
    }
}
