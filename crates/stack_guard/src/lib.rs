//! Stack integrity monitoring
//!
//! Last-resort guard against stack-frame corruption: functions with large local buffers arm a
//! canary on entry and verify it on exit. A mismatch means the frame, and therefore the caller
//! state, cannot be trusted, so control diverts to a permanent halt instead of returning.

#![cfg_attr(not(test), no_std)]

mod canary;
mod halt;

pub use canary::{seed_canary, stack_chk_fail, with_canary, CanaryValue};
pub use halt::{fatal_halt, install_halt_sink, HaltSink};
