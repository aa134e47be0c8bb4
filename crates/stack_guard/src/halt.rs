//! Fatal halt service
//!
//! Terminal path for unrecoverable corruption. Once entered, no other hypervisor code may run
//! again, including in interrupt or exception contexts.

use spin::Once;

/// Terminal action taken after the diagnostic is emitted.
///
/// The bring-up environment installs one to power off or signal the platform. Must be callable
/// with interrupts disabled and an unreliable stack: no locks, no large locals.
pub trait HaltSink: Sync {
    fn fatal(&self, msg: &str) -> !;
}

static HALT_SINK: Once<&'static dyn HaltSink> = Once::new();

/// Installs the halt sink. Only the first call takes effect.
pub fn install_halt_sink(sink: &'static dyn HaltSink) {
    HALT_SINK.call_once(|| sink);
}

/// Emits a diagnostic and halts the hypervisor permanently.
///
/// The message goes through the raw console path: the stack may be corrupted, so this avoids the
/// logger lock and format machinery.
pub fn fatal_halt(msg: &str) -> ! {
    if let Some(sink) = HALT_SINK.get() {
        sink.fatal(msg);
    }
    logger::emit_raw(b"[FATAL] ");
    logger::emit_raw(msg.as_bytes());
    logger::emit_raw(b"\n");
    halt_forever()
}

fn halt_forever() -> ! {
    loop {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }
        core::hint::spin_loop();
    }
}
