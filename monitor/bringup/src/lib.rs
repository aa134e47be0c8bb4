//! Guest bring-up orchestration
//!
//! Single-threaded launch path for one guest per responsible physical core: resolve the
//! configured boot mode to a provider, then drive the provider's lifecycle methods in fixed
//! order. A failed step aborts that guest's boot attempt and reports upward; the hypervisor
//! keeps running.

#![cfg_attr(not(test), no_std)]

mod config;

pub use config::PlatformConfig;

use log::{error, info};
use vboot::{BootError, BootMode, BootProviderRegistry, GuestContext, DIRECT_BOOT};

/// One-time platform initialization, on the bring-up core before the others are released.
///
/// Registers the diagnostic console, then seeds the stack canary with platform entropy. The
/// order matters: a canary mismatch detected later must be able to report through the console.
pub fn init_platform(config: &PlatformConfig, console: &'static dyn logger::Console, entropy: u64) {
    logger::init(config.log_level, console);
    stack_guard::seed_canary(entropy);
}

/// Builds the registry with the providers shipped in the hypervisor core.
///
/// Firmware boot is protocol-specific and provided by platform crates; only direct kernel boot
/// is registered here.
pub fn default_registry() -> Result<BootProviderRegistry, BootError> {
    let mut registry = BootProviderRegistry::new();
    registry.register(BootMode::DirectKernel, &DIRECT_BOOT)?;
    Ok(registry)
}

/// Drives the guest-launch sequence: init, load, finalize.
///
/// On success the context holds the mapping plan, the entry address and the initial register
/// file, ready for the memory and CPU virtualization subsystems. On failure the context is
/// marked `Failed` and must not be used to launch the guest.
pub fn boot_guest(
    registry: &BootProviderRegistry,
    mode: BootMode,
    ctx: &mut GuestContext,
) -> Result<(), BootError> {
    let ops = match registry.get_operations(mode) {
        Ok(ops) => ops,
        Err(err) => {
            error!("guest '{}': no provider for {:?}", ctx.name, mode);
            return Err(err);
        }
    };

    info!("guest '{}': booting with '{}' operations", ctx.name, ops.name());
    if let Err(err) = ops.init(ctx) {
        return fail(ctx, "init", err);
    }
    if let Err(err) = ops.load(ctx) {
        return fail(ctx, "load", err);
    }
    if let Err(err) = ops.finalize(ctx) {
        return fail(ctx, "finalize", err);
    }

    match ctx.entry_address {
        Some(entry) => info!(
            "guest '{}': ready, entry 0x{:x}",
            ctx.name,
            entry.as_usize()
        ),
        None => info!("guest '{}': ready", ctx.name),
    }
    Ok(())
}

fn fail(ctx: &mut GuestContext, step: &str, err: BootError) -> Result<(), BootError> {
    ctx.fail();
    error!("guest '{}': {} failed: {:?}", ctx.name, step, err);
    Err(err)
}
