//! Boot operations table

use crate::context::GuestContext;
use crate::errors::BootError;

/// The contract every boot-protocol provider implements.
///
/// Providers are stateless: all per-guest state lives in the `GuestContext`, so a single provider
/// instance serves any number of guests. The orchestrator drives the methods in fixed order:
/// `init`, `load`, `finalize`. Each method checks the context's lifecycle stage and rejects
/// out-of-order invocation with `OutOfOrder`, without mutating the context.
///
/// The `{init, load, finalize}` set is the minimum contract; concrete protocols may require more
/// and extend it on their own types.
pub trait VbootOperations: Sync {
    /// Identifies the provider, for registry reports and logging.
    fn name(&self) -> &'static str;

    /// Validates the guest image and the context inputs.
    fn init(&self, ctx: &mut GuestContext) -> Result<(), BootError>;

    /// Computes the guest-visible placements of kernel, ramdisk and command line, and records
    /// the entry address.
    fn load(&self, ctx: &mut GuestContext) -> Result<(), BootError>;

    /// Sets the initial register state per the protocol's calling convention.
    fn finalize(&self, ctx: &mut GuestContext) -> Result<(), BootError>;
}
