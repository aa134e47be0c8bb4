//! Boot errors

use crate::context::Stage;
use crate::mode::BootMode;

/// An error that occured while booting a guest.
///
/// All variants are recoverable at the orchestrator: the affected guest's boot attempt is
/// aborted and reported, the hypervisor keeps running. Stack-integrity violations are not
/// represented here since they have no recovery path; they divert to the fatal halt instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// No provider is registered for the requested boot mode.
    NotSupported(BootMode),

    /// A provider is already registered for this boot mode.
    AlreadyRegistered(BootMode),

    /// The guest image is missing or malformed.
    ImageInvalid,

    /// A guest placement overlaps a reserved region or another placement, or the memory layout
    /// cannot be described.
    LayoutConflict,

    /// A lifecycle method was invoked out of order. Carries the stage the context was found in.
    OutOfOrder(Stage),
}
