//! Virtual boot operations
//!
//! Pluggable guest-launch protocols behind a common operations table. The bring-up path resolves
//! the configured boot mode to a provider through the registry, then drives the provider's
//! lifecycle methods in fixed order: init, load, finalize.

#![cfg_attr(not(test), no_std)]

mod context;
mod direct;
mod errors;
mod image;
mod mode;
mod ops;
mod registry;

pub use context::{
    GuestContext, MapFlags, Mapping, MappingPlan, MemoryLayout, MemoryRegion, Payload,
    RegionKind, RegisterFile, Stage, MAX_MAPPINGS, MAX_REGIONS,
};
pub use direct::{DirectBootProvider, DIRECT_BOOT};
pub use errors::BootError;
pub use image::{KernelImage, LoadSegment, MAX_SEGMENTS};
pub use mode::BootMode;
pub use ops::VbootOperations;
pub use registry::BootProviderRegistry;
