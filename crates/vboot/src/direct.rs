//! Direct guest kernel boot
//!
//! Protocol-less loading: the guest kernel is placed at its declared physical addresses with an
//! identity mapping, no bootloader or firmware stage in between.

use log::debug;
use stack_guard::with_canary;
use utils::GuestPhysAddr;

use crate::context::{GuestContext, MapFlags, Mapping, Stage};
use crate::errors::BootError;
use crate::image::KernelImage;
use crate::ops::VbootOperations;

pub struct DirectBootProvider {}

pub static DIRECT_BOOT: DirectBootProvider = DirectBootProvider {};

impl VbootOperations for DirectBootProvider {
    fn name(&self) -> &'static str {
        "direct"
    }

    /// Validates image presence and format.
    fn init(&self, ctx: &mut GuestContext) -> Result<(), BootError> {
        ctx.expect_stage(Stage::Uninitialized)?;
        let image = KernelImage::parse(ctx.kernel)?;
        debug!(
            "guest '{}': image valid, entry 0x{:x}",
            ctx.name,
            image.phys_entry.as_usize()
        );
        ctx.advance(Stage::Initialized);
        Ok(())
    }

    /// Plans the guest-visible placement of the kernel, ramdisk and command line, and records
    /// the entry address.
    fn load(&self, ctx: &mut GuestContext) -> Result<(), BootError> {
        ctx.expect_stage(Stage::Initialized)?;
        // The placement plan is a large local table, guard the frame.
        with_canary(|| self.plan_load(ctx))
    }

    /// Sets the initial register state per the direct-boot calling convention: `rip` at the
    /// kernel entry, `rsi` pointing to the boot parameters, stack left to the kernel.
    fn finalize(&self, ctx: &mut GuestContext) -> Result<(), BootError> {
        ctx.expect_stage(Stage::Loaded)?;
        let entry = ctx.entry_address.ok_or(BootError::ImageInvalid)?;
        ctx.regs.rip = entry.as_usize();
        ctx.regs.rsp = 0;
        ctx.regs.rsi = match ctx.cmdline {
            Some(cmdline) => cmdline.addr.as_usize(),
            None => 0,
        };
        ctx.regs.loaded = true;
        ctx.advance(Stage::Finalized);
        Ok(())
    }
}

impl DirectBootProvider {
    fn plan_load(&self, ctx: &mut GuestContext) -> Result<(), BootError> {
        let image = KernelImage::parse(ctx.kernel)?;

        for seg in image.segments() {
            place(ctx, seg.paddr, seg.memsz, seg.flags)?;
        }
        if let Some(ramdisk) = ctx.ramdisk {
            place(ctx, ramdisk.addr, ramdisk.bytes.len(), MapFlags::READ)?;
        }
        if let Some(cmdline) = ctx.cmdline {
            place(ctx, cmdline.addr, cmdline.bytes.len(), MapFlags::READ)?;
        }

        ctx.entry_address = Some(image.phys_entry);
        ctx.advance(Stage::Loaded);
        debug!(
            "guest '{}': {} mappings planned, entry 0x{:x}",
            ctx.name,
            ctx.plan.len(),
            image.phys_entry.as_usize()
        );
        Ok(())
    }
}

/// Validates a placement against the guest memory layout and records it in the plan.
fn place(
    ctx: &mut GuestContext,
    gpa: GuestPhysAddr,
    size: usize,
    flags: MapFlags,
) -> Result<(), BootError> {
    if size == 0 {
        return Ok(());
    }
    if !ctx.memory.ram_contains(gpa, size) || ctx.memory.reserved_overlaps(gpa, size) {
        return Err(BootError::LayoutConflict);
    }
    ctx.plan.push(Mapping { gpa, size, flags })
}
