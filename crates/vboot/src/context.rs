//! Guest context
//!
//! In-memory description of a virtual machine being brought up. The boot orchestrator owns the
//! context and passes it by mutable reference into the provider's lifecycle methods, which
//! populate the mapping plan, the entry address, and the initial register file.

use bitflags::bitflags;
use utils::GuestPhysAddr;

use crate::errors::BootError;

pub const MAX_REGIONS: usize = 32;
pub const MAX_MAPPINGS: usize = 24;

// ——————————————————————————— Lifecycle Stages ————————————————————————————— //

/// Boot lifecycle stage of a guest.
///
/// The only legal path is Uninitialized -> Initialized -> Loaded -> Finalized. `Failed` is
/// terminal: once a guest enters it, the orchestrator must not proceed to guest execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Uninitialized,
    Initialized,
    Loaded,
    Finalized,
    Failed,
}

// ——————————————————————————— Memory Description ——————————————————————————— //

/// Kind of a guest-physical memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Usable guest RAM.
    Ram,
    /// Reserved, must not receive guest payloads.
    Reserved,
}

/// A guest-physical memory region, produced by the memory manager.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    pub start: GuestPhysAddr,
    pub size: usize,
    pub kind: RegionKind,
}

impl MemoryRegion {
    /// Returns true if `[start, start + size)` lies entirely within this region.
    pub fn contains(&self, start: GuestPhysAddr, size: usize) -> bool {
        let Some(range_end) = start.as_usize().checked_add(size) else {
            return false;
        };
        let Some(region_end) = self.start.as_usize().checked_add(self.size) else {
            return false;
        };
        start.as_usize() >= self.start.as_usize() && range_end <= region_end
    }

    /// Returns true if `[start, start + size)` overlaps this region.
    pub fn overlaps(&self, start: GuestPhysAddr, size: usize) -> bool {
        let Some(range_end) = start.as_usize().checked_add(size) else {
            return true;
        };
        let Some(region_end) = self.start.as_usize().checked_add(self.size) else {
            return true;
        };
        start.as_usize() < region_end && self.start.as_usize() < range_end
    }
}

/// The guest-visible memory layout: RAM and reserved regions.
#[derive(Clone, Copy)]
pub struct MemoryLayout {
    regions: [Option<MemoryRegion>; MAX_REGIONS],
    len: usize,
}

impl MemoryLayout {
    pub const fn new() -> Self {
        Self {
            regions: [None; MAX_REGIONS],
            len: 0,
        }
    }

    pub fn add_region(&mut self, region: MemoryRegion) -> Result<(), BootError> {
        if self.len >= MAX_REGIONS {
            return Err(BootError::LayoutConflict);
        }
        self.regions[self.len] = Some(region);
        self.len += 1;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryRegion> {
        self.regions[..self.len].iter().filter_map(|r| r.as_ref())
    }

    /// Returns true if the range fits entirely inside a single RAM region.
    pub fn ram_contains(&self, start: GuestPhysAddr, size: usize) -> bool {
        self.iter()
            .any(|r| r.kind == RegionKind::Ram && r.contains(start, size))
    }

    /// Returns true if the range overlaps any reserved region.
    pub fn reserved_overlaps(&self, start: GuestPhysAddr, size: usize) -> bool {
        self.iter()
            .any(|r| r.kind == RegionKind::Reserved && r.overlaps(start, size))
    }
}

// ————————————————————————————— Mapping Plan ——————————————————————————————— //

bitflags! {
    /// Access flags for a planned guest mapping.
    pub struct MapFlags: u64 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

/// A planned guest-visible mapping, to be installed by the memory virtualization subsystem.
#[derive(Debug, Clone, Copy)]
pub struct Mapping {
    pub gpa: GuestPhysAddr,
    pub size: usize,
    pub flags: MapFlags,
}

/// The set of mappings a provider plans for a guest.
///
/// Rejects mappings that overlap an already planned one: the provider computes placements for
/// independent payloads and a collision between them is a layout conflict.
#[derive(Clone, Copy)]
pub struct MappingPlan {
    mappings: [Option<Mapping>; MAX_MAPPINGS],
    len: usize,
}

impl MappingPlan {
    pub const fn new() -> Self {
        Self {
            mappings: [None; MAX_MAPPINGS],
            len: 0,
        }
    }

    pub fn push(&mut self, mapping: Mapping) -> Result<(), BootError> {
        if self.len >= MAX_MAPPINGS {
            return Err(BootError::LayoutConflict);
        }
        if self
            .iter()
            .any(|m| m.overlaps(mapping.gpa, mapping.size))
        {
            return Err(BootError::LayoutConflict);
        }
        self.mappings[self.len] = Some(mapping);
        self.len += 1;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings[..self.len].iter().filter_map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Mapping {
    fn overlaps(&self, gpa: GuestPhysAddr, size: usize) -> bool {
        let Some(range_end) = gpa.as_usize().checked_add(size) else {
            return true;
        };
        let Some(self_end) = self.gpa.as_usize().checked_add(self.size) else {
            return true;
        };
        gpa.as_usize() < self_end && self.gpa.as_usize() < range_end
    }
}

// ————————————————————————————— Register File —————————————————————————————— //

/// Initial register state of the bootstrap vcpu.
#[derive(Debug, Clone, Copy)]
pub struct RegisterFile {
    pub rip: usize,
    pub rsp: usize,
    pub rsi: usize,
    /// The guest is fully loaded and ready to launch.
    pub loaded: bool,
}

impl RegisterFile {
    pub const fn default_config() -> Self {
        RegisterFile {
            rip: 0,
            rsp: 0,
            rsi: 0,
            loaded: false,
        }
    }
}

// ————————————————————————————— Guest Context —————————————————————————————— //

/// A guest payload (command line, ramdisk) with its guest-physical load address.
///
/// The bytes and the load address are produced by external subsystems (image loader, memory
/// manager); the provider only validates and records the placement.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    pub bytes: &'a [u8],
    pub addr: GuestPhysAddr,
}

/// Description of the guest being booted.
pub struct GuestContext<'a> {
    /// Guest identity, used in failure reports.
    pub name: &'a str,
    pub memory: MemoryLayout,
    /// Raw kernel image bytes.
    pub kernel: &'a [u8],
    pub cmdline: Option<Payload<'a>>,
    pub ramdisk: Option<Payload<'a>>,
    pub vcpus: usize,
    /// Populated by the provider during `load`.
    pub plan: MappingPlan,
    /// Populated by the provider during `load`.
    pub entry_address: Option<GuestPhysAddr>,
    /// Populated by the provider during `finalize`.
    pub regs: RegisterFile,
    stage: Stage,
}

impl<'a> GuestContext<'a> {
    pub fn new(name: &'a str, memory: MemoryLayout, kernel: &'a [u8]) -> Self {
        Self {
            name,
            memory,
            kernel,
            cmdline: None,
            ramdisk: None,
            vcpus: 1,
            plan: MappingPlan::new(),
            entry_address: None,
            regs: RegisterFile::default_config(),
            stage: Stage::Uninitialized,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Rejects the call if the context is not in the expected stage.
    ///
    /// Lifecycle methods call this before touching the context, so an out-of-order call is
    /// rejected without mutation.
    pub fn expect_stage(&self, expected: Stage) -> Result<(), BootError> {
        if self.stage != expected {
            return Err(BootError::OutOfOrder(self.stage));
        }
        Ok(())
    }

    /// Moves the context to the next lifecycle stage.
    pub fn advance(&mut self, to: Stage) {
        self.stage = to;
    }

    /// Marks the boot attempt as failed. Terminal.
    pub fn fail(&mut self) {
        self.stage = Stage::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram(start: usize, size: usize) -> MemoryRegion {
        MemoryRegion {
            start: GuestPhysAddr::new(start),
            size,
            kind: RegionKind::Ram,
        }
    }

    fn reserved(start: usize, size: usize) -> MemoryRegion {
        MemoryRegion {
            start: GuestPhysAddr::new(start),
            size,
            kind: RegionKind::Reserved,
        }
    }

    #[test]
    fn layout_queries() {
        let mut layout = MemoryLayout::new();
        layout.add_region(ram(0x10000, 0x40000)).unwrap();
        layout.add_region(reserved(0x50000, 0x1000)).unwrap();

        assert!(layout.ram_contains(GuestPhysAddr::new(0x10000), 0x1000));
        assert!(layout.ram_contains(GuestPhysAddr::new(0x4f000), 0x1000));
        // Crosses the end of RAM.
        assert!(!layout.ram_contains(GuestPhysAddr::new(0x4f000), 0x2000));
        assert!(!layout.ram_contains(GuestPhysAddr::new(0x0), 0x1000));

        assert!(layout.reserved_overlaps(GuestPhysAddr::new(0x4ff00), 0x200));
        assert!(!layout.reserved_overlaps(GuestPhysAddr::new(0x10000), 0x1000));
    }

    #[test]
    fn plan_rejects_overlap() {
        let mut plan = MappingPlan::new();
        plan.push(Mapping {
            gpa: GuestPhysAddr::new(0x1000),
            size: 0x2000,
            flags: MapFlags::READ,
        })
        .unwrap();

        let overlapping = Mapping {
            gpa: GuestPhysAddr::new(0x2000),
            size: 0x1000,
            flags: MapFlags::READ,
        };
        assert_eq!(plan.push(overlapping), Err(BootError::LayoutConflict));

        let disjoint = Mapping {
            gpa: GuestPhysAddr::new(0x3000),
            size: 0x1000,
            flags: MapFlags::READ,
        };
        plan.push(disjoint).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn out_of_order_is_rejected_without_mutation() {
        let mut ctx = GuestContext::new("guest-0", MemoryLayout::new(), &[]);
        assert_eq!(
            ctx.expect_stage(Stage::Initialized),
            Err(BootError::OutOfOrder(Stage::Uninitialized))
        );
        assert_eq!(ctx.stage(), Stage::Uninitialized);

        ctx.fail();
        assert_eq!(
            ctx.expect_stage(Stage::Uninitialized),
            Err(BootError::OutOfOrder(Stage::Failed))
        );
    }
}
