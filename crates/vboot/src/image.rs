//! Guest kernel image
//!
//! Minimal ELF64 parsing for direct boot: enough to validate the image and extract the loadable
//! segments and the declared entry point. Segment contents are copied into guest memory by the
//! memory virtualization subsystem, based on the mapping plan the provider records.

use utils::{GuestPhysAddr, GuestVirtAddr};

use crate::context::MapFlags;
use crate::errors::BootError;

pub const MAX_SEGMENTS: usize = 16;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELF_CLASS_64: u8 = 2;
const ELF_DATA_LE: u8 = 1;
const ET_EXEC: u16 = 2;
const PT_LOAD: u32 = 1;
const PF_X: u32 = 1 << 0;
const PF_W: u32 = 1 << 1;
const PF_R: u32 = 1 << 2;
const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;

/// A loadable segment of the guest kernel.
#[derive(Debug, Clone, Copy)]
pub struct LoadSegment {
    /// Offset of the segment contents within the image bytes.
    pub offset: usize,
    pub filesz: usize,
    pub memsz: usize,
    /// Guest-physical load address. Direct boot uses an identity mapping.
    pub paddr: GuestPhysAddr,
    pub flags: MapFlags,
}

/// A validated guest kernel image.
#[derive(Clone, Copy)]
pub struct KernelImage<'a> {
    /// The entry point, as a guest virtual address.
    pub entry: GuestVirtAddr,
    /// The entry point, as a guest physical address.
    ///
    /// Equal to `entry` under direct boot's identity mapping.
    pub phys_entry: GuestPhysAddr,
    pub bytes: &'a [u8],
    segments: [Option<LoadSegment>; MAX_SEGMENTS],
    len: usize,
}

impl<'a> KernelImage<'a> {
    /// Parses and validates a kernel image from raw bytes.
    ///
    /// Rejects with `ImageInvalid`: empty or truncated images, wrong magic or class, images
    /// without loadable segments, segments reaching past the end of the image, and entry points
    /// outside any loadable segment.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BootError> {
        if bytes.len() < EHDR_SIZE {
            return Err(BootError::ImageInvalid);
        }
        if bytes[0..4] != ELF_MAGIC {
            return Err(BootError::ImageInvalid);
        }
        if bytes[4] != ELF_CLASS_64 || bytes[5] != ELF_DATA_LE {
            return Err(BootError::ImageInvalid);
        }
        if read_u16(bytes, 16)? != ET_EXEC {
            return Err(BootError::ImageInvalid);
        }

        let entry = read_u64(bytes, 24)? as usize;
        let phoff = read_u64(bytes, 32)? as usize;
        let phentsize = read_u16(bytes, 54)? as usize;
        let phnum = read_u16(bytes, 56)? as usize;
        if phentsize != PHDR_SIZE {
            return Err(BootError::ImageInvalid);
        }
        let table_size = phnum
            .checked_mul(PHDR_SIZE)
            .ok_or(BootError::ImageInvalid)?;
        let table_end = phoff.checked_add(table_size).ok_or(BootError::ImageInvalid)?;
        if table_end > bytes.len() {
            return Err(BootError::ImageInvalid);
        }

        // Parse all the program header entries, keeping the loadable ones.
        let mut segments = [None; MAX_SEGMENTS];
        let mut len = 0;
        for i in 0..phnum {
            let base = phoff + i * PHDR_SIZE;
            if read_u32(bytes, base)? != PT_LOAD {
                continue;
            }
            let p_flags = read_u32(bytes, base + 4)?;
            let offset = read_u64(bytes, base + 8)? as usize;
            let paddr = read_u64(bytes, base + 24)? as usize;
            let filesz = read_u64(bytes, base + 32)? as usize;
            let memsz = read_u64(bytes, base + 40)? as usize;

            if memsz < filesz {
                return Err(BootError::ImageInvalid);
            }
            let file_end = offset.checked_add(filesz).ok_or(BootError::ImageInvalid)?;
            if file_end > bytes.len() {
                return Err(BootError::ImageInvalid);
            }
            if len >= MAX_SEGMENTS {
                return Err(BootError::ImageInvalid);
            }
            segments[len] = Some(LoadSegment {
                offset,
                filesz,
                memsz,
                paddr: GuestPhysAddr::new(paddr),
                flags: flags_to_map(p_flags),
            });
            len += 1;
        }
        if len == 0 {
            return Err(BootError::ImageInvalid);
        }

        let image = Self {
            entry: GuestVirtAddr::new(entry),
            phys_entry: GuestPhysAddr::new(entry),
            bytes,
            segments,
            len,
        };

        // The declared entry point must land in a loadable segment.
        if !image.contains_entry() {
            return Err(BootError::ImageInvalid);
        }
        Ok(image)
    }

    pub fn segments(&self) -> impl Iterator<Item = &LoadSegment> {
        self.segments[..self.len].iter().filter_map(|s| s.as_ref())
    }

    fn contains_entry(&self) -> bool {
        let entry = self.phys_entry.as_usize();
        self.segments().any(|seg| {
            let start = seg.paddr.as_usize();
            match start.checked_add(seg.memsz) {
                Some(end) => entry >= start && entry < end,
                None => false,
            }
        })
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, BootError> {
    let end = offset.checked_add(2).ok_or(BootError::ImageInvalid)?;
    let slice = bytes.get(offset..end).ok_or(BootError::ImageInvalid)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, BootError> {
    let end = offset.checked_add(4).ok_or(BootError::ImageInvalid)?;
    let slice = bytes.get(offset..end).ok_or(BootError::ImageInvalid)?;
    let arr = slice.try_into().map_err(|_| BootError::ImageInvalid)?;
    Ok(u32::from_le_bytes(arr))
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, BootError> {
    let end = offset.checked_add(8).ok_or(BootError::ImageInvalid)?;
    let slice = bytes.get(offset..end).ok_or(BootError::ImageInvalid)?;
    let arr = slice.try_into().map_err(|_| BootError::ImageInvalid)?;
    Ok(u64::from_le_bytes(arr))
}

fn flags_to_map(flags: u32) -> MapFlags {
    let mut prots = MapFlags::empty();
    if flags & PF_R == PF_R {
        prots |= MapFlags::READ;
    }
    if flags & PF_W == PF_W {
        prots |= MapFlags::WRITE;
    }
    if flags & PF_X == PF_X {
        prots |= MapFlags::EXECUTE;
    }
    prots
}
