//! Address representation

use core::fmt;
use core::ops::Add;

/// A macro for implementing addresses types.
///
/// An address is just a wrapper around an `usize`, with getter and setter methods.
macro_rules! addr_impl {
    ($name:ident) => {
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0 as u64
            }

            /// Creates an address that points to `0`.
            #[inline]
            pub const fn zero() -> Self {
                Self(0)
            }

            /// Aligns address downwards.
            #[inline]
            pub const fn align_down(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "`align` must be a power of two");
                let aligned = self.as_usize() & !(align - 1);
                Self::new(aligned)
            }

            /// Aligns address upwards.
            #[inline]
            pub const fn align_up(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "`align` must be a power of two");
                let align_mask = align - 1;
                let addr = self.as_usize();
                if addr & align_mask == 0 {
                    self // already aligned
                } else {
                    if let Some(aligned) = (addr | align_mask).checked_add(1) {
                        Self::new(aligned)
                    } else {
                        panic!("Attempt to add with overflow");
                    }
                }
            }

            /// Offsets the address by `offset` bytes, checking for overflow.
            #[inline]
            pub fn checked_add(self, offset: usize) -> Option<Self> {
                self.0.checked_add(offset).map(Self::new)
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            fn add(self, rhs: usize) -> Self {
                Self::new(self.0 + rhs)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}(0x{:x})", core::stringify!($name), self.0)
            }
        }
    };
}

addr_impl!(GuestPhysAddr);
addr_impl!(GuestVirtAddr);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        let addr = GuestPhysAddr::new(0x1234);
        assert_eq!(addr.align_down(0x1000).as_usize(), 0x1000);
        assert_eq!(addr.align_up(0x1000).as_usize(), 0x2000);
        assert_eq!(GuestPhysAddr::new(0x2000).align_up(0x1000).as_usize(), 0x2000);
    }

    #[test]
    fn checked_add() {
        let addr = GuestPhysAddr::new(usize::MAX);
        assert!(addr.checked_add(1).is_none());
        assert_eq!(
            GuestPhysAddr::new(0x1000).checked_add(0x10).unwrap(),
            GuestPhysAddr::new(0x1010)
        );
    }
}
