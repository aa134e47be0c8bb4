#![cfg_attr(not(test), no_std)]

mod address;

pub use address::{GuestPhysAddr, GuestVirtAddr};
