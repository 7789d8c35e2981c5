//!
//! Chunked device memory sub-allocator for Vulkan like APIs.
//!
//! Device memory is requested from the device in fixed-size chunks,
//! one pool of chunks per memory type.
//! Each chunk is carved into blocks by a first-fit free list
//! that honours arbitrary alignment and merges neighbouring free ranges back on deallocation.
//!

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod block;
mod chunk;
mod config;
mod error;
mod heap;
mod manager;
mod set;

pub use {
    self::{block::*, config::*, error::*, heap::HeapUsage, manager::*, set::PoolStats},
    chunk_alloc_types::*,
};

/// Memory request for allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Request {
    /// Index of the memory type to allocate from.
    /// Choosing a memory type suitable for a resource is up to the caller.
    pub memory_type: u32,

    /// Size of memory block required in bytes.
    /// Must not be zero.
    pub size: u64,

    /// Alignment required for block offset.
    /// Must not be zero. Need not be a power of two.
    pub align: u64,
}

/// Returns how many bytes `offset` must be moved forward to become a multiple of `align`.
pub(crate) fn alignment_correction(offset: u64, align: u64) -> u64 {
    match offset % align {
        0 => 0,
        rem => align - rem,
    }
}

/// Rounds `value` up to a multiple of `granularity`.
/// Returns `None` on overflow.
pub(crate) fn round_up(value: u64, granularity: u64) -> Option<u64> {
    Some(value.checked_add(granularity - 1)? / granularity * granularity)
}

/// Checks if two byte ranges intersect.
pub(crate) fn ranges_overlap(lhs_offset: u64, lhs_size: u64, rhs_offset: u64, rhs_size: u64) -> bool {
    lhs_offset < rhs_offset + rhs_size && rhs_offset < lhs_offset + lhs_size
}
