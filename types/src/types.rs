bitflags::bitflags! {
    /// Memory properties type.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MemoryPropertyFlags: u8 {
        /// This flag is set for device-local memory types.
        /// Device-local memory is situated "close" to the GPU cores
        /// and allows for fast access.
        const DEVICE_LOCAL = 0x01;

        /// This flag is set for host-visible memory types.
        /// Chunks of such memory types are mapped once on creation
        /// and blocks carved from them expose a host pointer.
        const HOST_VISIBLE = 0x02;

        /// This flag is set for coherent memory types.
        /// Host writes to coherent memory become visible to the device
        /// without explicit flushing.
        const HOST_COHERENT = 0x04;

        /// This flag is set for cached memory types.
        /// Cached memory is fast for host reads.
        const HOST_CACHED = 0x08;

        /// This flag is set for lazily-allocated memory types.
        const LAZILY_ALLOCATED = 0x10;

        /// This flag is set for protected memory types.
        const PROTECTED = 0x20;
    }
}

/// Defines memory type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryType {
    /// Heap index of the memory type.
    pub heap: u32,

    /// Property flags of the memory type.
    pub props: MemoryPropertyFlags,
}

/// Defines memory heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryHeap {
    /// Size of memory heap in bytes.
    pub size: u64,
}
