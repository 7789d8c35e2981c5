use {crate::ranges_overlap, chunk_alloc_types::MemoryPropertyFlags, core::ptr::NonNull};

/// Contiguous byte range inside one chunk of device memory.
///
/// Blocks are exclusively owned by whoever requested them
/// and must be returned to the same `DeviceMemoryManager` with `dealloc`.
#[derive(Debug)]
pub struct MemoryBlock<M> {
    pub(crate) memory_type: u32,
    pub(crate) props: MemoryPropertyFlags,
    pub(crate) memory: M,
    pub(crate) chunk: u64,
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) ptr: Option<NonNull<u8>>,
}

// `ptr` points into the persistent mapping of the chunk which lives as long as the chunk.
unsafe impl<M> Sync for MemoryBlock<M> where M: Sync {}
unsafe impl<M> Send for MemoryBlock<M> where M: Send {}

impl<M> MemoryBlock<M> {
    /// Returns reference to parent memory object.
    #[inline(always)]
    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Returns offset in bytes from start of memory object to start of this block.
    #[inline(always)]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns size of this memory block.
    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns offset in bytes from start of memory object to the first byte past this block.
    #[inline(always)]
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Returns memory property flags for parent memory object.
    #[inline(always)]
    pub fn props(&self) -> MemoryPropertyFlags {
        self.props
    }

    /// Returns index of type of parent memory object.
    #[inline(always)]
    pub fn memory_type(&self) -> u32 {
        self.memory_type
    }

    /// Returns identity of the chunk this block was carved from.
    /// Identities are unique within one memory type pool.
    #[inline(always)]
    pub fn chunk(&self) -> u64 {
        self.chunk
    }

    /// Returns pointer to the first byte of this block
    /// if parent memory object is persistently mapped.
    ///
    /// The user of returned pointer must guarantee that any previously submitted command
    /// that accesses this range has completed before the host accesses it.
    /// If the memory type lacks `HOST_COHERENT` property
    /// host writes must be flushed before the device reads them.
    #[inline(always)]
    pub fn mapped_ptr(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    /// Checks if this block shares any byte with `other`.
    /// Blocks from different chunks never overlap.
    pub fn overlaps(&self, other: &MemoryBlock<M>) -> bool {
        self.memory_type == other.memory_type
            && self.chunk == other.chunk
            && ranges_overlap(self.offset, self.size, other.offset, other.size)
    }
}
