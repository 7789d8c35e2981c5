use {
    crate::{block::MemoryBlock, chunk::ChunkAllocator, error::AllocationError, heap::Heap},
    alloc::vec::Vec,
    chunk_alloc_types::{MemoryDevice, MemoryPropertyFlags},
};

/// Occupancy of one memory type pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PoolStats {
    /// Number of chunks held by the pool.
    pub chunks: usize,

    /// Sum of all chunk sizes.
    pub chunk_bytes: u64,

    /// Bytes in outstanding blocks.
    pub used_bytes: u64,

    /// Number of free ranges across all chunks.
    /// Grows with fragmentation.
    pub free_ranges: usize,
}

/// Pool of chunks of one memory type.
/// Grows by one chunk whenever no existing chunk can serve a request.
#[derive(Debug)]
pub(crate) struct ChunkAllocatorSet<M> {
    memory_type: u32,
    props: MemoryPropertyFlags,
    chunk_size: u64,
    next_chunk_id: u64,
    chunks: Vec<ChunkAllocator<M>>,
}

impl<M> ChunkAllocatorSet<M> {
    pub fn new(memory_type: u32, props: MemoryPropertyFlags, chunk_size: u64) -> Self {
        ChunkAllocatorSet {
            memory_type,
            props,
            chunk_size,
            next_chunk_id: 0,
            chunks: Vec::new(),
        }
    }

    pub unsafe fn alloc(
        &mut self,
        device: &impl MemoryDevice<M>,
        size: u64,
        align: u64,
        heap: &mut Heap,
        allocations_remains: &mut u32,
    ) -> Result<MemoryBlock<M>, AllocationError>
    where
        M: Clone,
    {
        // Fresh chunk serves any alignment at offset 0,
        // so only the size decides whether growing could ever help.
        if size > self.chunk_size {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "Request of {} bytes exceeds chunk size {} of memory type {}",
                size,
                self.chunk_size,
                self.memory_type
            );
            return Err(AllocationError::UnsupportedSize);
        }

        for chunk in &mut self.chunks {
            if let Ok(block) = chunk.alloc(size, align) {
                return Ok(block);
            }
        }

        let mut chunk = ChunkAllocator::new(
            device,
            self.next_chunk_id,
            self.memory_type,
            self.props,
            self.chunk_size,
            heap,
            allocations_remains,
        )?;
        self.next_chunk_id += 1;

        let result = chunk
            .alloc(size, align)
            .map_err(|_| AllocationError::UnsupportedSize);
        self.chunks.push(chunk);
        result
    }

    /// # Panics
    ///
    /// Panics if block was not allocated from this pool.
    pub fn dealloc(&mut self, block: MemoryBlock<M>) {
        match self.chunks.iter_mut().find(|chunk| chunk.id() == block.chunk) {
            Some(chunk) => chunk.dealloc(block),
            None => panic!(
                "Memory block from chunk {} does not belong to pool of memory type {}",
                block.chunk, self.memory_type
            ),
        }
    }

    /// Releases chunks with no outstanding blocks.
    /// Returns number of released chunks.
    pub unsafe fn trim(
        &mut self,
        device: &impl MemoryDevice<M>,
        heap: &mut Heap,
        allocations_remains: &mut u32,
    ) -> usize {
        let mut released = 0;
        let mut index = 0;
        while index < self.chunks.len() {
            if self.chunks[index].is_unused() {
                self.chunks
                    .remove(index)
                    .release(device, heap, allocations_remains);
                released += 1;
            } else {
                index += 1;
            }
        }
        released
    }

    /// Releases all chunks regardless of outstanding blocks.
    pub unsafe fn cleanup(
        &mut self,
        device: &impl MemoryDevice<M>,
        heap: &mut Heap,
        allocations_remains: &mut u32,
    ) {
        for chunk in self.chunks.drain(..) {
            #[cfg(feature = "tracing")]
            if !chunk.is_unused() {
                tracing::warn!(
                    "Chunk {} of memory type {} released while {} bytes are still in use",
                    chunk.id(),
                    self.memory_type,
                    chunk.used()
                );
            }

            chunk.release(device, heap, allocations_remains);
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.chunks.iter().fold(PoolStats::default(), |stats, chunk| PoolStats {
            chunks: stats.chunks + 1,
            chunk_bytes: stats.chunk_bytes + chunk.size(),
            used_bytes: stats.used_bytes + chunk.used(),
            free_ranges: stats.free_ranges + chunk.free_ranges().len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloc::borrow::Cow,
        chunk_alloc_mock::MockMemoryDevice,
        chunk_alloc_types::{DeviceProperties, MemoryHeap, MemoryType},
    };

    fn device() -> MockMemoryDevice {
        MockMemoryDevice::new(DeviceProperties {
            memory_types: Cow::Borrowed(&[MemoryType {
                heap: 0,
                props: MemoryPropertyFlags::DEVICE_LOCAL,
            }]),
            memory_heaps: Cow::Borrowed(&[MemoryHeap { size: 1024 * 1024 }]),
            max_memory_allocation_count: 8,
            max_memory_allocation_size: 1024 * 1024,
        })
    }

    struct Fixture {
        device: MockMemoryDevice,
        set: ChunkAllocatorSet<usize>,
        heap: Heap,
        allocations_remains: u32,
    }

    impl Fixture {
        fn new(chunk_size: u64) -> Self {
            Fixture {
                device: device(),
                set: ChunkAllocatorSet::new(0, MemoryPropertyFlags::DEVICE_LOCAL, chunk_size),
                heap: Heap::new(1024 * 1024),
                allocations_remains: 8,
            }
        }

        fn alloc(&mut self, size: u64, align: u64) -> Result<MemoryBlock<usize>, AllocationError> {
            unsafe {
                self.set.alloc(
                    &self.device,
                    size,
                    align,
                    &mut self.heap,
                    &mut self.allocations_remains,
                )
            }
        }

        fn trim(&mut self) -> usize {
            unsafe {
                self.set
                    .trim(&self.device, &mut self.heap, &mut self.allocations_remains)
            }
        }
    }

    #[test]
    fn grows_only_when_chunks_are_full() {
        let mut fixture = Fixture::new(1024);

        let a = fixture.alloc(1000, 1).unwrap();
        let b = fixture.alloc(24, 1).unwrap();
        assert_eq!(a.chunk(), b.chunk());
        assert_eq!(fixture.device.total_allocations(), 1);

        let c = fixture.alloc(1, 1).unwrap();
        assert_ne!(c.chunk(), a.chunk());
        assert_eq!(fixture.device.total_allocations(), 2);
        assert_eq!(fixture.set.stats().chunks, 2);
    }

    #[test]
    fn earlier_chunks_are_tried_first() {
        let mut fixture = Fixture::new(1024);

        let a = fixture.alloc(1024, 1).unwrap();
        let b = fixture.alloc(512, 1).unwrap();
        assert_ne!(a.chunk(), b.chunk());

        let first_chunk = a.chunk();
        fixture.set.dealloc(a);

        let c = fixture.alloc(16, 1).unwrap();
        assert_eq!(c.chunk(), first_chunk);
        assert_eq!(c.offset(), 0);
    }

    #[test]
    fn oversized_request_creates_no_chunk() {
        let mut fixture = Fixture::new(1024);

        assert_eq!(
            fixture.alloc(1025, 1).unwrap_err(),
            AllocationError::UnsupportedSize
        );
        assert_eq!(fixture.device.total_allocations(), 0);
        assert_eq!(fixture.set.stats(), PoolStats::default());
    }

    #[test]
    fn chunk_size_request_with_large_alignment_fits_fresh_chunk() {
        let mut fixture = Fixture::new(1024);
        let _head = fixture.alloc(1, 1).unwrap();

        let block = fixture.alloc(1024, 4096).unwrap();
        assert_eq!(block.offset(), 0);
        assert_eq!(fixture.set.stats().chunks, 2);
    }

    #[test]
    fn device_limit_is_reported() {
        let mut fixture = Fixture::new(1024);
        fixture.allocations_remains = 1;

        let _a = fixture.alloc(1024, 1).unwrap();
        assert_eq!(
            fixture.alloc(1, 1).unwrap_err(),
            AllocationError::TooManyObjects
        );
    }

    #[test]
    fn trim_releases_only_unused_chunks() {
        let mut fixture = Fixture::new(1024);

        let a = fixture.alloc(1024, 1).unwrap();
        let b = fixture.alloc(1024, 1).unwrap();
        let c = fixture.alloc(1024, 1).unwrap();

        fixture.set.dealloc(a);
        fixture.set.dealloc(c);
        assert_eq!(fixture.trim(), 2);
        assert_eq!(fixture.device.total_deallocations(), 2);
        assert_eq!(fixture.allocations_remains, 7);
        assert_eq!(fixture.heap.usage().used, 1024);

        // Identities are never reused.
        let d = fixture.alloc(1024, 1).unwrap();
        assert_eq!(d.chunk(), 3);

        fixture.set.dealloc(b);
        fixture.set.dealloc(d);
        assert_eq!(fixture.trim(), 2);
        assert_eq!(fixture.set.stats().chunks, 0);
        assert_eq!(fixture.device.live_allocations(), 0);
    }

    #[test]
    #[should_panic(expected = "does not belong to pool")]
    fn foreign_chunk_panics() {
        let mut fixture = Fixture::new(1024);
        let mut block = fixture.alloc(10, 1).unwrap();
        block.chunk = 42;
        fixture.set.dealloc(block);
    }
}
