use {
    crate::{
        alignment_correction,
        block::MemoryBlock,
        error::{AllocationError, OutOfSpace},
        heap::Heap,
    },
    alloc::vec::Vec,
    chunk_alloc_types::{DeviceMapError, MemoryDevice, MemoryPropertyFlags},
    core::ptr::NonNull,
};

#[cfg(debug_assertions)]
use {crate::ranges_overlap, alloc::collections::BTreeMap};

/// Free byte range of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FreeRange {
    pub offset: u64,
    pub size: u64,
}

impl FreeRange {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// One memory object of fixed size carved into blocks.
#[derive(Debug)]
pub(crate) struct ChunkAllocator<M> {
    id: u64,
    memory_type: u32,
    props: MemoryPropertyFlags,
    memory: M,
    ptr: Option<NonNull<u8>>,
    size: u64,
    used: u64,

    /// Sorted by offset. Neighbouring ranges are never adjacent.
    free: Vec<FreeRange>,

    /// Offset to size of every block handed out and not yet returned.
    #[cfg(debug_assertions)]
    outstanding: BTreeMap<u64, u64>,
}

// `ptr` is the persistent mapping of `memory` owned by this chunk.
unsafe impl<M> Sync for ChunkAllocator<M> where M: Sync {}
unsafe impl<M> Send for ChunkAllocator<M> where M: Send {}

impl<M> ChunkAllocator<M> {
    /// Allocates memory object of `size` bytes from the device and wraps it.
    /// Host-visible memory is mapped for the whole lifetime of the chunk.
    pub unsafe fn new(
        device: &impl MemoryDevice<M>,
        id: u64,
        memory_type: u32,
        props: MemoryPropertyFlags,
        size: u64,
        heap: &mut Heap,
        allocations_remains: &mut u32,
    ) -> Result<Self, AllocationError> {
        if *allocations_remains == 0 {
            return Err(AllocationError::TooManyObjects);
        }

        if heap.budget() < size {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Heap budget {} is too low for new chunk of memory type {}",
                heap.budget(),
                memory_type
            );
            return Err(AllocationError::OutOfDeviceMemory);
        }

        let mut memory = device.allocate_memory(size, memory_type)?;
        *allocations_remains -= 1;
        heap.alloc(size);

        let ptr = if props.contains(MemoryPropertyFlags::HOST_VISIBLE) {
            match device.map_memory(&mut memory, 0, size) {
                Ok(ptr) => Some(ptr),
                Err(DeviceMapError::MapFailed) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "Failed to map host-visible chunk of memory type {}. Blocks will have no host pointer",
                        memory_type
                    );
                    None
                }
                Err(err) => {
                    device.deallocate_memory(memory);
                    *allocations_remains += 1;
                    heap.dealloc(size);

                    return Err(match err {
                        DeviceMapError::OutOfHostMemory => AllocationError::OutOfHostMemory,
                        _ => AllocationError::OutOfDeviceMemory,
                    });
                }
            }
        } else {
            None
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Chunk {} of {} bytes allocated for memory type {}",
            id,
            size,
            memory_type
        );

        Ok(Self::from_memory(id, memory_type, props, memory, ptr, size))
    }

    /// Wraps already allocated memory object.
    pub fn from_memory(
        id: u64,
        memory_type: u32,
        props: MemoryPropertyFlags,
        memory: M,
        ptr: Option<NonNull<u8>>,
        size: u64,
    ) -> Self {
        assert_ne!(size, 0, "Chunk size must not be zero");

        let mut free = Vec::new();
        free.push(FreeRange { offset: 0, size });

        ChunkAllocator {
            id,
            memory_type,
            props,
            memory,
            ptr,
            size,
            used: 0,
            free,
            #[cfg(debug_assertions)]
            outstanding: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn free_ranges(&self) -> &[FreeRange] {
        &self.free
    }

    /// Checks if no block from this chunk is outstanding.
    pub fn is_unused(&self) -> bool {
        self.used == 0
    }

    /// Carves block from the first free range that fits `size` bytes at `align`ed offset.
    /// Bytes skipped for alignment and bytes past the block stay free.
    pub fn alloc(&mut self, size: u64, align: u64) -> Result<MemoryBlock<M>, OutOfSpace>
    where
        M: Clone,
    {
        debug_assert_ne!(size, 0, "Block size must not be zero");
        debug_assert_ne!(align, 0, "Block alignment must not be zero");

        let found = self.free.iter().enumerate().find_map(|(index, range)| {
            let correction = alignment_correction(range.offset, align);
            let usable = range.size.checked_sub(correction)?;
            if usable >= size {
                Some((index, correction))
            } else {
                None
            }
        });

        let (index, correction) = found.ok_or(OutOfSpace)?;
        let range = self.free[index];
        let offset = range.offset + correction;
        let remainder = FreeRange {
            offset: offset + size,
            size: range.size - correction - size,
        };

        match (correction, remainder.size) {
            (0, 0) => {
                self.free.remove(index);
            }
            (0, _) => self.free[index] = remainder,
            (_, 0) => self.free[index].size = correction,
            (_, _) => {
                self.free[index].size = correction;
                self.free.insert(index + 1, remainder);
            }
        }

        #[cfg(debug_assertions)]
        self.track(offset, size);

        self.used += size;

        Ok(MemoryBlock {
            memory_type: self.memory_type,
            props: self.props,
            memory: self.memory.clone(),
            chunk: self.id,
            offset,
            size,
            ptr: self.ptr.map(|ptr| {
                // Mapping spans the whole chunk and `offset < self.size`.
                unsafe { NonNull::new_unchecked(ptr.as_ptr().add(offset as usize)) }
            }),
        })
    }

    /// Returns block's range to the free list merging it with adjacent free ranges.
    ///
    /// # Panics
    ///
    /// Panics if the block does not belong to this chunk or its range is already free.
    pub fn dealloc(&mut self, block: MemoryBlock<M>) {
        assert_eq!(
            block.chunk, self.id,
            "Memory block was not allocated from this chunk"
        );
        assert!(
            block.size != 0 && block.offset <= self.size && block.size <= self.size - block.offset,
            "Memory block [{}, {}) is out of chunk bounds",
            block.offset,
            block.offset.saturating_add(block.size),
        );

        let range = FreeRange {
            offset: block.offset,
            size: block.size,
        };

        #[cfg(debug_assertions)]
        self.untrack(range.offset, range.size);

        let index = self.free.partition_point(|free| free.offset < range.offset);

        if let Some(prev) = index.checked_sub(1).map(|prev| self.free[prev]) {
            assert!(
                prev.end() <= range.offset,
                "Memory block [{}, {}) overlaps free range [{}, {}). Double free?",
                range.offset,
                range.end(),
                prev.offset,
                prev.end(),
            );
        }

        if let Some(next) = self.free.get(index) {
            assert!(
                range.end() <= next.offset,
                "Memory block [{}, {}) overlaps free range [{}, {}). Double free?",
                range.offset,
                range.end(),
                next.offset,
                next.end(),
            );
        }

        let merge_prev = index > 0 && self.free[index - 1].end() == range.offset;
        let merge_next = self
            .free
            .get(index)
            .map_or(false, |next| next.offset == range.end());

        match (merge_prev, merge_next) {
            (true, true) => {
                let next = self.free.remove(index);
                self.free[index - 1].size += range.size + next.size;
            }
            (true, false) => self.free[index - 1].size += range.size,
            (false, true) => {
                let next = &mut self.free[index];
                next.offset = range.offset;
                next.size += range.size;
            }
            (false, false) => self.free.insert(index, range),
        }

        self.used -= range.size;
    }

    /// Returns memory object to the device.
    pub unsafe fn release(
        mut self,
        device: &impl MemoryDevice<M>,
        heap: &mut Heap,
        allocations_remains: &mut u32,
    ) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Chunk {} of memory type {} released with {} bytes in use",
            self.id,
            self.memory_type,
            self.used
        );

        if self.ptr.take().is_some() {
            device.unmap_memory(&mut self.memory);
        }
        device.deallocate_memory(self.memory);
        *allocations_remains += 1;
        heap.dealloc(self.size);
    }

    #[cfg(debug_assertions)]
    fn track(&mut self, offset: u64, size: u64) {
        // Outstanding ranges are disjoint, so the one starting last before `offset + size`
        // is the only candidate for overlap.
        if let Some((&other_offset, &other_size)) =
            self.outstanding.range(..offset + size).next_back()
        {
            assert!(
                !ranges_overlap(offset, size, other_offset, other_size),
                "Allocated blocks overlap: [{}, {}) and [{}, {})",
                offset,
                offset + size,
                other_offset,
                other_offset + other_size,
            );
        }
        self.outstanding.insert(offset, size);
    }

    #[cfg(debug_assertions)]
    fn untrack(&mut self, offset: u64, size: u64) {
        match self.outstanding.remove(&offset) {
            Some(tracked) if tracked == size => {}
            Some(tracked) => panic!(
                "Memory block at {} has size {} but {} bytes were allocated there",
                offset, size, tracked
            ),
            None => panic!(
                "Memory block at {} is not allocated from chunk {}",
                offset, self.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(size: u64) -> ChunkAllocator<()> {
        ChunkAllocator::from_memory(0, 0, MemoryPropertyFlags::empty(), (), None, size)
    }

    fn free(chunk: &ChunkAllocator<()>) -> Vec<(u64, u64)> {
        chunk
            .free_ranges()
            .iter()
            .map(|range| (range.offset, range.size))
            .collect()
    }

    fn forged(offset: u64, size: u64) -> MemoryBlock<()> {
        MemoryBlock {
            memory_type: 0,
            props: MemoryPropertyFlags::empty(),
            memory: (),
            chunk: 0,
            offset,
            size,
            ptr: None,
        }
    }

    #[test]
    fn first_fit_reuses_freed_range() {
        let mut chunk = chunk(1024);

        let first = chunk.alloc(100, 1).unwrap();
        assert_eq!((first.offset(), first.size()), (0, 100));

        let second = chunk.alloc(200, 1).unwrap();
        assert_eq!((second.offset(), second.size()), (100, 200));

        chunk.dealloc(first);

        let third = chunk.alloc(50, 1).unwrap();
        assert_eq!((third.offset(), third.size()), (0, 50));
        assert_eq!(free(&chunk), vec![(50, 50), (300, 724)]);
        assert_eq!(chunk.used(), 250);
    }

    #[test]
    fn split_conserves_bytes() {
        let mut chunk = chunk(1024);
        let _head = chunk.alloc(10, 1).unwrap();
        assert_eq!(free(&chunk), vec![(10, 1014)]);

        let block = chunk.alloc(100, 64).unwrap();
        assert_eq!(block.offset(), 64);

        let correction = 64 - 10;
        let remainder = chunk.free_ranges()[1];
        assert_eq!(remainder.offset, block.end());
        assert_eq!(block.size() + remainder.size, 1014 - correction);

        // Skipped bytes stay available.
        assert_eq!(chunk.free_ranges()[0], FreeRange { offset: 10, size: 54 });
    }

    #[test]
    fn exact_fit_consumes_free_range() {
        let mut chunk = chunk(256);
        let block = chunk.alloc(256, 1).unwrap();
        assert_eq!((block.offset(), block.size()), (0, 256));
        assert!(chunk.free_ranges().is_empty());
        assert_eq!(chunk.alloc(1, 1).unwrap_err(), OutOfSpace);
    }

    #[test]
    fn exhaustion() {
        for &count in &[1u64, 2, 4, 8, 16, 64] {
            let mut chunk = chunk(1024);
            let blocks: Vec<_> = (0..count)
                .map(|_| chunk.alloc(1024 / count, 1).unwrap())
                .collect();

            assert_eq!(blocks.len() as u64, count);
            assert_eq!(chunk.alloc(1, 1).unwrap_err(), OutOfSpace);

            for block in blocks {
                chunk.dealloc(block);
            }
            assert_eq!(free(&chunk), vec![(0, 1024)]);
            assert!(chunk.is_unused());
        }
    }

    #[test]
    fn alignment_rejects_candidate_too_small_after_correction() {
        let mut chunk = chunk(1024);
        let _a = chunk.alloc(1, 1).unwrap();
        let b = chunk.alloc(40, 1).unwrap();
        let _c = chunk.alloc(983, 1).unwrap();
        chunk.dealloc(b);
        assert_eq!(free(&chunk), vec![(1, 40)]);

        // [1, 41) holds 40 bytes but only 9 of them start at a multiple of 32.
        assert_eq!(chunk.alloc(10, 32).unwrap_err(), OutOfSpace);

        let block = chunk.alloc(9, 32).unwrap();
        assert_eq!((block.offset(), block.size()), (32, 9));
        assert_eq!(free(&chunk), vec![(1, 31)]);
    }

    #[test]
    fn non_power_of_two_alignment() {
        let mut chunk = chunk(1000);
        let _head = chunk.alloc(7, 1).unwrap();
        let block = chunk.alloc(30, 12).unwrap();
        assert_eq!(block.offset() % 12, 0);
        assert_eq!(block.offset(), 12);
    }

    #[test]
    fn dealloc_merges_both_neighbours() {
        let mut chunk = chunk(300);
        let a = chunk.alloc(100, 1).unwrap();
        let b = chunk.alloc(100, 1).unwrap();
        let c = chunk.alloc(100, 1).unwrap();

        chunk.dealloc(a);
        chunk.dealloc(c);
        assert_eq!(free(&chunk), vec![(0, 100), (200, 100)]);

        chunk.dealloc(b);
        assert_eq!(free(&chunk), vec![(0, 300)]);

        let whole = chunk.alloc(300, 1).unwrap();
        assert_eq!(whole.offset(), 0);
    }

    #[test]
    fn dealloc_keeps_free_list_sorted() {
        let mut chunk = chunk(500);
        let blocks: Vec<_> = (0..5).map(|_| chunk.alloc(100, 1).unwrap()).collect();
        let mut blocks = blocks.into_iter();
        let b0 = blocks.next().unwrap();
        let b1 = blocks.next().unwrap();
        let b2 = blocks.next().unwrap();
        let b3 = blocks.next().unwrap();
        let _b4 = blocks.next().unwrap();

        chunk.dealloc(b3);
        chunk.dealloc(b0);
        assert_eq!(free(&chunk), vec![(0, 100), (300, 100)]);

        chunk.dealloc(b2);
        assert_eq!(free(&chunk), vec![(0, 100), (200, 200)]);

        chunk.dealloc(b1);
        assert_eq!(free(&chunk), vec![(0, 400)]);
    }

    #[test]
    fn randomized_churn_keeps_blocks_disjoint_and_aligned() {
        const SIZE: u64 = 64 * 1024;

        let mut chunk = chunk(SIZE);
        let mut live: Vec<MemoryBlock<()>> = Vec::new();
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..5000 {
            if live.is_empty() || next() % 3 != 0 {
                let size = next() % 700 + 1;
                let align = [1, 4, 16, 256, 3, 24][(next() % 6) as usize];
                if let Ok(block) = chunk.alloc(size, align) {
                    assert_eq!(block.offset() % align, 0);
                    assert!(block.end() <= SIZE);
                    assert!(live.iter().all(|other| !other.overlaps(&block)));
                    live.push(block);
                }
            } else {
                let index = (next() % live.len() as u64) as usize;
                chunk.dealloc(live.swap_remove(index));
            }

            let free = chunk.free_ranges();
            assert!(free.windows(2).all(|pair| pair[0].end() < pair[1].offset));
            let free_bytes: u64 = free.iter().map(|range| range.size).sum();
            assert_eq!(free_bytes + chunk.used(), SIZE);
        }

        for block in live {
            chunk.dealloc(block);
        }
        assert_eq!(free(&chunk), vec![(0, SIZE)]);
    }

    #[test]
    #[should_panic]
    fn double_free_panics() {
        let mut chunk = chunk(1024);
        let _keep = chunk.alloc(10, 1).unwrap();
        let block = chunk.alloc(100, 1).unwrap();
        let (offset, size) = (block.offset(), block.size());
        chunk.dealloc(block);
        chunk.dealloc(forged(offset, size));
    }

    #[test]
    #[should_panic(expected = "not allocated from this chunk")]
    fn foreign_block_panics() {
        let mut chunk = chunk(1024);
        let mut block = chunk.alloc(100, 1).unwrap();
        block.chunk = 1;
        chunk.dealloc(block);
    }

    #[test]
    #[should_panic(expected = "out of chunk bounds")]
    fn out_of_bounds_block_panics() {
        let mut chunk = chunk(1024);
        chunk.dealloc(forged(1000, 100));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "is not allocated from chunk")]
    fn freeing_never_allocated_range_panics() {
        let mut chunk = chunk(1024);
        let _a = chunk.alloc(100, 1).unwrap();
        let _b = chunk.alloc(100, 1).unwrap();
        // Overlaps no free range, but was never handed out.
        chunk.dealloc(forged(50, 100));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "Allocated blocks overlap")]
    fn corrupted_free_list_is_caught_on_alloc() {
        let mut chunk = chunk(1024);
        let _a = chunk.alloc(100, 1).unwrap();
        chunk.free.insert(0, FreeRange { offset: 50, size: 20 });
        let _b = chunk.alloc(10, 1).unwrap();
    }
}
