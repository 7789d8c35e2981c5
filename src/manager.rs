use {
    crate::{
        block::MemoryBlock,
        config::Config,
        error::AllocationError,
        heap::{Heap, HeapUsage},
        set::{ChunkAllocatorSet, PoolStats},
        round_up, Request,
    },
    alloc::boxed::Box,
    chunk_alloc_types::{DeviceProperties, MemoryDevice, MemoryType},
};

/// Entry point for all device memory allocations.
///
/// Keeps one pool of fixed-size chunks per memory type,
/// created on the first request for that memory type.
/// Chunks are returned to the device only by [`trim`] and [`cleanup`].
///
/// [`trim`]: DeviceMemoryManager::trim
/// [`cleanup`]: DeviceMemoryManager::cleanup
#[derive(Debug)]
pub struct DeviceMemoryManager<M> {
    chunk_size: u64,
    granularity: u64,
    memory_types: Box<[MemoryType]>,
    memory_heaps: Box<[Heap]>,
    allocations_remains: u32,
    pools: Box<[Option<ChunkAllocatorSet<M>>]>,
}

impl<M> DeviceMemoryManager<M> {
    /// Creates new instance of `DeviceMemoryManager`.
    /// Provided `DeviceProperties` should match properties of `MemoryDevice` that will be used
    /// with created `DeviceMemoryManager` instance.
    ///
    /// Zero `max_memory_allocation_size` is treated as "no limit".
    #[cfg_attr(feature = "tracing", tracing::instrument)]
    pub fn new(config: Config, props: DeviceProperties<'_>) -> Self {
        assert_ne!(config.chunk_size, 0, "`chunk_size` must not be zero");
        assert_ne!(config.granularity, 0, "`granularity` must not be zero");

        let chunk_size = match props.max_memory_allocation_size {
            0 => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Device reports zero `max_memory_allocation_size`, ignoring it");
                config.chunk_size
            }
            limit => config.chunk_size.min(limit),
        };

        DeviceMemoryManager {
            chunk_size,
            granularity: config.granularity,
            memory_heaps: props
                .memory_heaps
                .iter()
                .map(|heap| Heap::new(heap.size))
                .collect(),
            allocations_remains: props.max_memory_allocation_count,
            pools: props.memory_types.iter().map(|_| None).collect(),
            memory_types: props.memory_types.iter().copied().collect(),
        }
    }

    /// Returns size of chunks requested from the device.
    /// This is the largest block size this instance can serve.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Allocates memory block from specified `device` according to the `request`.
    /// Size of the returned block is `request.size` rounded up to `Config::granularity`.
    ///
    /// # Panics
    ///
    /// Panics if `request.size` or `request.align` is zero.
    ///
    /// # Safety
    ///
    /// * `device` must be one with `DeviceProperties` that were provided to create this `DeviceMemoryManager` instance.
    /// * Same `device` instance must be used for all interactions with one `DeviceMemoryManager` instance
    ///   and memory blocks allocated from it.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, device)))]
    pub unsafe fn alloc(
        &mut self,
        device: &impl MemoryDevice<M>,
        request: Request,
    ) -> Result<MemoryBlock<M>, AllocationError>
    where
        M: Clone,
    {
        assert_ne!(request.size, 0, "Requested size must not be zero");
        assert_ne!(request.align, 0, "Requested alignment must not be zero");

        let index = request.memory_type as usize;
        let memory_type = match self.memory_types.get(index) {
            Some(memory_type) => *memory_type,
            None => return Err(AllocationError::NoSuchMemoryType),
        };

        let size = match round_up(request.size, self.granularity) {
            Some(size) => size,
            None => return Err(AllocationError::UnsupportedSize),
        };

        let chunk_size = self.chunk_size;
        let pool = self.pools[index].get_or_insert_with(|| {
            ChunkAllocatorSet::new(request.memory_type, memory_type.props, chunk_size)
        });

        pool.alloc(
            device,
            size,
            request.align,
            &mut self.memory_heaps[memory_type.heap as usize],
            &mut self.allocations_remains,
        )
    }

    /// Deallocates memory block previously allocated from this `DeviceMemoryManager` instance.
    /// The block's range becomes available to following allocations immediately,
    /// so the device must be done using it.
    ///
    /// # Panics
    ///
    /// Panics if the block was not allocated from this instance or was already deallocated.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, block), fields(memory_type = block.memory_type, chunk = block.chunk, offset = block.offset, size = block.size))
    )]
    pub fn dealloc(&mut self, block: MemoryBlock<M>) {
        let pool = self
            .pools
            .get_mut(block.memory_type as usize)
            .and_then(Option::as_mut);

        match pool {
            Some(pool) => pool.dealloc(block),
            None => panic!(
                "Memory block of memory type {} was not allocated from this manager",
                block.memory_type
            ),
        }
    }

    /// Returns every chunk without outstanding blocks to the device.
    /// Returns number of released chunks.
    ///
    /// # Safety
    ///
    /// * `device` must be one with `DeviceProperties` that were provided to create this `DeviceMemoryManager` instance
    /// * Same `device` instance must be used for all interactions with one `DeviceMemoryManager` instance
    ///   and memory blocks allocated from it
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, device)))]
    pub unsafe fn trim(&mut self, device: &impl MemoryDevice<M>) -> usize {
        let mut released = 0;
        for (pool, memory_type) in self.pools.iter_mut().zip(self.memory_types.iter()) {
            if let Some(pool) = pool {
                released += pool.trim(
                    device,
                    &mut self.memory_heaps[memory_type.heap as usize],
                    &mut self.allocations_remains,
                );
            }
        }
        released
    }

    /// Returns all chunks to the device.
    /// Blocks still outstanding become dangling and must not be used or deallocated.
    ///
    /// # Safety
    ///
    /// * `device` must be one with `DeviceProperties` that were provided to create this `DeviceMemoryManager` instance
    /// * Same `device` instance must be used for all interactions with one `DeviceMemoryManager` instance
    ///   and memory blocks allocated from it
    /// * No resource may still be bound to memory of this instance.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, device)))]
    pub unsafe fn cleanup(&mut self, device: &impl MemoryDevice<M>) {
        for (pool, memory_type) in self.pools.iter_mut().zip(self.memory_types.iter()) {
            if let Some(mut pool) = pool.take() {
                pool.cleanup(
                    device,
                    &mut self.memory_heaps[memory_type.heap as usize],
                    &mut self.allocations_remains,
                );
            }
        }
    }

    /// Returns occupancy of the pool for `memory_type`.
    /// Pools not created yet report zeroes.
    pub fn pool_stats(&self, memory_type: u32) -> PoolStats {
        self.pools
            .get(memory_type as usize)
            .and_then(Option::as_ref)
            .map_or_else(PoolStats::default, ChunkAllocatorSet::stats)
    }

    /// Returns chunk accounting for memory heap at `heap` index.
    pub fn heap_usage(&self, heap: u32) -> Option<HeapUsage> {
        self.memory_heaps.get(heap as usize).map(Heap::usage)
    }
}
