use {
    chunk_alloc_types::{
        DeviceMapError, DeviceProperties, MemoryDevice, MemoryHeap, MemoryPropertyFlags,
        MemoryType, OutOfMemory,
    },
    slab::Slab,
    std::{
        borrow::Cow,
        cell::{Cell, RefCell},
        convert::TryFrom as _,
        ptr::NonNull,
    },
};

struct MockMemory {
    memory_type: u32,
    size: u64,
    mapped: Option<Box<[u8]>>,
}

/// Device that backs memory objects with host allocations
/// and checks every call against the `MemoryDevice` contract.
///
/// Zero `max_memory_allocation_size` disables the size check.
pub struct MockMemoryDevice {
    memory_types: Box<[MemoryType]>,
    memory_heaps: Box<[MemoryHeap]>,
    max_memory_allocation_count: u32,
    max_memory_allocation_size: u64,

    allocations_remains: Cell<u32>,
    memory_heaps_remaining_capacity: Box<[Cell<u64>]>,
    allocations: RefCell<Slab<MockMemory>>,
    fail_mapping: Cell<bool>,

    total_allocations_counter: Cell<u64>,
    total_deallocations_counter: Cell<u64>,
}

impl MockMemoryDevice {
    pub fn new(props: DeviceProperties<'_>) -> Self {
        MockMemoryDevice {
            memory_heaps_remaining_capacity: props
                .memory_heaps
                .iter()
                .map(|heap| Cell::new(heap.size))
                .collect(),

            memory_types: props.memory_types.into_owned().into_boxed_slice(),
            memory_heaps: props.memory_heaps.into_owned().into_boxed_slice(),
            max_memory_allocation_count: props.max_memory_allocation_count,
            max_memory_allocation_size: props.max_memory_allocation_size,

            allocations_remains: Cell::new(props.max_memory_allocation_count),
            allocations: RefCell::new(Slab::new()),
            fail_mapping: Cell::new(false),

            total_allocations_counter: Cell::new(0),
            total_deallocations_counter: Cell::new(0),
        }
    }

    pub fn props(&self) -> DeviceProperties<'_> {
        DeviceProperties {
            memory_types: Cow::Borrowed(&self.memory_types),
            memory_heaps: Cow::Borrowed(&self.memory_heaps),
            max_memory_allocation_count: self.max_memory_allocation_count,
            max_memory_allocation_size: self.max_memory_allocation_size,
        }
    }

    /// Makes following `map_memory` calls fail with `DeviceMapError::MapFailed`.
    pub fn set_fail_mapping(&self, fail: bool) {
        self.fail_mapping.set(fail);
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations_counter.get()
    }

    pub fn total_deallocations(&self) -> u64 {
        self.total_deallocations_counter.get()
    }

    /// Number of memory objects currently allocated.
    pub fn live_allocations(&self) -> usize {
        self.allocations.borrow().len()
    }

    /// Checks if memory object is currently mapped.
    pub fn is_mapped(&self, memory: usize) -> bool {
        self.allocations
            .borrow()
            .get(memory)
            .map_or(false, |memory| memory.mapped.is_some())
    }
}

impl MemoryDevice<usize> for MockMemoryDevice {
    #[tracing::instrument(skip(self))]
    unsafe fn allocate_memory(&self, size: u64, memory_type: u32) -> Result<usize, OutOfMemory> {
        assert!(
            self.max_memory_allocation_size == 0 || size <= self.max_memory_allocation_size,
            "Allocation size exceeds limit"
        );

        let allocations_remains = self.allocations_remains.get();
        assert!(
            allocations_remains > 0,
            "Allocator should not try to allocate too many objects"
        );

        let heap = &self.memory_heaps_remaining_capacity
            [self.memory_types[memory_type as usize].heap as usize];
        if heap.get() < size {
            return Err(OutOfMemory::OutOfDeviceMemory);
        }
        heap.set(heap.get() - size);
        self.allocations_remains.set(allocations_remains - 1);

        tracing::info!("Memory object allocated");

        self.total_allocations_counter
            .set(self.total_allocations_counter.get() + 1);

        Ok(self.allocations.borrow_mut().insert(MockMemory {
            memory_type,
            size,
            mapped: None,
        }))
    }

    #[tracing::instrument(skip(self))]
    unsafe fn deallocate_memory(&self, memory: usize) {
        let memory = self.allocations.borrow_mut().remove(memory);
        assert!(
            memory.mapped.is_none(),
            "Memory object must be unmapped before deallocation"
        );

        self.allocations_remains
            .set(self.allocations_remains.get() + 1);
        let heap = &self.memory_heaps_remaining_capacity
            [self.memory_types[memory.memory_type as usize].heap as usize];
        heap.set(heap.get() + memory.size);
        tracing::info!("Memory object deallocated");

        self.total_deallocations_counter
            .set(self.total_deallocations_counter.get() + 1);
    }

    #[tracing::instrument(skip(self))]
    unsafe fn map_memory(
        &self,
        memory: &mut usize,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        assert_ne!(size, 0, "Mapping size must be larger than 0");

        if self.fail_mapping.get() {
            tracing::warn!("Memory object mapping failure requested");
            return Err(DeviceMapError::MapFailed);
        }

        let mut allocations = self.allocations.borrow_mut();
        let memory = allocations
            .get_mut(*memory)
            .expect("Non-existing memory object");

        assert!(
            self.memory_types[memory.memory_type as usize]
                .props
                .contains(MemoryPropertyFlags::HOST_VISIBLE),
            "Attempt to map non-host-visible memory"
        );

        assert!(memory.mapped.is_none(), "Already mapped");

        assert!(
            offset < memory.size,
            "offset must be less than the size of memory"
        );
        assert!(
            size <= memory.size - offset,
            "size must be less than or equal to the size of the memory minus offset"
        );

        let size_usize = usize::try_from(size).map_err(|_| DeviceMapError::OutOfHostMemory)?;
        let mapping = memory
            .mapped
            .get_or_insert(vec![0; size_usize].into_boxed_slice());

        tracing::info!("Memory object mapped");
        Ok(NonNull::new(mapping.as_mut_ptr()).expect("Boxed slice pointer is never null"))
    }

    #[tracing::instrument(skip(self))]
    unsafe fn unmap_memory(&self, memory: &mut usize) {
        let mut allocations = self.allocations.borrow_mut();
        let memory = allocations
            .get_mut(*memory)
            .expect("Non-existing memory object");
        assert!(memory.mapped.take().is_some(), "Was not mapped");
        tracing::info!("Memory object unmapped");
    }
}
