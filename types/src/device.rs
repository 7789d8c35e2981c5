use {
    crate::types::{MemoryHeap, MemoryType},
    alloc::borrow::Cow,
    core::ptr::NonNull,
};

/// Native memory object allocation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutOfMemory {
    OutOfDeviceMemory,
    OutOfHostMemory,
}

/// Native memory object mapping failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceMapError {
    OutOfDeviceMemory,
    OutOfHostMemory,
    MapFailed,
}

/// Properties of the device that will be used for allocating memory objects.
#[derive(Debug)]
pub struct DeviceProperties<'a> {
    /// Array of memory types provided by the device.
    pub memory_types: Cow<'a, [MemoryType]>,

    /// Array of memory heaps provided by the device.
    pub memory_heaps: Cow<'a, [MemoryHeap]>,

    /// Maximum number of valid memory allocations that can exist simultaneously within the device.
    pub max_memory_allocation_count: u32,

    /// Maximum size for single allocation supported by the device.
    pub max_memory_allocation_size: u64,
}

/// Abstract device that allocates the memory objects to sub-allocate.
pub trait MemoryDevice<M> {
    /// Allocate new memory object from device.
    /// This function may be expensive and even limit maximum number of memory
    /// objects allocated.
    /// Which is the reason for sub-allocation this crate provides.
    ///
    /// # Safety
    ///
    /// `memory_type` must be valid index for memory type associated with this device.
    /// Retreiving this information is implementation specific.
    unsafe fn allocate_memory(&self, size: u64, memory_type: u32) -> Result<M, OutOfMemory>;

    /// Deallocate memory object.
    /// All clones of specified memory handle become invalid.
    ///
    /// # Safety
    ///
    /// Memory object must have been allocated from this device
    /// and must not be mapped.
    unsafe fn deallocate_memory(&self, memory: M);

    /// Map region of device memory to host memory space.
    ///
    /// # Safety
    ///
    /// * Memory object must have been allocated from this device.
    /// * Memory object must not be already mapped.
    /// * Memory must be allocated from type with `HOST_VISIBLE` property.
    /// * `offset + size` must not overflow.
    /// * `offset + size` must not be larger than memory object size specified when
    ///   memory object was allocated from this device.
    unsafe fn map_memory(
        &self,
        memory: &mut M,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError>;

    /// Unmap previously mapped memory region.
    ///
    /// # Safety
    ///
    /// * Memory object must have been allocated from this device.
    /// * Memory object must be mapped
    unsafe fn unmap_memory(&self, memory: &mut M);
}
