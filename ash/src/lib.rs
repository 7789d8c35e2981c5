//!
//! # Ash backend for `chunk-alloc`
//!
//! # Usage example
//!
//! ```ignore
//! use {
//!     chunk_alloc::{Config, DeviceMemoryManager, Request},
//!     chunk_alloc_ash::{device_properties, AshMemoryDevice},
//! };
//!
//! let props = unsafe { device_properties(&instance, vk::API_VERSION_1_1, physical_device) };
//! let mut manager = DeviceMemoryManager::new(Config::i_am_prototyping(), props);
//!
//! let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
//! let block = unsafe {
//!     manager.alloc(
//!         AshMemoryDevice::wrap(&device),
//!         Request {
//!             memory_type: memory_type_index,
//!             size: requirements.size,
//!             align: requirements.alignment,
//!         },
//!     )
//! }?;
//!
//! unsafe { device.bind_buffer_memory(buffer, *block.memory(), block.offset()) }?;
//!
//! // ...
//!
//! unsafe { device.destroy_buffer(buffer, None) };
//! manager.dealloc(block);
//! unsafe { manager.cleanup(AshMemoryDevice::wrap(&device)) };
//! ```
//!

use {
    ash::{vk, Device, Instance},
    chunk_alloc_types::{
        DeviceMapError, DeviceProperties, MemoryDevice, MemoryHeap, MemoryPropertyFlags,
        MemoryType, OutOfMemory,
    },
    std::ptr::NonNull,
};

#[repr(transparent)]
pub struct AshMemoryDevice {
    device: Device,
}

impl AshMemoryDevice {
    pub fn wrap(device: &Device) -> &Self {
        unsafe {
            // Safe because `Self` is `repr(transparent)`
            // with only field being `Device`.
            &*(device as *const Device as *const Self)
        }
    }
}

impl AsRef<AshMemoryDevice> for Device {
    #[inline(always)]
    fn as_ref(&self) -> &AshMemoryDevice {
        AshMemoryDevice::wrap(self)
    }
}

impl MemoryDevice<vk::DeviceMemory> for AshMemoryDevice {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
    ) -> Result<vk::DeviceMemory, OutOfMemory> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type);

        match self.device.allocate_memory(&info, None) {
            Ok(memory) => Ok(memory),
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => Err(OutOfMemory::OutOfDeviceMemory),
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => Err(OutOfMemory::OutOfHostMemory),
            Err(vk::Result::ERROR_TOO_MANY_OBJECTS) => panic!("Too many objects"),
            Err(err) => panic!("Unexpected Vulkan error: `{}`", err),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn deallocate_memory(&self, memory: vk::DeviceMemory) {
        self.device.free_memory(memory, None);
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn map_memory(
        &self,
        memory: &mut vk::DeviceMemory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        match self
            .device
            .map_memory(*memory, offset, size, vk::MemoryMapFlags::empty())
        {
            Ok(ptr) => {
                Ok(NonNull::new(ptr as *mut u8)
                    .expect("Pointer to memory mapping must not be null"))
            }
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY) => Err(DeviceMapError::OutOfDeviceMemory),
            Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY) => Err(DeviceMapError::OutOfHostMemory),
            Err(vk::Result::ERROR_MEMORY_MAP_FAILED) => Err(DeviceMapError::MapFailed),
            Err(err) => panic!("Unexpected Vulkan error: `{}`", err),
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    unsafe fn unmap_memory(&self, memory: &mut vk::DeviceMemory) {
        self.device.unmap_memory(*memory);
    }
}

/// Returns `DeviceProperties` for specified `PhysicalDevice`, required to create `DeviceMemoryManager`.
///
/// `version` is the API version the instance was created with.
/// When both the instance and the physical device support Vulkan 1.1
/// the real `maxMemoryAllocationSize` is queried,
/// otherwise allocation size is not limited.
///
/// # Safety
///
/// `physical_device` must be queried from this `instance`.
pub unsafe fn device_properties(
    instance: &Instance,
    version: u32,
    physical_device: vk::PhysicalDevice,
) -> DeviceProperties<'static> {
    let properties = instance.get_physical_device_properties(physical_device);
    let limits = properties.limits;

    let memory_properties = instance.get_physical_device_memory_properties(physical_device);

    let max_memory_allocation_size =
        if supports_vulkan_1_1(version) && supports_vulkan_1_1(properties.api_version) {
            let mut maintenance3 = vk::PhysicalDeviceMaintenance3Properties::default();
            let mut props2 = vk::PhysicalDeviceProperties2::default().push_next(&mut maintenance3);
            instance.get_physical_device_properties2(physical_device, &mut props2);
            allocation_size_limit(maintenance3.max_memory_allocation_size)
        } else {
            u64::max_value()
        };

    DeviceProperties {
        max_memory_allocation_count: limits.max_memory_allocation_count,
        max_memory_allocation_size,
        memory_types: memory_properties.memory_types
            [..memory_properties.memory_type_count as usize]
            .iter()
            .map(|memory_type| MemoryType {
                props: memory_properties_from_ash(memory_type.property_flags),
                heap: memory_type.heap_index,
            })
            .collect(),
        memory_heaps: memory_properties.memory_heaps
            [..memory_properties.memory_heap_count as usize]
            .iter()
            .map(|&memory_heap| MemoryHeap {
                size: memory_heap.size,
            })
            .collect(),
    }
}

fn supports_vulkan_1_1(version: u32) -> bool {
    vk::api_version_major(version) > 1
        || (vk::api_version_major(version) == 1 && vk::api_version_minor(version) >= 1)
}

/// Zero is reported by drivers that leave the structure unfilled.
fn allocation_size_limit(reported: u64) -> u64 {
    match reported {
        0 => u64::max_value(),
        limit => limit,
    }
}

pub fn memory_properties_from_ash(props: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    let mut result = MemoryPropertyFlags::empty();
    if props.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) {
        result |= MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        result |= MemoryPropertyFlags::HOST_VISIBLE;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        result |= MemoryPropertyFlags::HOST_COHERENT;
    }
    if props.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
        result |= MemoryPropertyFlags::HOST_CACHED;
    }
    if props.contains(vk::MemoryPropertyFlags::LAZILY_ALLOCATED) {
        result |= MemoryPropertyFlags::LAZILY_ALLOCATED;
    }
    if props.contains(vk::MemoryPropertyFlags::PROTECTED) {
        result |= MemoryPropertyFlags::PROTECTED;
    }
    result
}

pub fn memory_properties_to_ash(props: MemoryPropertyFlags) -> vk::MemoryPropertyFlags {
    let mut result = vk::MemoryPropertyFlags::empty();
    if props.contains(MemoryPropertyFlags::DEVICE_LOCAL) {
        result |= vk::MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if props.contains(MemoryPropertyFlags::HOST_VISIBLE) {
        result |= vk::MemoryPropertyFlags::HOST_VISIBLE;
    }
    if props.contains(MemoryPropertyFlags::HOST_COHERENT) {
        result |= vk::MemoryPropertyFlags::HOST_COHERENT;
    }
    if props.contains(MemoryPropertyFlags::HOST_CACHED) {
        result |= vk::MemoryPropertyFlags::HOST_CACHED;
    }
    if props.contains(MemoryPropertyFlags::LAZILY_ALLOCATED) {
        result |= vk::MemoryPropertyFlags::LAZILY_ALLOCATED;
    }
    if props.contains(MemoryPropertyFlags::PROTECTED) {
        result |= vk::MemoryPropertyFlags::PROTECTED;
    }
    result
}
