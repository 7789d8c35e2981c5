/// Configuration for [`DeviceMemoryManager`]
///
/// [`DeviceMemoryManager`]: struct.DeviceMemoryManager.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Size in bytes of every memory object requested from the device.
    /// Requests larger than this value fail with `AllocationError::UnsupportedSize`.
    ///
    /// The effective value is additionally limited by
    /// `DeviceProperties::max_memory_allocation_size`.
    pub chunk_size: u64,

    /// Request sizes are rounded up to a multiple of this value before allocation.
    /// Use `bufferImageGranularity` of the device to keep linear and optimal
    /// resources from sharing a granularity page.
    /// Must not be zero. `1` disables rounding.
    pub granularity: u64,
}

impl Config {
    /// Returns default configuration.
    /// This is not `Default` implementation to discourage usage outside of
    /// prototyping.
    /// Proper configuration should depend on hardware and intended usage.
    pub fn i_am_prototyping() -> Self {
        Config {
            chunk_size: 256 * 1024 * 1024,
            granularity: 1,
        }
    }

    /// Returns default configuration for potato.
    pub fn i_am_potato() -> Self {
        Config {
            chunk_size: 1024 * 1024,
            granularity: 1,
        }
    }
}
