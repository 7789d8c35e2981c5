use {
    chunk_alloc_types::OutOfMemory,
    core::fmt::{self, Display},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocationError {
    /// Requested size exceeds the chunk size.
    /// Retrying is pointless, the chunk size is too small for the workload.
    UnsupportedSize,
    OutOfDeviceMemory,
    OutOfHostMemory,
    NoSuchMemoryType,
    TooManyObjects,
}

impl From<OutOfMemory> for AllocationError {
    fn from(err: OutOfMemory) -> Self {
        match err {
            OutOfMemory::OutOfDeviceMemory => AllocationError::OutOfDeviceMemory,
            OutOfMemory::OutOfHostMemory => AllocationError::OutOfHostMemory,
        }
    }
}

impl Display for AllocationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::UnsupportedSize => {
                fmt.write_str("Requested size is larger than the chunk size")
            }
            AllocationError::OutOfDeviceMemory => fmt.write_str("Device memory exhausted"),
            AllocationError::OutOfHostMemory => fmt.write_str("Host memory exhausted"),
            AllocationError::NoSuchMemoryType => {
                fmt.write_str("Memory type index is out of device memory types range")
            }
            AllocationError::TooManyObjects => {
                fmt.write_str("Reached limit on memory objects count")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocationError {}

/// Chunk has no free range that fits the request.
/// Consumed by the chunk set which moves on to the next chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct OutOfSpace;
