#[derive(Debug)]
pub(crate) struct Heap {
    size: u64,
    used: u64,
    allocated: u128,
    deallocated: u128,
}

impl Heap {
    pub(crate) fn new(size: u64) -> Self {
        Heap {
            size,
            used: 0,
            allocated: 0,
            deallocated: 0,
        }
    }

    pub(crate) fn budget(&self) -> u64 {
        self.size.saturating_sub(self.used)
    }

    pub(crate) fn alloc(&mut self, size: u64) {
        self.used += size;
        self.allocated += u128::from(size);
    }

    pub(crate) fn dealloc(&mut self, size: u64) {
        debug_assert!(self.used >= size, "Heap releases more than it holds");
        self.used -= size;
        self.deallocated += u128::from(size);
    }

    pub(crate) fn usage(&self) -> HeapUsage {
        HeapUsage {
            size: self.size,
            used: self.used,
            allocated: self.allocated,
            deallocated: self.deallocated,
        }
    }
}

/// Memory objects accounting for one device memory heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HeapUsage {
    /// Heap size reported by the device.
    pub size: u64,

    /// Bytes currently held in chunks.
    pub used: u64,

    /// Total bytes ever allocated in chunks.
    pub allocated: u128,

    /// Total bytes ever released back to the device.
    pub deallocated: u128,
}
