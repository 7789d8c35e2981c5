use {
    chunk_alloc::{
        Config, DeviceMemoryManager, DeviceProperties, MemoryHeap, MemoryPropertyFlags,
        MemoryType, Request,
    },
    chunk_alloc_mock::MockMemoryDevice,
    std::borrow::Cow,
    tracing_subscriber::layer::SubscriberExt as _,
};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .finish()
            .with(tracing_error::ErrorLayer::default()),
    )?;

    let device = MockMemoryDevice::new(DeviceProperties {
        memory_types: Cow::Borrowed(&[MemoryType {
            heap: 0,
            props: MemoryPropertyFlags::HOST_VISIBLE,
        }]),
        memory_heaps: Cow::Borrowed(&[MemoryHeap { size: 1024 * 1024 }]),
        max_memory_allocation_count: 32,
        max_memory_allocation_size: 1024 * 1024,
    });

    let mut manager = DeviceMemoryManager::new(
        Config {
            chunk_size: 1024,
            granularity: 1,
        },
        device.props(),
    );

    let request = |size, align| Request {
        memory_type: 0,
        size,
        align,
    };

    let a = unsafe { manager.alloc(&device, request(100, 1)) }?;
    let b = unsafe { manager.alloc(&device, request(200, 1)) }?;
    tracing::info!(a.offset = a.offset(), b.offset = b.offset(), "Two blocks allocated");

    manager.dealloc(a);
    let c = unsafe { manager.alloc(&device, request(50, 1)) }?;
    tracing::info!(c.offset = c.offset(), "Freed range reused");

    if let Some(ptr) = c.mapped_ptr() {
        let bytes = [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) }
        tracing::info!("Wrote {} bytes through persistent mapping", bytes.len());
    }

    let stats = manager.pool_stats(0);
    tracing::info!(
        chunks = stats.chunks,
        used = stats.used_bytes,
        free_ranges = stats.free_ranges,
        "Pool occupancy"
    );

    manager.dealloc(b);
    manager.dealloc(c);

    let released = unsafe { manager.trim(&device) };
    tracing::info!("Released {} chunks", released);

    unsafe { manager.cleanup(&device) }

    eyre::ensure!(
        device.live_allocations() == 0,
        "Memory objects leaked: {}",
        device.live_allocations()
    );

    Ok(())
}
