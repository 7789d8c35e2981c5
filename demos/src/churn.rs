use {
    chunk_alloc::{
        Config, DeviceMemoryManager, DeviceProperties, MemoryHeap, MemoryPropertyFlags,
        MemoryType, Request,
    },
    chunk_alloc_mock::MockMemoryDevice,
    std::{borrow::Cow, collections::VecDeque},
    tracing_subscriber::layer::SubscriberExt as _,
};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .pretty()
            .finish()
            .with(tracing_error::ErrorLayer::default()),
    )?;

    let device = MockMemoryDevice::new(DeviceProperties {
        memory_types: Cow::Borrowed(&[MemoryType {
            heap: 0,
            props: MemoryPropertyFlags::HOST_VISIBLE,
        }]),
        memory_heaps: Cow::Borrowed(&[MemoryHeap {
            size: 32 * 1024 * 1024,
        }]),
        max_memory_allocation_count: 5,
        max_memory_allocation_size: 1024 * 1024,
    });

    let mut manager = DeviceMemoryManager::new(Config::i_am_potato(), device.props());

    let mut blocks = VecDeque::new();
    let mut size = 64;

    for _ in 0..1_000_000 {
        if blocks.len() >= 1024 {
            while blocks.len() > 700 {
                if let Some(block) = blocks.pop_front() {
                    manager.dealloc(block);
                }
            }
        }

        // Cycles through sizes 64..=1024 to fragment free lists.
        size = size % 1024 + 64;

        let block = unsafe {
            manager.alloc(
                &device,
                Request {
                    memory_type: 0,
                    size,
                    align: 256,
                },
            )
        }?;

        blocks.push_back(block);
    }

    let stats = manager.pool_stats(0);
    tracing::warn!(
        chunks = stats.chunks,
        free_ranges = stats.free_ranges,
        "Total memory object allocations: {}",
        device.total_allocations()
    );

    while let Some(block) = blocks.pop_front() {
        manager.dealloc(block);
    }

    let released = unsafe { manager.trim(&device) };
    tracing::warn!("Released {} chunks", released);

    unsafe { manager.cleanup(&device) }

    Ok(())
}
