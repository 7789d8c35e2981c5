use {
    ash::{vk, Entry},
    chunk_alloc::{Config, DeviceMemoryManager, MemoryPropertyFlags, Request},
    chunk_alloc_ash::{device_properties, AshMemoryDevice},
    std::ffi::CStr,
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

    let entry = unsafe { Entry::load() }?;

    let version = unsafe { entry.try_enumerate_instance_version() }?
        .unwrap_or(vk::make_api_version(0, 1, 0, 0));

    let engine_name = CStr::from_bytes_with_nul(b"ChunkAlloc\0")?;
    let application_name = CStr::from_bytes_with_nul(b"ChunkAllocApp\0")?;

    let application_info = vk::ApplicationInfo::default()
        .engine_name(engine_name)
        .engine_version(1)
        .application_name(application_name)
        .application_version(1)
        .api_version(version);

    let instance = unsafe {
        entry.create_instance(
            &vk::InstanceCreateInfo::default().application_info(&application_info),
            None,
        )
    }?;

    let physical_devices = unsafe { instance.enumerate_physical_devices() }?;
    let physical_device = match physical_devices.first() {
        Some(&physical_device) => physical_device,
        None => eyre::bail!("No Vulkan physical device found"),
    };

    let limits = unsafe { instance.get_physical_device_properties(physical_device) }.limits;
    let props = unsafe { device_properties(&instance, version, physical_device) };

    let queue_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(0)
        .queue_priorities(&[1.0]);

    let device = unsafe {
        instance.create_device(
            physical_device,
            &vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_info)),
            None,
        )
    }?;

    let buffer = unsafe {
        device.create_buffer(
            &vk::BufferCreateInfo::default()
                .size(1024)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE),
            None,
        )
    }?;

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

    let compatible = |index: usize| requirements.memory_type_bits & (1 << index) != 0;
    let memory_type = props
        .memory_types
        .iter()
        .enumerate()
        .position(|(index, memory_type)| {
            compatible(index) && memory_type.props.contains(MemoryPropertyFlags::HOST_VISIBLE)
        })
        .or_else(|| (0..props.memory_types.len()).position(compatible));

    let memory_type = match memory_type {
        Some(memory_type) => memory_type as u32,
        None => eyre::bail!("No memory type is compatible with the buffer"),
    };

    let config = Config {
        granularity: limits.buffer_image_granularity,
        ..Config::i_am_potato()
    };

    let mut manager = DeviceMemoryManager::new(config, props);

    let block = unsafe {
        manager.alloc(
            AshMemoryDevice::wrap(&device),
            Request {
                memory_type,
                size: requirements.size,
                align: requirements.alignment,
            },
        )
    }?;

    unsafe { device.bind_buffer_memory(buffer, *block.memory(), block.offset()) }?;

    if let Some(ptr) = block.mapped_ptr() {
        let bytes = [0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) }
        tracing::info!("Wrote {} bytes through persistent mapping", bytes.len());
    }

    let stats = manager.pool_stats(memory_type);
    tracing::info!(
        memory_type,
        chunks = stats.chunks,
        used = stats.used_bytes,
        "Buffer memory bound"
    );

    unsafe { device.destroy_buffer(buffer, None) }
    manager.dealloc(block);

    unsafe {
        manager.cleanup(AshMemoryDevice::wrap(&device));
        device.destroy_device(None);
        instance.destroy_instance(None);
    }

    Ok(())
}
