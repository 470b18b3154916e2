/// Buffer - Vulkan buffer with its gpu-allocator allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::{AllocationError, MemoryLocation};
use ember_3d_engine::ember3d::render::{BufferDesc, MemoryProperty, PooledResource};
use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::{engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer owned by the device's buffer pool
pub struct VulkanBuffer {
    pub(crate) buffer: vk::Buffer,
    /// None once destroyed
    allocation: Option<Allocation>,
    pub(crate) desc: BufferDesc,
}

impl PooledResource for VulkanBuffer {
    fn size_bytes(&self) -> u64 {
        self.desc.size
    }
}

/// Map an allocator failure onto the engine error
pub(crate) fn allocation_error(name: &str, size: u64, error: AllocationError) -> Error {
    let size_mb = size as f64 / (1024.0 * 1024.0);
    match error {
        AllocationError::OutOfMemory => {
            engine_error!("ember3d::vulkan", "Out of GPU memory for '{}' (required: {:.2} MB)", name, size_mb);
            Error::OutOfDeviceMemory
        }
        other => engine_err!("ember3d::vulkan", "Allocation of '{}' ({:.2} MB) failed: {:?}", name, size_mb, other),
    }
}

/// Map a Vulkan object creation failure onto the engine error
pub(crate) fn creation_error(what: &str, name: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            engine_error!("ember3d::vulkan", "Out of memory creating {} '{}': {:?}", what, name, result);
            Error::OutOfDeviceMemory
        }
        vk::Result::ERROR_DEVICE_LOST => {
            engine_error!("ember3d::vulkan", "Device lost creating {} '{}'", what, name);
            Error::DeviceLost(format!("creating {} '{}'", what, name))
        }
        other => engine_err!("ember3d::vulkan", "Failed to create {} '{}': {:?}", what, name, other),
    }
}

impl VulkanBuffer {
    /// Create a buffer of exactly `desc.size` bytes and bind its memory
    pub fn create(ctx: &mut GpuContext, desc: &BufferDesc) -> Result<Self> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| creation_error("buffer", &desc.name, e))?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let location = match desc.memory {
                MemoryProperty::DeviceLocal => MemoryLocation::GpuOnly,
                MemoryProperty::HostVisible => MemoryLocation::CpuToGpu,
            };

            let allocation = match ctx.allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(allocation_error(&desc.name, requirements.size, e));
                }
            };

            if let Err(e) = ctx.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                ctx.allocator.free(allocation).ok();
                ctx.device.destroy_buffer(buffer, None);
                return Err(engine_err!("ember3d::vulkan", "Failed to bind memory of buffer '{}': {:?}", desc.name, e));
            }

            ctx.set_object_name(buffer, &desc.name);

            Ok(Self {
                buffer,
                allocation: Some(allocation),
                desc: desc.clone(),
            })
        }
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        if self.desc.memory != MemoryProperty::HostVisible {
            return Err(Error::InvalidResource(format!("buffer '{}' is not host-visible", self.desc.name)));
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.desc.size => Ok(()),
            _ => Err(Error::InvalidResource(format!(
                "range {}+{} exceeds buffer '{}' ({} bytes)",
                offset, len, self.desc.name, self.desc.size
            ))),
        }
    }

    /// Copy `data` into the persistently mapped memory at `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len() as u64)?;
        let mapped = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| engine_err!("ember3d::vulkan", "Buffer '{}' is not mapped", self.desc.name))?;

        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy `len` bytes out of the mapped memory
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.check_range(offset, len)?;
        let mapped = self
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| engine_err!("ember3d::vulkan", "Buffer '{}' is not mapped", self.desc.name))?;

        let start = offset as usize;
        Ok(mapped[start..start + len as usize].to_vec())
    }

    /// Free the memory and destroy the buffer
    ///
    /// The GPU must no longer use the buffer.
    pub fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                ctx.allocator.free(allocation).ok();
            }
            ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
