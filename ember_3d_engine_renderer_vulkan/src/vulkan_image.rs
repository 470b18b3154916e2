/// Image - Vulkan sampled 2D image with its mip chain, its view and its allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use ember_3d_engine::ember3d::render::{ImageDesc, PooledResource};
use ember_3d_engine::ember3d::Result;
use ember_3d_engine::engine_err;

use crate::vulkan_buffer::{allocation_error, creation_error};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::texture_format_to_vk;

/// Vulkan image owned by the device's image pool
pub struct VulkanImage {
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    allocation: Option<Allocation>,
    pub(crate) desc: ImageDesc,
    /// Every level uploaded and in SHADER_READ_ONLY_OPTIMAL
    pub(crate) ready: bool,
}

impl PooledResource for VulkanImage {
    fn size_bytes(&self) -> u64 {
        self.desc.size_bytes()
    }
}

/// Mip level 0, single layer, colour aspect
pub(crate) const COLOR_SUBRESOURCE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Every mip level of an image described by `desc`
pub(crate) fn all_levels(desc: &ImageDesc) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        level_count: desc.mip_levels,
        ..COLOR_SUBRESOURCE
    }
}

impl VulkanImage {
    /// Create a device-local image usable as a copy source, a copy
    /// destination and for sampling
    pub fn create(ctx: &mut GpuContext, desc: &ImageDesc) -> Result<Self> {
        desc.validate()?;
        let format = texture_format_to_vk(desc.format);

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_levels)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(
                    vk::ImageUsageFlags::SAMPLED
                        | vk::ImageUsageFlags::TRANSFER_SRC
                        | vk::ImageUsageFlags::TRANSFER_DST,
                )
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| creation_error("image", &desc.name, e))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(allocation_error(&desc.name, requirements.size, e));
                }
            };

            if let Err(e) = ctx.device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                ctx.allocator.free(allocation).ok();
                ctx.device.destroy_image(image, None);
                return Err(engine_err!("ember3d::vulkan", "Failed to bind memory of image '{}': {:?}", desc.name, e));
            }

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(all_levels(desc));

            let view = match ctx.device.create_image_view(&view_create_info, None) {
                Ok(view) => view,
                Err(e) => {
                    ctx.allocator.free(allocation).ok();
                    ctx.device.destroy_image(image, None);
                    return Err(creation_error("image view", &desc.name, e));
                }
            };

            ctx.set_object_name(image, &desc.name);

            Ok(Self {
                image,
                view,
                allocation: Some(allocation),
                desc: desc.clone(),
                ready: false,
            })
        }
    }

    /// Destroy view, memory and image
    pub fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                ctx.allocator.free(allocation).ok();
            }
            ctx.device.destroy_image(self.image, None);
        }
    }
}
