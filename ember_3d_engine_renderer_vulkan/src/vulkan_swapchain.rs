/// Swapchain - presentation images of the window surface
///
/// Only presentation lives here. The semaphores and fences that order
/// acquire, submit and present belong to the frame slots.

use ash::vk;
use ember_3d_engine::ember3d::render::{AcquireOutcome, Extent2D, PresentOutcome};
use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::texture_format_from_vk;
use crate::vulkan_image::COLOR_SUBRESOURCE;

pub struct Swapchain {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

fn surface_error(what: &str, e: vk::Result) -> Error {
    if e == vk::Result::ERROR_DEVICE_LOST {
        engine_error!("ember3d::vulkan", "Device lost during {}", what);
        return Error::DeviceLost(what.to_string());
    }
    engine_err!("ember3d::vulkan", "Failed to {}: {:?}", what, e)
}

/// Extent the surface dictates, or the requested one clamped to its limits
fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

impl Swapchain {
    /// Create the swapchain for the context's surface
    pub fn new(ctx: &GpuContext, requested: Extent2D) -> Result<Self> {
        unsafe {
            let surface_formats = ctx
                .surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
                .map_err(|e| Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e)))?;

            let surface_format = surface_formats
                .iter()
                .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB)
                .or_else(|| surface_formats.first())
                .copied()
                .ok_or_else(|| Error::InitializationFailed("surface reports no formats".to_string()))?;
            if texture_format_from_vk(surface_format.format).is_none() {
                engine_warn!("ember3d::vulkan", "Surface format {:?} has no engine equivalent", surface_format.format);
            }

            let mut swapchain = Self {
                loader: ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device),
                swapchain: vk::SwapchainKHR::null(),
                images: Vec::new(),
                views: Vec::new(),
                surface_format,
                extent: vk::Extent2D::default(),
            };

            match swapchain.rebuild(ctx, requested) {
                Ok(true) => Ok(swapchain),
                Ok(false) => Err(Error::InitializationFailed("surface has a zero extent".to_string())),
                Err(e) => {
                    swapchain.destroy(&ctx.device);
                    Err(e)
                }
            }
        }
    }

    /// Replace the swapchain and its views with ones at `requested`
    ///
    /// Keeps the current swapchain when the surface reports a zero extent.
    /// All work using the old images must be complete.
    pub fn recreate(&mut self, ctx: &GpuContext, requested: Extent2D) -> Result<()> {
        if self.rebuild(ctx, requested)? {
            engine_info!(
                "ember3d::vulkan",
                "Swapchain recreated at {}x{} ({} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
        Ok(())
    }

    fn rebuild(&mut self, ctx: &GpuContext, requested: Extent2D) -> Result<bool> {
        unsafe {
            let capabilities = ctx
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
                .map_err(|e| surface_error("get surface capabilities", e))?;

            let extent = choose_extent(&capabilities, requested);
            if extent.width == 0 || extent.height == 0 {
                engine_debug!("ember3d::vulkan", "Surface extent is zero, keeping current swapchain");
                return Ok(false);
            }

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(ctx.surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .loader
                .create_swapchain(&create_info, None)
                .map_err(|e| surface_error("create swapchain", e))?;

            self.destroy_views(&ctx.device);
            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self
                .loader
                .get_swapchain_images(swapchain)
                .map_err(|e| surface_error("get swapchain images", e))?;

            for &image in &self.images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.surface_format.format)
                    .components(vk::ComponentMapping::default())
                    .subresource_range(COLOR_SUBRESOURCE);

                let view = ctx
                    .device
                    .create_image_view(&create_info, None)
                    .map_err(|e| surface_error("create swapchain image view", e))?;
                self.views.push(view);
            }

            Ok(true)
        }
    }

    /// Acquire the next image, signalling `image_available`
    pub fn acquire(&self, image_available: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, image_available, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(surface_error("acquire next swapchain image", e)),
        }
    }

    /// Queue `image_index` for presentation after `render_finished`
    pub fn present(&self, queue: vk::Queue, render_finished: vk::Semaphore, image_index: u32) -> Result<PresentOutcome> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [render_finished];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(surface_error("present swapchain image", e)),
        }
    }

    /// Image and view for an acquired index
    pub fn image(&self, image_index: u32) -> Option<(vk::Image, vk::ImageView)> {
        let index = image_index as usize;
        Some((*self.images.get(index)?, *self.views.get(index)?))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.extent.width, self.extent.height)
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    fn destroy_views(&mut self, device: &ash::Device) {
        unsafe {
            for view in self.views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }
    }

    /// Destroy views and swapchain. The device must be idle.
    pub fn destroy(&mut self, device: &ash::Device) {
        self.destroy_views(device);
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
