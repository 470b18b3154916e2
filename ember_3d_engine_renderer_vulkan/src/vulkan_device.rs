/// VulkanDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the GPU context and everything created through it. Resources live
/// in handle pools; the engine never sees a Vulkan object.
///
/// Freed buffers, images and pipelines are retired rather than destroyed:
/// they stay alive until every frame submitted before the free has been
/// observed complete, and past any timed-out transfer until the device is
/// idle.

use std::time::Duration;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::SlotMap;
use ember_3d_engine::ember3d::render::{
    check_request, AcquireOutcome, BufferDesc, BufferHandle, CommandList, Extent2D, FenceStatus,
    GraphicsDevice, ImageDesc, ImageHandle, ImageRegion, MemoryStats, PipelineDesc, PipelineHandle,
    PooledResource, PresentOutcome, ResourcePool, RetireQueue,
};
use ember_3d_engine::ember3d::{Config, Error, Result};
use ember_3d_engine::{engine_debug, engine_error, engine_info, engine_warn};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_frame::{device_error, FrameSlot, SlotState};
use crate::vulkan_image::VulkanImage;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_upload::{record_buffer_copy, record_image_region_copy, record_image_upload, UploadQueue};

/// Vulkan graphics device presenting to one window surface
///
/// # Example
///
/// ```no_run
/// use ember_3d_engine::ember3d::{Config, Engine, NullCallbackSink};
/// use ember_3d_engine::ember3d::render::Extent2D;
/// use ember_3d_engine_renderer_vulkan::VulkanDevice;
/// # fn window() -> winit::window::Window { unimplemented!() }
///
/// let window = window();
/// let config = Config::default();
/// let device = VulkanDevice::new(&window, Extent2D::new(1280, 720), &config)?;
/// let engine = Engine::startup(config, Box::new(device), Box::new(NullCallbackSink))?;
/// # Ok::<(), ember_3d_engine::ember3d::Error>(())
/// ```
pub struct VulkanDevice {
    slots: Vec<FrameSlot>,
    swapchain: Swapchain,
    upload: UploadQueue,
    buffers: ResourcePool<BufferHandle, VulkanBuffer>,
    images: ResourcePool<ImageHandle, VulkanImage>,
    pipelines: SlotMap<PipelineHandle, VulkanPipeline>,
    /// Freed while frames that may use them are in flight
    retired: RetireQueue<Retired>,
    /// Out of the frames' reach but a timed-out transfer may still use them
    deferred: Vec<Retired>,
    budget: Option<u64>,
    /// Dropped last
    ctx: GpuContext,
}

/// Freed resource awaiting destruction
enum Retired {
    Buffer(VulkanBuffer),
    Image(VulkanImage),
    Pipeline(VulkanPipeline),
}

impl Retired {
    fn destroy(self, ctx: &mut GpuContext) {
        match self {
            Retired::Buffer(buffer) => buffer.destroy(ctx),
            Retired::Image(image) => image.destroy(ctx),
            Retired::Pipeline(pipeline) => pipeline.destroy(&ctx.device),
        }
    }
}

impl PooledResource for Retired {
    fn size_bytes(&self) -> u64 {
        match self {
            Retired::Buffer(buffer) => buffer.size_bytes(),
            Retired::Image(image) => image.size_bytes(),
            Retired::Pipeline(_) => 0,
        }
    }
}

fn slot_out_of_range(slot: usize) -> Error {
    Error::InvalidResource(format!("frame slot {} out of range", slot))
}

impl VulkanDevice {
    /// Create the device, the swapchain at `extent` and `config.frames_in_flight` frame slots
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, extent: Extent2D, config: &Config) -> Result<Self> {
        config.validate()?;

        let ctx = GpuContext::new(window, config)?;
        let mut swapchain = Swapchain::new(&ctx, extent)?;
        let upload = match UploadQueue::new(&ctx.device, ctx.graphics_queue_family) {
            Ok(upload) => upload,
            Err(e) => {
                swapchain.destroy(&ctx.device);
                return Err(e);
            }
        };

        let mut device = Self {
            slots: Vec::with_capacity(config.frames_in_flight),
            swapchain,
            upload,
            buffers: ResourcePool::new(),
            images: ResourcePool::new(),
            pipelines: SlotMap::with_key(),
            retired: RetireQueue::new(config.frames_in_flight),
            deferred: Vec::new(),
            budget: config.device_memory_budget,
            ctx,
        };

        // Drop cleans up whatever was created if a slot fails
        for _ in 0..config.frames_in_flight {
            let slot = FrameSlot::new(&device.ctx.device, device.ctx.graphics_queue_family)?;
            device.slots.push(slot);
        }

        let extent = device.swapchain.extent();
        engine_info!(
            "ember3d::vulkan",
            "Vulkan device ready: {}x{} swapchain ({} images, {:?}), {} frames in flight",
            extent.width,
            extent.height,
            device.swapchain.image_count(),
            device.swapchain.format(),
            device.slots.len()
        );

        Ok(device)
    }

    fn slot(&self, slot: usize) -> Result<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| slot_out_of_range(slot))
    }

    /// Device memory held, including freed resources not yet destroyed
    fn live_bytes(&self) -> u64 {
        let pending: u64 = self
            .retired
            .pending()
            .chain(&self.deferred)
            .map(PooledResource::size_bytes)
            .sum();
        self.buffers.stats().live_bytes + self.images.stats().live_bytes + pending
    }

    /// Freed resources not yet destroyed
    pub fn pending_destroy(&self) -> usize {
        self.retired.len() + self.deferred.len()
    }

    fn retire(&mut self, resource: Retired) {
        if let Some(resource) = self.retired.retire(resource) {
            self.release(resource);
        }
    }

    /// Destroy a resource no frame references, unless a stalled transfer might
    fn release(&mut self, resource: Retired) {
        if self.upload.has_stalled() {
            self.deferred.push(resource);
        } else {
            resource.destroy(&mut self.ctx);
        }
    }

    fn shader_ready_image(&self, handle: ImageHandle, what: &str) -> Result<&VulkanImage> {
        let image = self
            .images
            .get(handle)
            .ok_or_else(|| Error::InvalidResource(format!("stale copy {}", what)))?;
        if !image.ready {
            return Err(Error::InvalidResource(format!("image '{}' was never uploaded", image.desc.name)));
        }
        Ok(image)
    }

    fn copy_buffers(&self, src: BufferHandle, dst: BufferHandle, size: u64) -> Result<(vk::Buffer, vk::Buffer)> {
        let src = self
            .buffers
            .get(src)
            .ok_or_else(|| Error::InvalidResource("stale copy source".to_string()))?;
        if size > src.desc.size {
            return Err(Error::InvalidResource("copy larger than source".to_string()));
        }
        let dst = self
            .buffers
            .get(dst)
            .ok_or_else(|| Error::InvalidResource("stale copy destination".to_string()))?;
        if size > dst.desc.size {
            return Err(Error::InvalidResource("copy larger than destination".to_string()));
        }
        Ok((src.buffer, dst.buffer))
    }

    /// Destroy every retired resource. The device must be idle.
    fn release_deferred(&mut self) {
        self.upload.reclaim(&self.ctx.device);
        let retired = self.retired.idle();
        for resource in std::mem::take(&mut self.deferred).into_iter().chain(retired) {
            resource.destroy(&mut self.ctx);
        }
    }
}

impl GraphicsDevice for VulkanDevice {
    // ===== ALLOCATION =====

    fn allocate_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        check_request(desc.size, self.live_bytes(), self.budget)?;
        let buffer = VulkanBuffer::create(&mut self.ctx, desc)?;
        engine_debug!("ember3d::vulkan", "Allocated buffer '{}' ({} bytes)", desc.name, desc.size);
        Ok(self.buffers.insert(buffer))
    }

    fn free_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(handle) {
            self.retire(Retired::Buffer(buffer));
        }
    }

    fn buffer_info(&self, handle: BufferHandle) -> Option<BufferDesc> {
        self.buffers.get(handle).map(|buffer| buffer.desc.clone())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        self.buffers
            .get_mut(handle)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?
            .write(offset, data)
    }

    fn read_buffer(&self, handle: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.buffers
            .get(handle)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?
            .read(offset, len)
    }

    fn allocate_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle> {
        check_request(desc.size_bytes(), self.live_bytes(), self.budget)?;
        let image = VulkanImage::create(&mut self.ctx, desc)?;
        engine_debug!(
            "ember3d::vulkan",
            "Allocated image '{}' ({}x{} {:?}, {} mip levels)",
            desc.name,
            desc.width,
            desc.height,
            desc.format,
            desc.mip_levels
        );
        Ok(self.images.insert(image))
    }

    fn free_image(&mut self, handle: ImageHandle) {
        if let Some(image) = self.images.remove(handle) {
            self.retire(Retired::Image(image));
        }
    }

    fn image_info(&self, handle: ImageHandle) -> Option<ImageDesc> {
        self.images.get(handle).map(|image| image.desc.clone())
    }

    fn memory_stats(&self) -> MemoryStats {
        self.buffers.stats().combined(&self.images.stats())
    }

    // ===== TRANSFER =====

    fn copy_buffer_blocking(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
        timeout: Duration,
    ) -> Result<()> {
        let (src, dst) = self.copy_buffers(src, dst, size)?;
        self.upload.run_blocking(&self.ctx.device, self.ctx.graphics_queue, timeout, |device, cmd| {
            record_buffer_copy(device, cmd, src, dst, size)
        })
    }

    fn copy_buffer_to_image_blocking(
        &mut self,
        src: BufferHandle,
        dst: ImageHandle,
        timeout: Duration,
    ) -> Result<()> {
        let image = self
            .images
            .get(dst)
            .ok_or_else(|| Error::InvalidResource("stale copy destination".to_string()))?;
        let staging = self
            .buffers
            .get(src)
            .ok_or_else(|| Error::InvalidResource("stale copy source".to_string()))?;
        if staging.desc.size < image.desc.size_bytes() {
            return Err(Error::InvalidResource("staging buffer smaller than image".to_string()));
        }

        let (src, image, desc) = (staging.buffer, image.image, image.desc.clone());
        self.upload.run_blocking(&self.ctx.device, self.ctx.graphics_queue, timeout, |device, cmd| {
            record_image_upload(device, cmd, src, image, &desc)
        })?;
        if let Some(image) = self.images.get_mut(dst) {
            image.ready = true;
        }
        Ok(())
    }

    fn copy_image_region_blocking(
        &mut self,
        src: ImageHandle,
        dst: ImageHandle,
        region: ImageRegion,
        timeout: Duration,
    ) -> Result<()> {
        if src == dst {
            return Err(Error::InvalidResource("image region copy onto itself".to_string()));
        }
        let source = self.shader_ready_image(src, "source")?;
        let target = self.shader_ready_image(dst, "destination")?;
        region.validate(&source.desc, &target.desc)?;

        let (src, dst) = (source.image, target.image);
        self.upload.run_blocking(&self.ctx.device, self.ctx.graphics_queue, timeout, |device, cmd| {
            record_image_region_copy(device, cmd, src, dst, &region)
        })
    }

    // ===== PIPELINES =====

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        let pipeline = VulkanPipeline::create(&self.ctx, desc, self.swapchain.format())?;
        engine_debug!("ember3d::vulkan", "Created pipeline '{}'", pipeline.name);
        Ok(self.pipelines.insert(pipeline))
    }

    fn destroy_pipeline(&mut self, handle: PipelineHandle) {
        if let Some(pipeline) = self.pipelines.remove(handle) {
            self.retire(Retired::Pipeline(pipeline));
        }
    }

    // ===== FRAME RING =====

    fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    fn wait_for_slot(&mut self, slot: usize, timeout: Duration) -> Result<FenceStatus> {
        let status = self.slot(slot)?.wait(&self.ctx.device, timeout)?;
        if status == FenceStatus::Signaled {
            for resource in self.retired.signaled(slot) {
                self.release(resource);
            }
        }
        Ok(status)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let frame = self.slots.get_mut(slot).ok_or_else(|| slot_out_of_range(slot))?;
        frame.reset(&self.ctx.device)
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_available;
        self.swapchain.acquire(semaphore)
    }

    fn begin_commands<'a>(&'a mut self, slot: usize, image_index: u32) -> Result<Box<dyn CommandList + 'a>> {
        let target = self
            .swapchain
            .image(image_index)
            .ok_or_else(|| Error::InvalidResource(format!("swapchain image {} out of range", image_index)))?;

        let frame = self.slots.get_mut(slot).ok_or_else(|| slot_out_of_range(slot))?;
        if frame.state != SlotState::Idle {
            return Err(Error::BackendError(format!("begin_commands on slot {} in state {:?}", slot, frame.state)));
        }

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.ctx
                .device
                .begin_command_buffer(frame.command_buffer, &begin_info)
                .map_err(|e| device_error("begin frame command buffer", e))?;
        }
        frame.state = SlotState::Recording { image_index };

        Ok(Box::new(VulkanCommandList::new(
            &self.ctx.device,
            frame.command_buffer,
            target,
            &self.buffers,
            &self.pipelines,
        )))
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        let frame = self.slots.get_mut(slot).ok_or_else(|| slot_out_of_range(slot))?;
        let SlotState::Recording { image_index } = frame.state else {
            return Err(Error::BackendError(format!("end_commands on slot {} in state {:?}", slot, frame.state)));
        };

        unsafe {
            self.ctx
                .device
                .end_command_buffer(frame.command_buffer)
                .map_err(|e| device_error("end frame command buffer", e))?;
        }
        frame.state = SlotState::Recorded { image_index };
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let frame = self.slots.get_mut(slot).ok_or_else(|| slot_out_of_range(slot))?;
        frame.submit(&self.ctx.device, self.ctx.graphics_queue)?;
        self.retired.submitted(slot);
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let frame = self.slot(slot)?;
        if frame.state != (SlotState::Submitted { image_index }) {
            return Err(Error::BackendError(format!(
                "present of image {} on slot {} in state {:?}",
                image_index, slot, frame.state
            )));
        }
        self.swapchain.present(self.ctx.present_queue, frame.render_finished, image_index)
    }

    fn abandon_frame(&mut self, slot: usize) -> Result<()> {
        self.slot(slot)?;
        self.wait_idle()?;
        let frame = self.slots.get_mut(slot).ok_or_else(|| slot_out_of_range(slot))?;
        engine_warn!("ember3d::vulkan", "Abandoning frame on slot {} in state {:?}", slot, frame.state);
        frame.abandon(&self.ctx.device)
    }

    // ===== SWAPCHAIN =====

    fn swapchain_extent(&self) -> Extent2D {
        self.swapchain.extent()
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        if extent.is_zero() {
            return Err(Error::InvalidResource("zero swapchain extent".to_string()));
        }
        self.wait_idle()?;
        self.swapchain.recreate(&self.ctx, extent)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| device_error("wait for device idle", e))?;
        }
        self.release_deferred();
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.ctx.device.device_wait_idle() {
                engine_error!("ember3d::vulkan", "device_wait_idle failed during drop: {:?}", e);
            }
        }

        self.release_deferred();

        if !self.buffers.is_empty() || !self.images.is_empty() {
            let stats = self.memory_stats();
            engine_warn!(
                "ember3d::vulkan",
                "Destroying {} resources ({} bytes) still allocated",
                stats.live_count,
                stats.live_bytes
            );
        }

        for (_, pipeline) in self.pipelines.drain() {
            pipeline.destroy(&self.ctx.device);
        }
        for image in self.images.drain() {
            image.destroy(&mut self.ctx);
        }
        for buffer in self.buffers.drain() {
            buffer.destroy(&mut self.ctx);
        }
        for slot in &mut self.slots {
            slot.destroy(&self.ctx.device);
        }
        self.upload.destroy(&self.ctx.device);
        self.swapchain.destroy(&self.ctx.device);
    }
}
