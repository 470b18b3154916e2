/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Buffers and images keep their bytes in host memory, copies complete
/// immediately, and the frame ring and swapchain are simulated closely
/// enough to check ordering: every fence wait, reset, acquire, submit,
/// present and recreate is logged in `events`, and every misuse of the
/// synchronization protocol is appended to `violations`.
///
/// Freed resources go through the same retire queue as a real backend.
/// Destroying a buffer that a still-executing frame recorded a bind of is
/// reported as a violation.

use std::time::Duration;
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::graphics_device::{
    check_request, AcquireOutcome, BufferDesc, BufferHandle, CommandList, Extent2D,
    FenceStatus, GraphicsDevice, ImageDesc, ImageHandle, ImageRegion, IndexType, MemoryProperty,
    MemoryStats, PipelineDesc, PipelineHandle, PooledResource, PresentOutcome, Rect2D,
    RenderingInfo, ResourcePool, RetireQueue, ShaderStages, Viewport,
};

// ============================================================================
// Mock resources
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub desc: BufferDesc,
    pub data: Vec<u8>,
}

impl PooledResource for MockBuffer {
    fn size_bytes(&self) -> u64 {
        self.desc.size
    }
}

#[derive(Debug)]
pub struct MockImage {
    pub desc: ImageDesc,
    pub data: Vec<u8>,
    /// Pixel data copied and image transitioned for shader reads
    pub shader_ready: bool,
}

impl PooledResource for MockImage {
    fn size_bytes(&self) -> u64 {
        self.desc.size_bytes()
    }
}

/// Freed resource waiting for the frames that may still use it
#[derive(Debug)]
enum MockRetired {
    Buffer(BufferHandle, MockBuffer),
    Image(MockImage),
    Pipeline(PipelineDesc),
}

impl MockRetired {
    fn name(&self) -> &str {
        match self {
            MockRetired::Buffer(_, buffer) => &buffer.desc.name,
            MockRetired::Image(image) => &image.desc.name,
            MockRetired::Pipeline(desc) => &desc.name,
        }
    }
}

impl PooledResource for MockRetired {
    fn size_bytes(&self) -> u64 {
        match self {
            MockRetired::Buffer(_, buffer) => buffer.size_bytes(),
            MockRetired::Image(image) => image.size_bytes(),
            MockRetired::Pipeline(_) => 0,
        }
    }
}

// ============================================================================
// Frame ring simulation
// ============================================================================

/// Synchronization event observed by the mock device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    FenceWait { slot: usize, status: FenceStatus },
    SlotReset { slot: usize },
    Acquire { slot: usize, outcome: AcquireOutcome },
    Submit { slot: usize },
    Present { slot: usize, image_index: u32, outcome: PresentOutcome },
    Abandon { slot: usize },
    WaitIdle,
    Recreate { extent: Extent2D },
}

#[derive(Debug, Clone, Copy, Default)]
struct MockSlot {
    /// Submitted and fence not yet signaled
    in_flight: bool,
    /// Fence observed signaled since the last reset
    fence_observed: bool,
    /// Reset since the last submit
    reset: bool,
    /// Image-available semaphore signaled and not yet waited on
    image_available: bool,
}

// ============================================================================
// Mock device
// ============================================================================

pub struct MockDevice {
    buffers: ResourcePool<BufferHandle, MockBuffer>,
    images: ResourcePool<ImageHandle, MockImage>,
    pipelines: SlotMap<PipelineHandle, PipelineDesc>,
    budget: Option<u64>,
    slots: Vec<MockSlot>,
    /// Buffers bound by each slot's last recording
    slot_buffers: Vec<Vec<BufferHandle>>,
    retired: RetireQueue<MockRetired>,
    swapchain_extent: Extent2D,
    image_count: u32,
    next_image: u32,

    /// Current size of the window surface
    pub surface_extent: Extent2D,
    /// Copies that succeed before every further copy fails (None = never fail)
    pub fail_after_copies: Option<usize>,
    /// Successful copies so far
    pub copies: usize,
    /// Fences of submitted slots never signal
    pub hang_fences: bool,
    /// The next submit fails without signaling anything
    pub fail_next_submit: bool,
    /// Every acquire reports out of date, even after recreation
    pub stuck_out_of_date: bool,
    /// Number of upcoming acquires reporting suboptimal
    pub suboptimal_acquires: u32,
    /// Number of upcoming presents reporting suboptimal
    pub suboptimal_presents: u32,
    /// Images presented (including suboptimal presents)
    pub presented: u64,
    /// Recorded commands, in order, across all frames
    pub commands: Vec<String>,
    /// Names of resources actually destroyed, in order
    pub destroyed: Vec<String>,
    /// Synchronization events, in order
    pub events: Vec<MockEvent>,
    /// Protocol misuse detected by the mock
    pub violations: Vec<String>,
}

impl MockDevice {
    pub fn new(frames_in_flight: usize, extent: Extent2D) -> Self {
        Self {
            buffers: ResourcePool::new(),
            images: ResourcePool::new(),
            pipelines: SlotMap::with_key(),
            budget: None,
            slots: vec![MockSlot::default(); frames_in_flight],
            slot_buffers: vec![Vec::new(); frames_in_flight],
            retired: RetireQueue::new(frames_in_flight),
            swapchain_extent: extent,
            image_count: 3,
            next_image: 0,
            surface_extent: extent,
            fail_after_copies: None,
            copies: 0,
            hang_fences: false,
            fail_next_submit: false,
            stuck_out_of_date: false,
            suboptimal_acquires: 0,
            suboptimal_presents: 0,
            presented: 0,
            commands: Vec::new(),
            destroyed: Vec::new(),
            events: Vec::new(),
            violations: Vec::new(),
        }
    }

    /// Device whose live memory may not exceed `budget` bytes
    pub fn with_budget(frames_in_flight: usize, extent: Extent2D, budget: u64) -> Self {
        let mut device = Self::new(frames_in_flight, extent);
        device.budget = Some(budget);
        device
    }

    /// Bytes held by a buffer, regardless of its memory placement
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(handle).map(|b| b.data.as_slice())
    }

    /// Bytes held by an image
    pub fn image_contents(&self, handle: ImageHandle) -> Option<&MockImage> {
        self.images.get(handle)
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of submissions logged so far
    pub fn submissions(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, MockEvent::Submit { .. })).count()
    }

    /// Number of swapchain recreations logged so far
    pub fn recreations(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, MockEvent::Recreate { .. })).count()
    }

    /// Freed resources not yet destroyed
    pub fn pending_destroy(&self) -> usize {
        self.retired.len()
    }

    /// Device memory held, including freed resources not yet destroyed
    fn live_bytes(&self) -> u64 {
        let pending: u64 = self.retired.pending().map(PooledResource::size_bytes).sum();
        self.buffers.stats().live_bytes + self.images.stats().live_bytes + pending
    }

    fn retire(&mut self, resource: MockRetired) {
        if let Some(resource) = self.retired.retire(resource) {
            self.destroy(resource);
        }
    }

    fn destroy(&mut self, resource: MockRetired) {
        if let MockRetired::Buffer(handle, _) = &resource {
            for (slot, state) in self.slots.iter().enumerate() {
                if state.in_flight && self.slot_buffers[slot].contains(handle) {
                    self.violations.push(format!(
                        "buffer '{}' destroyed while slot {} may still read it",
                        resource.name(), slot
                    ));
                }
            }
        }
        self.destroyed.push(resource.name().to_string());
    }

    fn slot(&mut self, slot: usize) -> Result<&mut MockSlot> {
        self.slots
            .get_mut(slot)
            .ok_or_else(|| Error::InvalidResource(format!("frame slot {} out of range", slot)))
    }

    fn run_copy(&mut self) -> Result<()> {
        if let Some(limit) = self.fail_after_copies {
            if self.copies >= limit {
                return Err(Error::TransferFailed("simulated transfer fence failure".to_string()));
            }
        }
        self.copies += 1;
        Ok(())
    }
}

impl GraphicsDevice for MockDevice {
    // ===== ALLOCATION =====

    fn allocate_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        check_request(desc.size, self.live_bytes(), self.budget)?;
        Ok(self.buffers.insert(MockBuffer {
            desc: desc.clone(),
            data: vec![0; desc.size as usize],
        }))
    }

    fn free_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(handle) {
            self.retire(MockRetired::Buffer(handle, buffer));
        }
    }

    fn buffer_info(&self, handle: BufferHandle) -> Option<BufferDesc> {
        self.buffers.get(handle).map(|b| b.desc.clone())
    }

    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let buffer = self.buffers.get_mut(handle)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
        if buffer.desc.memory != MemoryProperty::HostVisible {
            return Err(Error::InvalidResource(format!("buffer '{}' is not host-visible", buffer.desc.name)));
        }
        let end = offset + data.len() as u64;
        if end > buffer.desc.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds buffer '{}' ({} bytes)",
                data.len(), offset, buffer.desc.name, buffer.desc.size
            )));
        }
        buffer.data[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, handle: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        let buffer = self.buffers.get(handle)
            .ok_or_else(|| Error::InvalidResource("stale buffer handle".to_string()))?;
        if buffer.desc.memory != MemoryProperty::HostVisible {
            return Err(Error::InvalidResource(format!("buffer '{}' is not host-visible", buffer.desc.name)));
        }
        if offset + len > buffer.desc.size {
            return Err(Error::InvalidResource("read past end of buffer".to_string()));
        }
        Ok(buffer.data[offset as usize..(offset + len) as usize].to_vec())
    }

    fn allocate_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle> {
        desc.validate()?;
        check_request(desc.size_bytes(), self.live_bytes(), self.budget)?;
        Ok(self.images.insert(MockImage {
            desc: desc.clone(),
            data: vec![0; desc.size_bytes() as usize],
            shader_ready: false,
        }))
    }

    fn free_image(&mut self, handle: ImageHandle) {
        if let Some(image) = self.images.remove(handle) {
            self.retire(MockRetired::Image(image));
        }
    }

    fn image_info(&self, handle: ImageHandle) -> Option<ImageDesc> {
        self.images.get(handle).map(|i| i.desc.clone())
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
        _timeout: Duration,
    ) -> Result<()> {
        let data = {
            let src = self.buffers.get(src)
                .ok_or_else(|| Error::InvalidResource("stale copy source".to_string()))?;
            if size > src.desc.size {
                return Err(Error::InvalidResource("copy larger than source".to_string()));
            }
            src.data[..size as usize].to_vec()
        };
        let dst_size = self.buffers.get(dst)
            .ok_or_else(|| Error::InvalidResource("stale copy destination".to_string()))?
            .desc.size;
        if size > dst_size {
            return Err(Error::InvalidResource("copy larger than destination".to_string()));
        }

        self.run_copy()?;

        if let Some(dst) = self.buffers.get_mut(dst) {
            dst.data[..size as usize].copy_from_slice(&data);
        }
        Ok(())
    }

    fn copy_buffer_to_image_blocking(
        &mut self,
        src: BufferHandle,
        dst: ImageHandle,
        _timeout: Duration,
    ) -> Result<()> {
        let image_size = self.images.get(dst)
            .ok_or_else(|| Error::InvalidResource("stale copy destination".to_string()))?
            .desc.size_bytes();
        let data = {
            let src = self.buffers.get(src)
                .ok_or_else(|| Error::InvalidResource("stale copy source".to_string()))?;
            if src.desc.size < image_size {
                return Err(Error::InvalidResource("staging buffer smaller than image".to_string()));
            }
            src.data[..image_size as usize].to_vec()
        };

        self.run_copy()?;

        if let Some(image) = self.images.get_mut(dst) {
            image.data = data;
            image.shader_ready = true;
        }
        Ok(())
    }

    fn copy_image_region_blocking(
        &mut self,
        src: ImageHandle,
        dst: ImageHandle,
        region: ImageRegion,
        _timeout: Duration,
    ) -> Result<()> {
        if src == dst {
            return Err(Error::InvalidResource("image region copy onto itself".to_string()));
        }
        let source = self.images.get(src)
            .ok_or_else(|| Error::InvalidResource("stale copy source".to_string()))?;
        let target = self.images.get(dst)
            .ok_or_else(|| Error::InvalidResource("stale copy destination".to_string()))?;
        region.validate(&source.desc, &target.desc)?;
        for image in [source, target] {
            if !image.shader_ready {
                return Err(Error::InvalidResource(format!("image '{}' was never uploaded", image.desc.name)));
            }
        }

        let bpp = source.desc.format.bytes_per_pixel() as usize;
        let row_bytes = region.width as usize * bpp;
        let src_stride = source.desc.width as usize * bpp;
        let rows: Vec<Vec<u8>> = (0..region.height as usize)
            .map(|row| {
                let start = (region.src_y as usize + row) * src_stride + region.src_x as usize * bpp;
                source.data[start..start + row_bytes].to_vec()
            })
            .collect();

        self.run_copy()?;

        if let Some(target) = self.images.get_mut(dst) {
            let dst_stride = target.desc.width as usize * bpp;
            for (row, bytes) in rows.iter().enumerate() {
                let start = (region.dst_y as usize + row) * dst_stride + region.dst_x as usize * bpp;
                target.data[start..start + row_bytes].copy_from_slice(bytes);
            }
        }
        Ok(())
    }

    // ===== PIPELINES =====

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        if desc.vertex_spirv.is_empty() || desc.fragment_spirv.is_empty() {
            return Err(Error::InvalidResource(format!("pipeline '{}' is missing shader code", desc.name)));
        }
        Ok(self.pipelines.insert(desc.clone()))
    }

    fn destroy_pipeline(&mut self, handle: PipelineHandle) {
        if let Some(desc) = self.pipelines.remove(handle) {
            self.retire(MockRetired::Pipeline(desc));
        }
    }

    // ===== FRAME RING =====

    fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    fn wait_for_slot(&mut self, slot: usize, _timeout: Duration) -> Result<FenceStatus> {
        let hang = self.hang_fences;
        let state = self.slot(slot)?;
        let status = if hang && state.in_flight {
            FenceStatus::TimedOut
        } else {
            state.in_flight = false;
            state.fence_observed = true;
            FenceStatus::Signaled
        };
        self.events.push(MockEvent::FenceWait { slot, status });
        if status == FenceStatus::Signaled {
            for resource in self.retired.signaled(slot) {
                self.destroy(resource);
            }
        }
        Ok(status)
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let state = *self.slot(slot)?;
        if !state.fence_observed {
            self.violations.push(format!("slot {} reset before its fence was observed signaled", slot));
        }
        if !state.image_available {
            self.violations.push(format!("slot {} reset without an acquired image", slot));
        }
        let state = self.slot(slot)?;
        state.fence_observed = false;
        state.reset = true;
        self.events.push(MockEvent::SlotReset { slot });
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let state = *self.slot(slot)?;
        if self.surface_extent.is_zero() {
            self.violations.push(format!("slot {} acquired at zero extent", slot));
        }
        if state.image_available {
            self.violations.push(format!("slot {} acquired with its semaphore still signaled", slot));
        }

        let outcome = if self.stuck_out_of_date || self.surface_extent != self.swapchain_extent {
            AcquireOutcome::OutOfDate
        } else {
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            let suboptimal = self.suboptimal_acquires > 0;
            self.suboptimal_acquires = self.suboptimal_acquires.saturating_sub(1);
            self.slot(slot)?.image_available = true;
            AcquireOutcome::Acquired { image_index, suboptimal }
        };
        self.events.push(MockEvent::Acquire { slot, outcome });
        Ok(outcome)
    }

    fn begin_commands<'a>(&'a mut self, slot: usize, image_index: u32) -> Result<Box<dyn CommandList + 'a>> {
        let state = *self.slot(slot)?;
        if !state.reset {
            self.violations.push(format!("slot {} recorded without a reset", slot));
        }
        self.commands.push(format!("begin(slot={}, image={})", slot, image_index));
        let bound = &mut self.slot_buffers[slot];
        bound.clear();
        Ok(Box::new(MockCommandList {
            commands: &mut self.commands,
            bound,
            buffers: &self.buffers,
            pipelines: &self.pipelines,
            rendering: false,
            pipeline_bound: false,
        }))
    }

    fn end_commands(&mut self, slot: usize) -> Result<()> {
        self.slot(slot)?;
        self.commands.push("end".to_string());
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let state = *self.slot(slot)?;
        if !state.reset {
            self.violations.push(format!("slot {} submitted without a reset", slot));
        }
        if !state.image_available {
            self.violations.push(format!("slot {} submitted without an acquired image", slot));
        }
        if self.fail_next_submit {
            self.fail_next_submit = false;
            return Err(Error::BackendError(format!("simulated queue submit failure on slot {}", slot)));
        }
        let state = self.slot(slot)?;
        state.in_flight = true;
        state.reset = false;
        state.image_available = false;
        self.retired.submitted(slot);
        self.events.push(MockEvent::Submit { slot });
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        self.slot(slot)?;
        let outcome = if self.surface_extent != self.swapchain_extent {
            PresentOutcome::OutOfDate
        } else if self.suboptimal_presents > 0 {
            self.suboptimal_presents -= 1;
            self.presented += 1;
            PresentOutcome::Suboptimal
        } else {
            self.presented += 1;
            PresentOutcome::Presented
        };
        self.events.push(MockEvent::Present { slot, image_index, outcome });
        Ok(outcome)
    }

    fn abandon_frame(&mut self, slot: usize) -> Result<()> {
        self.slot(slot)?;
        self.wait_idle()?;
        let state = self.slot(slot)?;
        state.image_available = false;
        state.reset = false;
        self.events.push(MockEvent::Abandon { slot });
        Ok(())
    }

    // ===== SWAPCHAIN =====

    fn swapchain_extent(&self) -> Extent2D {
        self.swapchain_extent
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        if self.slots.iter().any(|s| s.in_flight) {
            self.violations.push("swapchain recreated with work in flight".to_string());
        }
        if extent.is_zero() {
            self.violations.push("swapchain recreated at zero extent".to_string());
            return Err(Error::InvalidResource("zero swapchain extent".to_string()));
        }
        // a defined surface extent wins over the requested one
        let extent = if self.surface_extent.is_zero() { extent } else { self.surface_extent };
        self.swapchain_extent = extent;
        self.next_image = 0;
        self.events.push(MockEvent::Recreate { extent });
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        for slot in &mut self.slots {
            slot.in_flight = false;
        }
        for resource in self.retired.idle() {
            self.destroy(resource);
        }
        self.events.push(MockEvent::WaitIdle);
        Ok(())
    }
}

// ============================================================================
// Mock command list
// ============================================================================

pub struct MockCommandList<'a> {
    commands: &'a mut Vec<String>,
    bound: &'a mut Vec<BufferHandle>,
    buffers: &'a ResourcePool<BufferHandle, MockBuffer>,
    pipelines: &'a SlotMap<PipelineHandle, PipelineDesc>,
    rendering: bool,
    pipeline_bound: bool,
}

impl MockCommandList<'_> {
    fn require_rendering(&self, command: &str) -> Result<()> {
        if !self.rendering {
            return Err(Error::BackendError(format!("{} outside a rendering scope", command)));
        }
        Ok(())
    }
}

impl CommandList for MockCommandList<'_> {
    fn begin_rendering(&mut self, info: &RenderingInfo) -> Result<()> {
        if self.rendering {
            return Err(Error::BackendError("rendering scope already open".to_string()));
        }
        self.rendering = true;
        self.commands.push(format!(
            "begin_rendering({}x{})",
            info.render_area.width, info.render_area.height
        ));
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.require_rendering("end_rendering")?;
        self.rendering = false;
        self.commands.push("end_rendering".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!("set_viewport({}x{})", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands.push(format!("set_scissor({}x{})", scissor.width, scissor.height));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let desc = self.pipelines.get(pipeline)
            .ok_or_else(|| Error::InvalidResource("stale pipeline handle".to_string()))?;
        self.pipeline_bound = true;
        self.commands.push(format!("bind_pipeline({})", desc.name));
        Ok(())
    }

    fn push_constants(&mut self, _stages: ShaderStages, offset: u32, data: &[u8]) -> Result<()> {
        if !self.pipeline_bound {
            return Err(Error::BackendError("push_constants without a bound pipeline".to_string()));
        }
        self.commands.push(format!("push_constants({}, {})", offset, data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, handle: BufferHandle, offset: u64) -> Result<()> {
        let buffer = self.buffers.get(handle)
            .ok_or_else(|| Error::InvalidResource("stale vertex buffer handle".to_string()))?;
        self.bound.push(handle);
        self.commands.push(format!("bind_vertex_buffer({}, {})", buffer.desc.name, offset));
        Ok(())
    }

    fn bind_index_buffer(&mut self, handle: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        let buffer = self.buffers.get(handle)
            .ok_or_else(|| Error::InvalidResource("stale index buffer handle".to_string()))?;
        self.bound.push(handle);
        self.commands.push(format!("bind_index_buffer({}, {}, {:?})", buffer.desc.name, offset, index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_rendering("draw")?;
        self.commands.push(format!("draw({}, {})", vertex_count, first_vertex));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_rendering("draw_indexed")?;
        self.commands.push(format!("draw_indexed({}, {}, {})", index_count, first_index, vertex_offset));
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
