/// GraphicsDevice trait - the backend seam of the engine
///
/// One device owns the GPU allocator, the transfer path, the swapchain and
/// the frame-in-flight resources. It lives inside the engine context and is
/// only reached through `&mut` borrows, so implementations need no locking.

use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::{
    AcquireOutcome, BufferDesc, BufferHandle, CommandList, Extent2D, FenceStatus,
    ImageDesc, ImageHandle, ImageRegion, MemoryStats, PipelineDesc, PipelineHandle, PresentOutcome,
};

/// Backend device: allocation, transfer, pipelines, frame ring, swapchain
pub trait GraphicsDevice {
    // ===== ALLOCATION =====

    /// Allocate a buffer of exactly `desc.size` bytes
    ///
    /// # Errors
    ///
    /// * `OutOfDeviceMemory` if the device or the configured budget cannot satisfy it
    /// * `InvalidResource` for a zero-sized request
    fn allocate_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;

    /// Release a buffer. Freeing a stale handle is a no-op.
    ///
    /// The handle is invalid at once. The GPU memory is only destroyed
    /// after every frame submitted before the free has completed.
    fn free_buffer(&mut self, handle: BufferHandle);

    /// Descriptor of a live buffer
    fn buffer_info(&self, handle: BufferHandle) -> Option<BufferDesc>;

    /// Write into a host-visible buffer
    fn write_buffer(&mut self, handle: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Read back from a host-visible buffer
    fn read_buffer(&self, handle: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>>;

    /// Allocate a device-local sampled image with `desc.mip_levels` levels
    ///
    /// # Errors
    ///
    /// `InvalidResource` for a zero extent or an impossible mip count, plus
    /// the buffer allocation errors.
    fn allocate_image(&mut self, desc: &ImageDesc) -> Result<ImageHandle>;

    /// Release an image. Freeing a stale handle is a no-op. Destruction is
    /// deferred like `free_buffer`.
    fn free_image(&mut self, handle: ImageHandle);

    /// Descriptor of a live image
    fn image_info(&self, handle: ImageHandle) -> Option<ImageDesc>;

    /// Live memory accounting across buffers and images
    fn memory_stats(&self) -> MemoryStats;

    // ===== TRANSFER =====

    /// Copy `size` bytes from `src` to `dst` with a one-shot command and
    /// block until the transfer fence signals or `timeout` elapses
    ///
    /// # Errors
    ///
    /// `TransferFailed` on submission failure, fence failure or timeout
    fn copy_buffer_blocking(
        &mut self,
        src: BufferHandle,
        dst: BufferHandle,
        size: u64,
        timeout: Duration,
    ) -> Result<()>;

    /// Copy a whole image's pixel data, every mip level packed level 0
    /// first, from `src` and leave the image ready for shader reads
    fn copy_buffer_to_image_blocking(
        &mut self,
        src: BufferHandle,
        dst: ImageHandle,
        timeout: Duration,
    ) -> Result<()>;

    /// Copy a rectangle of level 0 between two uploaded images of the same
    /// format. Both stay ready for shader reads.
    ///
    /// # Errors
    ///
    /// * `InvalidResource` for stale handles, `src == dst`, an image never
    ///   uploaded, or a region rejected by `ImageRegion::validate`
    /// * `TransferFailed` as for buffer copies
    fn copy_image_region_blocking(
        &mut self,
        src: ImageHandle,
        dst: ImageHandle,
        region: ImageRegion,
        timeout: Duration,
    ) -> Result<()>;

    // ===== PIPELINES =====

    /// Create a graphics pipeline targeting the swapchain format
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle>;

    /// Destroy a pipeline. Destroying a stale handle is a no-op. Destruction
    /// is deferred like `free_buffer`.
    fn destroy_pipeline(&mut self, handle: PipelineHandle);

    // ===== FRAME RING =====

    /// Depth of the frame-in-flight ring
    fn frames_in_flight(&self) -> usize;

    /// Block until the slot's in-flight fence signals or `timeout` elapses
    fn wait_for_slot(&mut self, slot: usize, timeout: Duration) -> Result<FenceStatus>;

    /// Reset the slot's command buffer for a new frame
    ///
    /// Only valid after the fence was observed signaled and an image was
    /// acquired for this frame. Backends may defer unsignaling the fence to
    /// `submit`.
    fn reset_slot(&mut self, slot: usize) -> Result<()>;

    /// Acquire the next swapchain image, signalling the slot's
    /// image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome>;

    /// Begin recording the slot's command buffer for a swapchain image
    fn begin_commands<'a>(&'a mut self, slot: usize, image_index: u32) -> Result<Box<dyn CommandList + 'a>>;

    /// Finish recording the slot's command buffer
    fn end_commands(&mut self, slot: usize) -> Result<()>;

    /// Submit the slot's command buffer: wait image-available, signal
    /// render-finished and the in-flight fence
    fn submit(&mut self, slot: usize) -> Result<()>;

    /// Present a swapchain image after the slot's render-finished semaphore
    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome>;

    /// Give up a frame that acquired an image but was never submitted
    ///
    /// Drains the device, consumes the slot's image-available semaphore and
    /// returns the slot to a waitable, unrecorded state. The acquired image
    /// is only released by the swapchain recreation that must follow.
    fn abandon_frame(&mut self, slot: usize) -> Result<()>;

    // ===== SWAPCHAIN =====

    /// Current swapchain extent
    fn swapchain_extent(&self) -> Extent2D;

    /// Destroy the old swapchain and its views and rebuild at `extent`
    ///
    /// The caller must have drained all in-flight work (`wait_idle`).
    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()>;

    /// Wait for all GPU operations to complete
    fn wait_idle(&mut self) -> Result<()>;
}
