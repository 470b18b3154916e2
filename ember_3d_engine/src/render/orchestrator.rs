//! Frame orchestrator
//!
//! Runs one frame per call:
//!
//! ```text
//! WaitForSlot -> AcquireImage -> RecordCommands -> Submit -> Present
//!                    |                                         |
//!                    +--(out of date)--> RecreateSwapchain <---+--(out of date / suboptimal)
//! ```
//!
//! A zero window extent skips the frame entirely. Resizes are latched and
//! applied at the start of the next frame. A frame whose acquire reports
//! "out of date" recreates the swapchain and starts over without rendering,
//! at most `MAX_FRAME_RESTARTS` times.
//!
//! A frame that fails between a successful acquire and its submission is
//! abandoned: the device drops the acquired image's semaphore signal and
//! the swapchain is recreated so the image goes back to the presentation
//! engine. The original error is returned.

use glam::{Mat4, Vec3};
use crate::config::{Capabilities, Config};
use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, CommandList, Extent2D, GraphicsDevice, MeshPushConstants, PipelineHandle,
    PresentOutcome, Rect2D, RenderingInfo, ShaderStages, Viewport,
};
use crate::render::FrameRing;
use crate::resource::DrawItem;
use crate::{engine_debug, engine_error, engine_info, engine_warn};

const SOURCE: &str = "ember3d::Frame";

/// Restarts allowed per frame after an out-of-date acquire
pub const MAX_FRAME_RESTARTS: u32 = 3;

/// Camera and clock inputs of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view_projection: Mat4,
    pub camera_position: Vec3,
    /// Seconds since startup
    pub time: f32,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            view_projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            time: 0.0,
        }
    }
}

/// What `render_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Rendered and presented
    Presented,
    /// Window minimised; nothing was acquired, recorded or submitted
    SkippedMinimized,
    /// The swapchain was recreated during this frame
    SwapchainRecreated,
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames handed to the presentation engine, including presents that
    /// reported a suboptimal swapchain
    pub frames_presented: u64,
    pub frames_skipped_minimized: u64,
    pub swapchain_recreations: u64,
    /// Draw calls of the last recorded frame
    pub draw_calls: u32,
    /// Triangles of the last recorded frame
    pub triangles: u32,
}

/// Records extra UI commands at the end of the frame's rendering scope
pub trait OverlayRenderer {
    fn record(&mut self, cmd: &mut dyn CommandList, extent: Extent2D) -> Result<()>;
}

pub struct FrameOrchestrator {
    ring: FrameRing,
    clear_color: [f32; 4],
    window_extent: Extent2D,
    resize_pending: bool,
    overlay_enabled: bool,
    overlay: Option<Box<dyn OverlayRenderer>>,
    stats: FrameStats,
}

impl FrameOrchestrator {
    pub fn new(config: &Config, window_extent: Extent2D) -> Result<Self> {
        Ok(Self {
            ring: FrameRing::new(config.frames_in_flight, config.fence_timeout)?,
            clear_color: config.clear_color,
            window_extent,
            resize_pending: false,
            overlay_enabled: config.has(Capabilities::UI_OVERLAY),
            overlay: None,
            stats: FrameStats::default(),
        })
    }

    /// Install the overlay hook. It is only recorded when the
    /// `UI_OVERLAY` capability is enabled.
    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayRenderer>) {
        if !self.overlay_enabled {
            engine_warn!(SOURCE, "Overlay installed without the UI_OVERLAY capability; it will not be recorded");
        }
        self.overlay = Some(overlay);
    }

    /// Latch a new window extent; the swapchain follows on the next frame
    pub fn handle_resize(&mut self, extent: Extent2D) {
        if extent != self.window_extent {
            engine_debug!(SOURCE, "Window resized to {}x{}", extent.width, extent.height);
            self.window_extent = extent;
            self.resize_pending = true;
        }
    }

    pub fn window_extent(&self) -> Extent2D {
        self.window_extent
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Render one frame of `draw_list`
    ///
    /// # Errors
    ///
    /// `DeviceLost` (fatal) when a frame fence times out, plus any backend
    /// failure while acquiring, recording, submitting or presenting.
    /// Out-of-date and suboptimal swapchains are handled here and never
    /// returned.
    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        draw_list: &[DrawItem],
        params: &FrameParams,
    ) -> Result<FrameOutcome> {
        if self.window_extent.is_zero() {
            self.stats.frames_skipped_minimized += 1;
            return Ok(FrameOutcome::SkippedMinimized);
        }

        let mut recreated = false;
        if self.resize_pending {
            self.recreate_swapchain(device)?;
            recreated = true;
        }

        for attempt in 0..=MAX_FRAME_RESTARTS {
            let slot = self.ring.begin_slot(device)?;

            let (image_index, acquire_suboptimal) = match device.acquire_image(slot)? {
                AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
                AcquireOutcome::OutOfDate => {
                    engine_debug!(SOURCE, "Swapchain out of date on acquire (attempt {})", attempt + 1);
                    self.recreate_swapchain(device)?;
                    recreated = true;
                    continue;
                }
            };

            if let Err(err) = self.record_and_submit(device, slot, image_index, draw_list, params) {
                return Err(self.abandon_frame(device, slot, err));
            }
            self.ring.mark_submitted(slot)?;

            let present = device.present(slot, image_index)?;
            if present != PresentOutcome::OutOfDate {
                self.stats.frames_presented += 1;
            }
            if acquire_suboptimal || present != PresentOutcome::Presented {
                engine_debug!(SOURCE, "Swapchain {:?} after present, recreating", present);
                self.recreate_swapchain(device)?;
                recreated = true;
            }

            return Ok(if recreated {
                FrameOutcome::SwapchainRecreated
            } else {
                FrameOutcome::Presented
            });
        }

        engine_warn!(
            SOURCE,
            "Swapchain still out of date after {} restarts, dropping frame",
            MAX_FRAME_RESTARTS
        );
        Ok(FrameOutcome::SwapchainRecreated)
    }

    fn record_and_submit(
        &mut self,
        device: &mut dyn GraphicsDevice,
        slot: usize,
        image_index: u32,
        draw_list: &[DrawItem],
        params: &FrameParams,
    ) -> Result<()> {
        self.ring.ensure_recordable(slot)?;
        device.reset_slot(slot)?;
        self.record(device, slot, image_index, draw_list, params)?;
        device.submit(slot)
    }

    /// Recover from `err` on a frame that acquired an image but never
    /// submitted, and return the error to report
    fn abandon_frame(&mut self, device: &mut dyn GraphicsDevice, slot: usize, err: Error) -> Error {
        engine_warn!(SOURCE, "Frame on slot {} failed after acquire: {}", slot, err);
        let recovered = match device.abandon_frame(slot) {
            Ok(()) => self.recreate_swapchain(device),
            Err(recovery) => Err(recovery),
        };
        match recovered {
            Ok(()) => err,
            Err(recovery) => {
                engine_error!(SOURCE, "Could not recover slot {}: {}", slot, recovery);
                if recovery.is_fatal() { recovery } else { err }
            }
        }
    }

    /// Drain the GPU and rebuild the swapchain at the latched window extent
    fn recreate_swapchain(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        device.wait_idle()?;
        self.ring.mark_all_idle();
        device.recreate_swapchain(self.window_extent)?;
        self.resize_pending = false;
        self.stats.swapchain_recreations += 1;

        let extent = device.swapchain_extent();
        engine_info!(SOURCE, "Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(())
    }

    fn record(
        &mut self,
        device: &mut dyn GraphicsDevice,
        slot: usize,
        image_index: u32,
        draw_list: &[DrawItem],
        params: &FrameParams,
    ) -> Result<()> {
        let extent = device.swapchain_extent();
        let mut draw_calls = 0;
        let mut triangles = 0;

        {
            let mut cmd = device.begin_commands(slot, image_index)?;
            cmd.begin_rendering(&RenderingInfo::for_swapchain(extent, self.clear_color))?;
            cmd.set_viewport(Viewport::from_extent(extent))?;
            cmd.set_scissor(Rect2D::from_extent(extent))?;

            let mut bound: Option<PipelineHandle> = None;
            for item in draw_list {
                let mesh = &item.mesh;
                let pipeline = mesh.material().pipeline();
                if bound != Some(pipeline) {
                    cmd.bind_pipeline(pipeline)?;
                    bound = Some(pipeline);
                }

                let constants = MeshPushConstants::new(
                    item.transform,
                    params.view_projection,
                    params.camera_position,
                    params.time,
                );
                cmd.push_constants(ShaderStages::VERTEX | ShaderStages::FRAGMENT, 0, constants.as_bytes())?;
                cmd.bind_vertex_buffer(mesh.vertex_buffer(), 0)?;

                match mesh.index_buffer() {
                    Some(index_buffer) => {
                        cmd.bind_index_buffer(index_buffer, 0, mesh.index_type())?;
                        cmd.draw_indexed(mesh.index_count(), 0, 0)?;
                    }
                    None => cmd.draw(mesh.vertex_count(), 0)?,
                }

                draw_calls += 1;
                triangles += mesh.triangle_count();
            }

            if self.overlay_enabled {
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.record(cmd.as_mut(), extent)?;
                }
            }

            cmd.end_rendering()?;
        }
        device.end_commands(slot)?;

        self.stats.draw_calls = draw_calls;
        self.stats.triangles = triangles;
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
