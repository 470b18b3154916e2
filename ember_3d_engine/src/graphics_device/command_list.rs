/// CommandList trait - for recording one frame's rendering commands

use crate::error::Result;
use crate::graphics_device::{BufferHandle, Extent2D, IndexType, PipelineHandle, ShaderStages};

/// Command list recording into a frame slot's command buffer
///
/// Obtained from `GraphicsDevice::begin_commands()` and borrowed from the
/// device for the duration of recording. Resources are referenced through
/// handles; a stale handle fails with `InvalidResource`.
pub trait CommandList {
    /// Begin dynamic rendering into the acquired swapchain image
    ///
    /// Transitions the image to colour-attachment layout first.
    fn begin_rendering(&mut self, info: &RenderingInfo) -> Result<()>;

    /// End dynamic rendering and transition the image for presentation
    fn end_rendering(&mut self) -> Result<()>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()>;

    /// Push constants to the bound pipeline
    ///
    /// # Arguments
    ///
    /// * `stages` - Shader stages that will access the push constants
    /// * `offset` - Offset in bytes into push constant range
    /// * `data` - Data to push
    fn push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) -> Result<()>;

    /// Bind a vertex buffer at binding 0
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()>;

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()>;

    /// Draw vertices
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices to draw
    /// * `first_vertex` - Index of first vertex
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Draw indexed vertices
    ///
    /// # Arguments
    ///
    /// * `index_count` - Number of indices to draw
    /// * `first_index` - Index of first index
    /// * `vertex_offset` - Value added to vertex index before indexing into the vertex buffer
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()>;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-extent viewport with a [0, 1] depth range
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    /// Rectangle covering the whole extent
    pub fn from_extent(extent: Extent2D) -> Self {
        Self { x: 0, y: 0, width: extent.width, height: extent.height }
    }
}

// ===== ATTACHMENT INFO =====

/// What happens to the attachment's contents at the start of rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    /// Clear to the given RGBA colour
    Clear([f32; 4]),
    /// Keep the previous contents
    Load,
    /// Contents are undefined
    DontCare,
}

/// What happens to the attachment's contents at the end of rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Write the results
    Store,
    /// Results may be discarded
    DontCare,
}

/// Colour attachment of a dynamic rendering scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

/// Attachment info for one dynamic rendering scope over a swapchain image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingInfo {
    /// Rendered area
    pub render_area: Rect2D,
    /// Swapchain colour attachment
    pub color: ColorAttachment,
}

impl RenderingInfo {
    /// Clear-and-store over the full swapchain extent
    pub fn for_swapchain(extent: Extent2D, clear_color: [f32; 4]) -> Self {
        Self {
            render_area: Rect2D::from_extent(extent),
            color: ColorAttachment {
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Store,
            },
        }
    }
}

#[cfg(test)]
#[path = "command_list_tests.rs"]
mod tests;
