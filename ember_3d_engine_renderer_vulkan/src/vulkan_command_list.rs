/// CommandList - records one frame into a slot's command buffer
///
/// Rendering goes straight into the acquired swapchain image with dynamic
/// rendering. `begin_rendering` moves the image to COLOR_ATTACHMENT_OPTIMAL
/// and `end_rendering` moves it to PRESENT_SRC_KHR.

use ash::vk;
use slotmap::SlotMap;
use ember_3d_engine::ember3d::render::{
    BufferHandle, CommandList, IndexType, LoadOp, PipelineHandle, Rect2D, RenderingInfo,
    ResourcePool, ShaderStages, Viewport,
};
use ember_3d_engine::ember3d::{Error, Result};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_format::{index_type_to_vk, load_op_to_vk, shader_stages_to_vk, store_op_to_vk};
use crate::vulkan_image::COLOR_SUBRESOURCE;
use crate::vulkan_pipeline::VulkanPipeline;

/// Push constant range of the bound pipeline
#[derive(Clone, Copy)]
struct BoundPipeline {
    layout: vk::PipelineLayout,
    stages: vk::ShaderStageFlags,
    size: u32,
}

/// Vulkan command list borrowed from the device for one frame
pub struct VulkanCommandList<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
    /// Swapchain image rendered to
    image: vk::Image,
    view: vk::ImageView,
    buffers: &'a ResourcePool<BufferHandle, VulkanBuffer>,
    pipelines: &'a SlotMap<PipelineHandle, VulkanPipeline>,
    rendering: bool,
    bound: Option<BoundPipeline>,
}

impl<'a> VulkanCommandList<'a> {
    /// Wrap a command buffer already in the recording state
    pub(crate) fn new(
        device: &'a ash::Device,
        command_buffer: vk::CommandBuffer,
        target: (vk::Image, vk::ImageView),
        buffers: &'a ResourcePool<BufferHandle, VulkanBuffer>,
        pipelines: &'a SlotMap<PipelineHandle, VulkanPipeline>,
    ) -> Self {
        Self {
            device,
            command_buffer,
            image: target.0,
            view: target.1,
            buffers,
            pipelines,
            rendering: false,
            bound: None,
        }
    }

    fn require_rendering(&self, command: &str) -> Result<()> {
        if !self.rendering {
            return Err(Error::BackendError(format!("{} outside a rendering scope", command)));
        }
        Ok(())
    }

    fn buffer(&self, handle: BufferHandle, what: &str) -> Result<vk::Buffer> {
        self.buffers
            .get(handle)
            .map(|buffer| buffer.buffer)
            .ok_or_else(|| Error::InvalidResource(format!("stale {} buffer handle", what)))
    }

    fn transition(
        &self,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        src: (vk::PipelineStageFlags, vk::AccessFlags),
        dst: (vk::PipelineStageFlags, vk::AccessFlags),
    ) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(COLOR_SUBRESOURCE)
            .src_access_mask(src.1)
            .dst_access_mask(dst.1);

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src.0,
                dst.0,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}

impl CommandList for VulkanCommandList<'_> {
    fn begin_rendering(&mut self, info: &RenderingInfo) -> Result<()> {
        if self.rendering {
            return Err(Error::BackendError("rendering scope already open".to_string()));
        }

        // Previous contents are discarded even with LoadOp::Load
        self.transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::empty()),
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
        );

        let clear_color = match info.color.load_op {
            LoadOp::Clear(rgba) => rgba,
            LoadOp::Load | LoadOp::DontCare => [0.0; 4],
        };
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(load_op_to_vk(info.color.load_op))
            .store_op(store_op_to_vk(info.color.store_op))
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            });

        let area = info.render_area;
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: area.x, y: area.y },
                extent: vk::Extent2D { width: area.width, height: area.height },
            })
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        unsafe {
            self.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }
        self.rendering = true;
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.require_rendering("end_rendering")?;

        unsafe {
            self.device.cmd_end_rendering(self.command_buffer);
        }
        self.transition(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            (vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
            (vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty()),
        );
        self.rendering = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        let pipeline = self
            .pipelines
            .get(pipeline)
            .ok_or_else(|| Error::InvalidResource("stale pipeline handle".to_string()))?;

        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
        }
        self.bound = Some(BoundPipeline {
            layout: pipeline.layout,
            stages: pipeline.push_constant_stages,
            size: pipeline.push_constant_size,
        });
        Ok(())
    }

    fn push_constants(&mut self, stages: ShaderStages, offset: u32, data: &[u8]) -> Result<()> {
        let Some(bound) = self.bound else {
            return Err(Error::BackendError("push_constants without a bound pipeline".to_string()));
        };

        let end = u64::from(offset) + data.len() as u64;
        if end > u64::from(bound.size) {
            return Err(Error::InvalidResource(format!(
                "push constants [{}, {}) exceed the pipeline's {} byte range",
                offset, end, bound.size
            )));
        }
        let vk_stages = shader_stages_to_vk(stages);
        if !bound.stages.contains(vk_stages) {
            return Err(Error::InvalidResource(format!(
                "push constant stages {:?} not declared by the pipeline ({:?})",
                vk_stages, bound.stages
            )));
        }

        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, bound.layout, vk_stages, offset, data);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()> {
        let buffer = self.buffer(buffer, "vertex")?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        let buffer = self.buffer(buffer, "index")?;
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.require_rendering("draw")?;
        unsafe {
            self.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) -> Result<()> {
        self.require_rendering("draw_indexed")?;
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
        Ok(())
    }
}
