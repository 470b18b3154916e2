/// Pipeline - graphics pipeline for dynamic rendering into the swapchain

use std::io::Cursor;
use ash::vk;
use ember_3d_engine::ember3d::render::PipelineDesc;
use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::engine_err;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    buffer_format_to_vk, cull_mode_to_vk, front_face_to_vk, shader_stages_to_vk, topology_to_vk,
};

/// Vulkan pipeline owned by the device's pipeline map
pub struct VulkanPipeline {
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    /// Stages of the single push constant range (empty without one)
    pub(crate) push_constant_stages: vk::ShaderStageFlags,
    pub(crate) push_constant_size: u32,
    pub(crate) name: String,
}

/// Reject descriptors the device cannot build
pub(crate) fn validate_desc(desc: &PipelineDesc, limits: &vk::PhysicalDeviceLimits) -> Result<()> {
    if desc.push_constant_size > limits.max_push_constants_size {
        return Err(Error::InvalidResource(format!(
            "pipeline '{}' needs {} bytes of push constants, device limit is {}",
            desc.name, desc.push_constant_size, limits.max_push_constants_size
        )));
    }
    if desc.push_constant_size % 4 != 0 {
        return Err(Error::InvalidResource(format!(
            "pipeline '{}' push constant size {} is not a multiple of 4",
            desc.name, desc.push_constant_size
        )));
    }
    if desc.push_constant_size > 0 && desc.push_constant_stages.is_empty() {
        return Err(Error::InvalidResource(format!("pipeline '{}' push constants have no stages", desc.name)));
    }
    Ok(())
}

/// Decode SPIR-V bytes into words
pub(crate) fn read_spirv(name: &str, stage: &str, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() {
        return Err(Error::InvalidResource(format!("pipeline '{}' is missing {} shader code", name, stage)));
    }
    ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| Error::InvalidResource(format!("pipeline '{}' {} shader is not SPIR-V: {}", name, stage, e)))
}

unsafe fn create_shader_module(device: &ash::Device, name: &str, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    device
        .create_shader_module(&create_info, None)
        .map_err(|e| engine_err!("ember3d::vulkan", "Failed to create shader module for '{}': {:?}", name, e))
}

impl VulkanPipeline {
    /// Build a pipeline rendering into `color_format` with dynamic viewport and scissor
    pub fn create(ctx: &GpuContext, desc: &PipelineDesc, color_format: vk::Format) -> Result<Self> {
        validate_desc(desc, &ctx.limits)?;
        let vertex_code = read_spirv(&desc.name, "vertex", &desc.vertex_spirv)?;
        let fragment_code = read_spirv(&desc.name, "fragment", &desc.fragment_spirv)?;
        let device = &ctx.device;

        unsafe {
            let vertex_module = create_shader_module(device, &desc.name, &vertex_code)?;
            let fragment_module = match create_shader_module(device, &desc.name, &fragment_code) {
                Ok(module) => module,
                Err(e) => {
                    device.destroy_shader_module(vertex_module, None);
                    return Err(e);
                }
            };

            let result = Self::build(ctx, desc, color_format, vertex_module, fragment_module);

            // Modules are no longer needed once the pipeline exists
            device.destroy_shader_module(vertex_module, None);
            device.destroy_shader_module(fragment_module, None);

            let pipeline = result?;
            ctx.set_object_name(pipeline.pipeline, &desc.name);
            Ok(pipeline)
        }
    }

    unsafe fn build(
        ctx: &GpuContext,
        desc: &PipelineDesc,
        color_format: vk::Format,
        vertex_module: vk::ShaderModule,
        fragment_module: vk::ShaderModule,
    ) -> Result<Self> {
        let device = &ctx.device;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_module)
                .name(c"main"),
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = if desc.vertex_layout.attributes.is_empty() {
            Vec::new()
        } else {
            vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: desc.vertex_layout.stride,
                input_rate: vk::VertexInputRate::VERTEX,
            }]
        };

        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: 0,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(desc.topology))
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts matter here
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(desc.cull_mode))
            .front_face(front_face_to_vk(desc.front_face))
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false);

        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let push_constant_stages = if desc.push_constant_size > 0 {
            shader_stages_to_vk(desc.push_constant_stages)
        } else {
            vk::ShaderStageFlags::empty()
        };
        let push_constant_ranges: Vec<vk::PushConstantRange> = if desc.push_constant_size > 0 {
            vec![vk::PushConstantRange {
                stage_flags: push_constant_stages,
                offset: 0,
                size: desc.push_constant_size,
            }]
        } else {
            Vec::new()
        };

        let layout_create_info = vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges);
        let layout = device
            .create_pipeline_layout(&layout_create_info, None)
            .map_err(|e| engine_err!("ember3d::vulkan", "Failed to create pipeline layout for '{}': {:?}", desc.name, e))?;

        let color_formats = [color_format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default().color_attachment_formats(&color_formats);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let pipeline = match device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None) {
            Ok(pipelines) => pipelines[0],
            Err((pipelines, e)) => {
                for pipeline in pipelines.into_iter().filter(|p| *p != vk::Pipeline::null()) {
                    device.destroy_pipeline(pipeline, None);
                }
                device.destroy_pipeline_layout(layout, None);
                return Err(engine_err!("ember3d::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e));
            }
        };

        Ok(Self {
            pipeline,
            layout,
            push_constant_stages,
            push_constant_size: desc.push_constant_size,
            name: desc.name.clone(),
        })
    }

    pub fn destroy(self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
