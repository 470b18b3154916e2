/// Pipeline descriptor, vertex layout and per-draw push constants

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use slotmap::new_key_type;
use crate::graphics_device::BufferFormat;

new_key_type! {
    /// Generation-checked handle to a graphics pipeline
    pub struct PipelineHandle;
}

bitflags! {
    /// Shader stages that can read a push constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    /// Triangle list
    TriangleList,
    /// Triangle strip
    TriangleStrip,
    /// Line list
    LineList,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise vertices define front face
    CounterClockwise,
    /// Clockwise vertices define front face
    Clockwise,
}

/// Vertex attribute description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Attribute location in shader
    pub location: u32,
    /// Format of the attribute (data type and component count)
    pub format: BufferFormat,
    /// Offset in bytes from the start of the vertex
    pub offset: u32,
}

/// Single-binding, per-vertex input layout
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    /// Stride in bytes between consecutive vertices
    pub stride: u32,
    /// Vertex attributes
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Tightly packed `vec3` positions at location 0
    pub fn position_only() -> Self {
        Self {
            stride: 12,
            attributes: vec![VertexAttribute {
                location: 0,
                format: BufferFormat::R32G32B32_SFLOAT,
                offset: 0,
            }],
        }
    }
}

/// Descriptor for creating a graphics pipeline
///
/// Pipelines render into the swapchain colour attachment through dynamic
/// rendering; viewport and scissor are dynamic state.
#[derive(Debug, Clone)]
pub struct PipelineDesc {
    /// Debug name
    pub name: String,
    /// SPIR-V bytecode of the vertex shader
    pub vertex_spirv: Vec<u8>,
    /// SPIR-V bytecode of the fragment shader
    pub fragment_spirv: Vec<u8>,
    /// Vertex input layout
    pub vertex_layout: VertexLayout,
    /// Primitive topology
    pub topology: PrimitiveTopology,
    /// Face culling
    pub cull_mode: CullMode,
    /// Winding order
    pub front_face: FrontFace,
    /// Size of the push constant block (0 = none)
    pub push_constant_size: u32,
    /// Stages reading the push constant block
    pub push_constant_stages: ShaderStages,
}

impl PipelineDesc {
    /// Mesh pipeline taking `MeshPushConstants` in both stages
    pub fn mesh(
        name: impl Into<String>,
        vertex_spirv: Vec<u8>,
        fragment_spirv: Vec<u8>,
        vertex_layout: VertexLayout,
    ) -> Self {
        Self {
            name: name.into(),
            vertex_spirv,
            fragment_spirv,
            vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            push_constant_size: std::mem::size_of::<MeshPushConstants>() as u32,
            push_constant_stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        }
    }
}

// ===== PUSH CONSTANTS =====

/// Per-draw constants pushed before each mesh draw
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshPushConstants {
    /// Object to world
    pub model_matrix: Mat4,
    /// Object to clip space (view-projection * model)
    pub render_matrix: Mat4,
    /// Camera position in world space, elapsed time in `w`
    pub camera_pos: Vec4,
}

impl MeshPushConstants {
    /// Build the constants for one draw
    pub fn new(model: Mat4, view_projection: Mat4, camera_position: Vec3, time: f32) -> Self {
        Self {
            model_matrix: model,
            render_matrix: view_projection * model,
            camera_pos: camera_position.extend(time),
        }
    }

    /// Raw bytes as pushed to the command list
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
