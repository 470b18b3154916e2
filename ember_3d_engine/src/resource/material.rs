/// Resource-level material type.
///
/// A Material names the pipeline a mesh is drawn with and the vertex
/// layout that pipeline reads. Meshes share their material through an
/// `Arc`; the pipeline itself is owned by whoever created it and must
/// outlive every mesh using it.

use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, PipelineDesc, PipelineHandle, VertexLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    name: String,
    pipeline: PipelineHandle,
    vertex_layout: VertexLayout,
}

impl Material {
    pub fn new(name: impl Into<String>, pipeline: PipelineHandle, vertex_layout: VertexLayout) -> Self {
        Self { name: name.into(), pipeline, vertex_layout }
    }

    /// Create the pipeline described by `desc` and wrap it in a material
    /// of the same name
    pub fn from_pipeline_desc(device: &mut dyn GraphicsDevice, desc: &PipelineDesc) -> Result<Self> {
        let pipeline = device.create_pipeline(desc)?;
        Ok(Self::new(desc.name.clone(), pipeline, desc.vertex_layout.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// Bytes per vertex in meshes drawn with this material
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_layout.stride
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
