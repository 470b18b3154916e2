//! Resource-level mesh type.
//!
//! A `Mesh` keeps the CPU copy of its vertex and index data next to the
//! device buffers they were uploaded into. It is only ever stored in a
//! `Model` once every one of its buffers finished uploading, so a `Mesh`
//! in hand is always drawable.
//!
//! Meshes are cheap to clone: data and material are shared.

use std::sync::Arc;
use bytemuck::Pod;
use crate::graphics_device::{BufferHandle, IndexType};
use crate::resource::Material;

/// Integer type a mesh's index buffer can hold
pub trait MeshIndex: Pod {
    const INDEX_TYPE: IndexType;

    fn widen(self) -> u32;
}

impl MeshIndex for u16 {
    const INDEX_TYPE: IndexType = IndexType::U16;

    fn widen(self) -> u32 {
        u32::from(self)
    }
}

impl MeshIndex for u32 {
    const INDEX_TYPE: IndexType = IndexType::U32;

    fn widen(self) -> u32 {
        self
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    vertex_data: Arc<[u8]>,
    vertex_count: u32,
    /// Widened CPU copy; the index buffer holds `index_type` values
    indices: Arc<[u32]>,
    index_type: IndexType,
    material: Arc<Material>,
    vertex_buffer: BufferHandle,
    /// Present iff `indices` is non-empty
    index_buffer: Option<BufferHandle>,
}

impl Mesh {
    pub(crate) fn new(
        name: String,
        vertex_data: Arc<[u8]>,
        vertex_count: u32,
        indices: Arc<[u32]>,
        index_type: IndexType,
        material: Arc<Material>,
        vertex_buffer: BufferHandle,
        index_buffer: Option<BufferHandle>,
    ) -> Self {
        Self {
            name,
            vertex_data,
            vertex_count,
            indices,
            index_type,
            material,
            vertex_buffer,
            index_buffer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw vertex bytes as uploaded
    pub fn vertex_data(&self) -> &[u8] {
        &self.vertex_data
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Width of the values in the index buffer
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    /// Triangles drawn, assuming a triangle list
    pub fn triangle_count(&self) -> u32 {
        if self.is_indexed() {
            self.index_count() / 3
        } else {
            self.vertex_count / 3
        }
    }
}
