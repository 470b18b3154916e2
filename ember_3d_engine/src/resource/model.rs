//! Resource-level model type.
//!
//! A `Model` is an ordered list of meshes. Adding a mesh uploads its
//! vertex buffer and, when it has indices, its index buffer. A failed
//! upload frees whatever was created for that mesh and leaves the model
//! as it was.

use std::sync::Arc;
use std::time::Duration;
use bytemuck::Pod;
use glam::Mat4;
use crate::error::{Error, Result};
use crate::graphics_device::{BufferDesc, GraphicsDevice};
use crate::resource::{upload, Material, Mesh, MeshIndex};
use crate::{engine_debug, engine_warn};

const SOURCE: &str = "ember3d::Model";

pub struct Model {
    name: String,
    meshes: Vec<Mesh>,
    has_index_buffer: bool,
    is_initialized: bool,
    transform: Mat4,
}

impl Model {
    /// Create an empty model. It becomes initialized on its first mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meshes: Vec::new(),
            has_index_buffer: false,
            is_initialized: false,
            transform: Mat4::IDENTITY,
        }
    }

    /// Upload a mesh with 32-bit indices and append it to the model
    ///
    /// See `add_mesh_with_indices`.
    pub fn add_mesh<V: Pod>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        vertices: &[V],
        indices: &[u32],
        material: Arc<Material>,
        timeout: Duration,
    ) -> Result<bool> {
        self.add_mesh_with_indices(device, name, vertices, indices, material, timeout)
    }

    /// Upload a mesh and append it to the model
    ///
    /// `vertices` is reinterpreted as raw bytes and split into vertices of
    /// the material's stride, so any `Pod` element type works. The index
    /// buffer keeps the width of `I`.
    ///
    /// Returns `Ok(false)` without touching the device when `vertices` is
    /// empty.
    ///
    /// # Errors
    ///
    /// * `InvalidResource` if the vertex bytes are not a whole number of
    ///   vertices, or an index points past the last vertex (checked before
    ///   any allocation)
    /// * `OutOfDeviceMemory` / `TransferFailed` from the upload path; the
    ///   buffers created for this mesh are freed and the model is unchanged
    pub fn add_mesh_with_indices<V: Pod, I: MeshIndex>(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        vertices: &[V],
        indices: &[I],
        material: Arc<Material>,
        timeout: Duration,
    ) -> Result<bool> {
        if vertices.is_empty() {
            engine_warn!(SOURCE, "Ignoring mesh '{}' of model '{}': no vertices", name, self.name);
            return Ok(false);
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
        let stride = material.vertex_stride() as usize;
        if stride == 0 {
            return Err(Error::InvalidResource(format!(
                "mesh '{}': material '{}' has a zero vertex stride",
                name, material.name()
            )));
        }
        if vertex_bytes.len() % stride != 0 {
            return Err(Error::InvalidResource(format!(
                "mesh '{}': {} vertex bytes are not a multiple of the {}-byte stride",
                name, vertex_bytes.len(), stride
            )));
        }
        let vertex_count = u32::try_from(vertex_bytes.len() / stride)
            .map_err(|_| Error::InvalidResource(format!("mesh '{}' has too many vertices", name)))?;

        let widened: Vec<u32> = indices.iter().map(|&i| i.widen()).collect();
        if let Some(bad) = widened.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InvalidResource(format!(
                "mesh '{}': index {} out of range for {} vertices",
                name, bad, vertex_count
            )));
        }

        let vertex_buffer = upload::create_and_upload(
            device,
            &BufferDesc::vertex(format!("{} vertex buffer", name), vertex_bytes.len() as u64),
            vertex_bytes,
            timeout,
        )?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            let index_bytes: &[u8] = bytemuck::cast_slice(indices);
            match upload::create_and_upload(
                device,
                &BufferDesc::index(format!("{} index buffer", name), index_bytes.len() as u64),
                index_bytes,
                timeout,
            ) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    device.free_buffer(vertex_buffer);
                    return Err(err);
                }
            }
        };

        self.meshes.push(Mesh::new(
            name.to_string(),
            Arc::from(vertex_bytes),
            vertex_count,
            Arc::from(widened),
            I::INDEX_TYPE,
            material,
            vertex_buffer,
            index_buffer,
        ));
        self.has_index_buffer |= index_buffer.is_some();
        self.is_initialized = true;

        engine_debug!(
            SOURCE,
            "Model '{}': added mesh '{}' ({} vertices, {} {:?} indices)",
            self.name, name, vertex_count, indices.len(), I::INDEX_TYPE
        );
        Ok(true)
    }

    /// Snapshot of the meshes, safe to hold while the model changes
    pub fn meshes(&self) -> Vec<Mesh> {
        self.meshes.clone()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether any mesh was uploaded with an index buffer
    pub fn has_index_buffer(&self) -> bool {
        self.has_index_buffer
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Free every mesh buffer and return the model to its empty state
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for mesh in self.meshes.drain(..) {
            device.free_buffer(mesh.vertex_buffer());
            if let Some(index_buffer) = mesh.index_buffer() {
                device.free_buffer(index_buffer);
            }
        }
        self.has_index_buffer = false;
        self.is_initialized = false;
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
