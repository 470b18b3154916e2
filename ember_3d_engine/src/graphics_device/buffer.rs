/// Buffer descriptors, usage flags and handles

use bitflags::bitflags;
use slotmap::new_key_type;

new_key_type! {
    /// Generation-checked handle to a GPU buffer.
    ///
    /// A handle whose buffer was freed never aliases a later allocation:
    /// lookups and frees with it become no-ops.
    pub struct BufferHandle;
}

/// What a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Vertex or index data for meshes
    VertexIndex,
    /// Uniform/constant data
    Uniform,
    /// Transient host-visible upload source
    Staging,
}

bitflags! {
    /// How a buffer may be used by the GPU
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryProperty {
    /// Device-local, not CPU-accessible. Populated through staging uploads.
    DeviceLocal,
    /// Host-visible and coherent, persistently mapped
    HostVisible,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug name (used for GPU object names when diagnostic capture is on)
    pub name: String,
    /// Exact size in bytes
    pub size: u64,
    /// Content type
    pub buffer_type: BufferType,
    /// Usage flags
    pub usage: BufferUsage,
    /// Memory placement
    pub memory: MemoryProperty,
}

impl BufferDesc {
    /// Device-local vertex buffer that receives a staging copy
    pub fn vertex(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            buffer_type: BufferType::VertexIndex,
            usage: BufferUsage::VERTEX | BufferUsage::TRANSFER_DST,
            memory: MemoryProperty::DeviceLocal,
        }
    }

    /// Device-local index buffer that receives a staging copy
    pub fn index(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            buffer_type: BufferType::VertexIndex,
            usage: BufferUsage::INDEX | BufferUsage::TRANSFER_DST,
            memory: MemoryProperty::DeviceLocal,
        }
    }

    /// Host-visible uniform buffer written directly by the CPU
    pub fn uniform(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            buffer_type: BufferType::Uniform,
            usage: BufferUsage::UNIFORM,
            memory: MemoryProperty::HostVisible,
        }
    }

    /// Host-visible staging buffer used as a copy source
    pub fn staging(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            buffer_type: BufferType::Staging,
            usage: BufferUsage::TRANSFER_SRC,
            memory: MemoryProperty::HostVisible,
        }
    }

    /// Same descriptor placed in host-visible memory
    pub fn host_visible(mut self) -> Self {
        self.memory = MemoryProperty::HostVisible;
        self
    }
}

/// Type of the indices stored in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit unsigned indices
    U16,
    /// 32-bit unsigned indices
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size_bytes(&self) -> u64 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Buffer data format for vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT | BufferFormat::R8G8B8A8_UNORM => 4,
            BufferFormat::R32G32_SFLOAT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT => 16,
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
