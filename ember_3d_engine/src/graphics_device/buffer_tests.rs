use super::*;

#[test]
fn test_vertex_desc_is_device_local_transfer_dst() {
    let desc = BufferDesc::vertex("tri vertex buffer", 36);
    assert_eq!(desc.size, 36);
    assert_eq!(desc.buffer_type, BufferType::VertexIndex);
    assert!(desc.usage.contains(BufferUsage::VERTEX | BufferUsage::TRANSFER_DST));
    assert_eq!(desc.memory, MemoryProperty::DeviceLocal);
}

#[test]
fn test_index_desc_usage() {
    let desc = BufferDesc::index("tri index buffer", 12);
    assert!(desc.usage.contains(BufferUsage::INDEX));
    assert!(!desc.usage.contains(BufferUsage::VERTEX));
}

#[test]
fn test_staging_desc_is_host_visible_source() {
    let desc = BufferDesc::staging("staging", 64);
    assert_eq!(desc.buffer_type, BufferType::Staging);
    assert_eq!(desc.usage, BufferUsage::TRANSFER_SRC);
    assert_eq!(desc.memory, MemoryProperty::HostVisible);
}

#[test]
fn test_host_visible_override() {
    let desc = BufferDesc::vertex("readback", 16).host_visible();
    assert_eq!(desc.memory, MemoryProperty::HostVisible);
    assert!(desc.usage.contains(BufferUsage::VERTEX));
}

#[test]
fn test_index_type_sizes() {
    assert_eq!(IndexType::U16.size_bytes(), 2);
    assert_eq!(IndexType::U32.size_bytes(), 4);
}

#[test]
fn test_buffer_format_sizes() {
    assert_eq!(BufferFormat::R32_SFLOAT.size_bytes(), 4);
    assert_eq!(BufferFormat::R32G32_SFLOAT.size_bytes(), 8);
    assert_eq!(BufferFormat::R32G32B32_SFLOAT.size_bytes(), 12);
    assert_eq!(BufferFormat::R32G32B32A32_SFLOAT.size_bytes(), 16);
    assert_eq!(BufferFormat::R8G8B8A8_UNORM.size_bytes(), 4);
}
