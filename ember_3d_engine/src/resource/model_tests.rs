use super::*;
use crate::graphics_device::mock_graphics_device::MockDevice;
use crate::graphics_device::{Extent2D, IndexType, PipelineDesc, PipelineHandle, VertexLayout};

const TIMEOUT: Duration = Duration::from_secs(1);

fn setup() -> (MockDevice, Arc<Material>) {
    let mut device = MockDevice::new(2, Extent2D::new(800, 600));
    let desc = PipelineDesc::mesh("unlit", vec![1; 4], vec![1; 4], VertexLayout::position_only());
    let material = Material::from_pipeline_desc(&mut device, &desc).unwrap();
    (device, Arc::new(material))
}

const TRIANGLE: [[f32; 3]; 3] = [
    [0.0, 0.5, 0.0],
    [-0.5, -0.5, 0.0],
    [0.5, -0.5, 0.0],
];

const QUAD: [[f32; 3]; 4] = [
    [-0.5, -0.5, 0.0],
    [0.5, -0.5, 0.0],
    [0.5, 0.5, 0.0],
    [-0.5, 0.5, 0.0],
];

// ============================================================================
// ADD MESH
// ============================================================================

#[test]
fn test_new_model_is_empty() {
    let model = Model::new("empty");
    assert_eq!(model.mesh_count(), 0);
    assert!(!model.is_initialized());
    assert!(!model.has_index_buffer());
    assert_eq!(model.transform(), Mat4::IDENTITY);
}

#[test]
fn test_add_unindexed_triangle() {
    let (mut device, material) = setup();
    let mut model = Model::new("tri model");

    let added = model.add_mesh(&mut device, "tri", &TRIANGLE, &[], material.clone(), TIMEOUT).unwrap();

    assert!(added);
    assert_eq!(model.mesh_count(), 1);
    assert!(model.is_initialized());
    assert!(!model.has_index_buffer());

    let meshes = model.meshes();
    let mesh = &meshes[0];
    assert_eq!(mesh.name(), "tri");
    assert_eq!(mesh.vertex_count(), 3);
    assert!(mesh.index_buffer().is_none());
    assert!(Arc::ptr_eq(mesh.material(), &material));

    let info = device.buffer_info(mesh.vertex_buffer()).unwrap();
    assert_eq!(info.size, 36);
    assert_eq!(info.name, "tri vertex buffer");
    assert_eq!(device.live_buffers(), 1);
    assert_eq!(device.buffer_contents(mesh.vertex_buffer()), Some(mesh.vertex_data()));
}

#[test]
fn test_add_indexed_quad() {
    let (mut device, material) = setup();
    let mut model = Model::new("quad model");

    model.add_mesh(&mut device, "quad", &QUAD, &[0, 1, 2, 2, 3, 0], material, TIMEOUT).unwrap();

    assert!(model.has_index_buffer());
    let mesh = &model.meshes()[0];
    assert_eq!(mesh.index_count(), 6);
    assert_eq!(mesh.index_type(), IndexType::U32);
    assert_eq!(mesh.triangle_count(), 2);

    let index_buffer = mesh.index_buffer().unwrap();
    let info = device.buffer_info(index_buffer).unwrap();
    assert_eq!(info.size, 24);
    assert_eq!(info.name, "quad index buffer");
    let expected: &[u8] = bytemuck::cast_slice(&[0u32, 1, 2, 2, 3, 0]);
    assert_eq!(device.buffer_contents(index_buffer), Some(expected));
}

#[test]
fn test_flat_float_vertices_use_material_stride() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    let flat: [f32; 9] = [0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];

    model.add_mesh(&mut device, "tri", &flat, &[], material, TIMEOUT).unwrap();

    let mesh = &model.meshes()[0];
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(device.buffer_info(mesh.vertex_buffer()).unwrap().size, 36);
}

#[test]
fn test_index_past_flat_vertices_rejected() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    let flat = [0.0f32; 9];

    // Nine floats are three vertices, so index 8 is out of range
    let result = model.add_mesh(&mut device, "bad", &flat, &[0, 1, 8], material, TIMEOUT);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.memory_stats().total_allocations, 0);
}

#[test]
fn test_partial_vertex_rejected() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    let ragged = [0.0f32; 10];

    let result = model.add_mesh(&mut device, "ragged", &ragged, &[], material, TIMEOUT);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.memory_stats().total_allocations, 0);
}

#[test]
fn test_zero_stride_material_rejected() {
    let mut device = MockDevice::new(2, Extent2D::new(800, 600));
    let material = Arc::new(Material::new("broken", PipelineHandle::default(), VertexLayout::default()));
    let mut model = Model::new("m");

    let result = model.add_mesh(&mut device, "tri", &TRIANGLE, &[], material, TIMEOUT);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_add_mesh_with_16_bit_indices() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");

    model
        .add_mesh_with_indices(&mut device, "quad", &QUAD, &[0u16, 1, 2, 2, 3, 0], material, TIMEOUT)
        .unwrap();

    let mesh = &model.meshes()[0];
    assert_eq!(mesh.index_type(), IndexType::U16);
    assert_eq!(mesh.indices(), &[0, 1, 2, 2, 3, 0]);
    assert_eq!(mesh.triangle_count(), 2);

    let index_buffer = mesh.index_buffer().unwrap();
    assert_eq!(device.buffer_info(index_buffer).unwrap().size, 12);
    let expected: &[u8] = bytemuck::cast_slice(&[0u16, 1, 2, 2, 3, 0]);
    assert_eq!(device.buffer_contents(index_buffer), Some(expected));
}

#[test]
fn test_16_bit_index_out_of_range_rejected() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");

    let result = model.add_mesh_with_indices(&mut device, "bad", &TRIANGLE, &[0u16, 1, 3], material, TIMEOUT);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_empty_vertices_is_noop() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    let empty: [[f32; 3]; 0] = [];

    let added = model.add_mesh(&mut device, "nothing", &empty, &[0, 1, 2], material, TIMEOUT).unwrap();

    assert!(!added);
    assert_eq!(model.mesh_count(), 0);
    assert!(!model.is_initialized());
    assert_eq!(device.memory_stats().total_allocations, 0);
}

#[test]
fn test_out_of_range_index_rejected_before_upload() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");

    let result = model.add_mesh(&mut device, "bad", &TRIANGLE, &[0, 1, 3], material, TIMEOUT);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(model.mesh_count(), 0);
    assert_eq!(device.memory_stats().total_allocations, 0);
}

#[test]
fn test_index_upload_failure_frees_vertex_buffer() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    // vertex copy succeeds, index copy fails
    device.fail_after_copies = Some(1);

    let result = model.add_mesh(&mut device, "quad", &QUAD, &[0, 1, 2], material, TIMEOUT);

    assert!(matches!(result, Err(Error::TransferFailed(_))));
    assert_eq!(model.mesh_count(), 0);
    assert!(!model.is_initialized());
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.memory_stats().live_bytes, 0);
}

#[test]
fn test_failure_keeps_existing_meshes() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    model.add_mesh(&mut device, "first", &TRIANGLE, &[], material.clone(), TIMEOUT).unwrap();
    device.fail_after_copies = Some(device.copies);

    assert!(model.add_mesh(&mut device, "second", &TRIANGLE, &[], material, TIMEOUT).is_err());
    assert_eq!(model.mesh_count(), 1);
    assert!(model.is_initialized());
    assert_eq!(device.live_buffers(), 1);
}

#[test]
fn test_out_of_memory_propagates() {
    let mut device = MockDevice::with_budget(2, Extent2D::new(800, 600), 40);
    let desc = PipelineDesc::mesh("unlit", vec![1; 4], vec![1; 4], VertexLayout::position_only());
    let material = Arc::new(Material::from_pipeline_desc(&mut device, &desc).unwrap());
    let mut model = Model::new("m");

    // 36-byte vertex buffer plus 36-byte staging exceeds 40 bytes
    let result = model.add_mesh(&mut device, "tri", &TRIANGLE, &[], material, TIMEOUT);

    assert_eq!(result, Err(Error::OutOfDeviceMemory));
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_meshes_is_a_snapshot() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    model.add_mesh(&mut device, "a", &TRIANGLE, &[], material.clone(), TIMEOUT).unwrap();

    let snapshot = model.meshes();
    model.add_mesh(&mut device, "b", &TRIANGLE, &[], material, TIMEOUT).unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(model.mesh_count(), 2);
}

// ============================================================================
// RELEASE
// ============================================================================

#[test]
fn test_release_frees_all_buffers() {
    let (mut device, material) = setup();
    let mut model = Model::new("m");
    model.add_mesh(&mut device, "tri", &TRIANGLE, &[], material.clone(), TIMEOUT).unwrap();
    model.add_mesh(&mut device, "quad", &QUAD, &[0, 1, 2, 2, 3, 0], material, TIMEOUT).unwrap();
    assert_eq!(device.live_buffers(), 3);

    model.release(&mut device);

    assert_eq!(device.live_buffers(), 0);
    assert_eq!(model.mesh_count(), 0);
    assert!(!model.is_initialized());

    // releasing twice is harmless
    model.release(&mut device);
    assert_eq!(device.memory_stats().total_frees, device.memory_stats().total_allocations);
}
