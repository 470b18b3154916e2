use super::*;
use glam::Vec3;

#[test]
fn test_push_constants_layout() {
    // 2 x mat4 + vec4, no padding
    assert_eq!(std::mem::size_of::<MeshPushConstants>(), 144);
}

#[test]
fn test_push_constants_render_matrix() {
    let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let view_projection = Mat4::from_scale(Vec3::splat(2.0));
    let constants = MeshPushConstants::new(model, view_projection, Vec3::new(0.0, 1.0, -5.0), 1.5);

    assert_eq!(constants.model_matrix, model);
    assert_eq!(constants.render_matrix, view_projection * model);
    assert_eq!(constants.camera_pos, Vec4::new(0.0, 1.0, -5.0, 1.5));
    assert_eq!(constants.as_bytes().len(), 144);
}

#[test]
fn test_mesh_pipeline_desc_defaults() {
    let desc = PipelineDesc::mesh("mesh", vec![0; 4], vec![0; 4], VertexLayout::position_only());

    assert_eq!(desc.topology, PrimitiveTopology::TriangleList);
    assert_eq!(desc.push_constant_size, 144);
    assert!(desc.push_constant_stages.contains(ShaderStages::VERTEX | ShaderStages::FRAGMENT));
    assert_eq!(desc.vertex_layout.stride, 12);
    assert_eq!(desc.vertex_layout.attributes.len(), 1);
    assert_eq!(desc.vertex_layout.attributes[0].format, BufferFormat::R32G32B32_SFLOAT);
}

#[test]
fn test_vertex_layout_default_is_empty() {
    let layout = VertexLayout::default();
    assert_eq!(layout.stride, 0);
    assert!(layout.attributes.is_empty());
}
