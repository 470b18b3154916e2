//! Physics collaborator boundary
//!
//! The engine does not simulate anything itself. Models register rigid
//! bodies with a `PhysicsWorld` implementation and keep the returned handle.

use glam::{Mat4, Quat, Vec3};
use slotmap::new_key_type;
use crate::error::{Error, Result};
use crate::resource::ModelHandle;

new_key_type! {
    /// Body registered with a physics world
    pub struct BodyHandle;
}

/// Collision shape of a body
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Sphere { radius: f32 },
    /// Half extents along each axis
    Box { extents: Vec3 },
    /// Triangle soup, three vertices per triangle
    Mesh { vertices: Vec<Vec3> },
}

impl BodyShape {
    /// Check that the shape can be handed to a physics world
    pub fn validate(&self) -> Result<()> {
        match self {
            BodyShape::Sphere { radius } => {
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(Error::InvalidResource(format!(
                        "Sphere radius must be positive, got {}",
                        radius
                    )));
                }
            }
            BodyShape::Box { extents } => {
                if !extents.is_finite() || extents.min_element() <= 0.0 {
                    return Err(Error::InvalidResource(format!(
                        "Box extents must be positive, got {:?}",
                        extents
                    )));
                }
            }
            BodyShape::Mesh { vertices } => {
                if vertices.is_empty() || vertices.len() % 3 != 0 {
                    return Err(Error::InvalidResource(format!(
                        "Mesh shape needs a non-empty multiple of 3 vertices, got {}",
                        vertices.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Decompose an affine model matrix
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self { position, rotation, scale }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Everything a physics world needs to create a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub shape: BodyShape,
    pub transform: Transform,
    pub friction: f32,
    pub restitution: f32,
    pub is_static: bool,
}

impl BodyDescriptor {
    pub fn sphere(radius: f32, transform: Transform, is_static: bool) -> Result<Self> {
        Self::build(BodyShape::Sphere { radius }, transform, is_static)
    }

    pub fn cuboid(extents: Vec3, transform: Transform, is_static: bool) -> Result<Self> {
        Self::build(BodyShape::Box { extents }, transform, is_static)
    }

    /// Mesh bodies are always static
    pub fn mesh(vertices: Vec<Vec3>, transform: Transform) -> Result<Self> {
        Self::build(BodyShape::Mesh { vertices }, transform, true)
    }

    fn build(shape: BodyShape, transform: Transform, is_static: bool) -> Result<Self> {
        shape.validate()?;
        Ok(Self {
            shape,
            transform,
            friction: 1.0,
            restitution: 1.0,
            is_static,
        })
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}

/// Physics simulation owned outside the engine
pub trait PhysicsWorld {
    /// Register a body for `owner`
    ///
    /// Implementations must keep mesh bodies static regardless of the flag.
    fn add_body(&mut self, owner: ModelHandle, desc: &BodyDescriptor) -> Result<BodyHandle>;
}

#[cfg(test)]
#[path = "physics_tests.rs"]
mod tests;
