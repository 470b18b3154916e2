//! Resource management module
//!
//! Upload path, meshes, models and the model registry.

pub mod upload;
pub mod material;
pub mod mesh;
pub mod model;
pub mod model_registry;
pub mod texture;

pub use material::Material;
pub use mesh::{Mesh, MeshIndex};
pub use model::Model;
pub use model_registry::{DrawItem, ModelHandle, ModelRegistry};
pub use texture::Texture;
