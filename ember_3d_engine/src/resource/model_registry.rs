//! Model registry
//!
//! Owns every model of the running engine, keyed by generation-checked
//! handles. The frame loop never reads models directly: it takes a
//! `draw_list()` snapshot before recording, so the registry can change
//! between frames without touching in-flight command recording.

use glam::Mat4;
use slotmap::{new_key_type, SlotMap};
use crate::engine_debug;
use crate::graphics_device::GraphicsDevice;
use crate::resource::{Mesh, Model};

new_key_type! {
    /// Generation-checked handle to a registered model
    pub struct ModelHandle;
}

/// One mesh to draw this frame, with its model's transform
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub mesh: Mesh,
    pub transform: Mat4,
}

#[derive(Default)]
pub struct ModelRegistry {
    models: SlotMap<ModelHandle, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new empty model
    pub fn create_model(&mut self, name: impl Into<String>) -> ModelHandle {
        self.models.insert(Model::new(name))
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models.get(handle)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models.get_mut(handle)
    }

    /// Release a model's buffers and unregister it
    ///
    /// Returns `false` for a stale handle.
    pub fn destroy_model(&mut self, device: &mut dyn GraphicsDevice, handle: ModelHandle) -> bool {
        match self.models.remove(handle) {
            Some(mut model) => {
                engine_debug!("ember3d::Model", "Destroying model '{}'", model.name());
                model.release(device);
                true
            }
            None => false,
        }
    }

    /// Release and unregister every model
    pub fn destroy_all(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, mut model) in self.models.drain() {
            model.release(device);
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Snapshot of every mesh of every initialized model
    pub fn draw_list(&self) -> Vec<DrawItem> {
        self.models
            .values()
            .filter(|model| model.is_initialized())
            .flat_map(|model| {
                let transform = model.transform();
                model.meshes().into_iter().map(move |mesh| DrawItem { mesh, transform })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "model_registry_tests.rs"]
mod tests;
