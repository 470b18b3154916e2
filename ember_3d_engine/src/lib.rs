/*!
# Ember3D Engine

Core of the Ember3D real-time 3D engine.

The crate is backend-agnostic: GPU work goes through the `GraphicsDevice`
trait, implemented by the Vulkan backend crate (and by a recording mock in
tests).

## Architecture

- **GraphicsDevice**: buffer/image allocation, blocking transfers, pipelines,
  frame-in-flight ring and swapchain
- **Upload**: staging-buffer protocol for device-local buffers and textures
- **ModelRegistry**: models made of meshes, snapshotted into a draw list
- **FrameOrchestrator**: wait, acquire, record, submit, present, with
  swapchain recreation on resize and out-of-date
- **Engine**: explicit context owning all of the above plus the window,
  physics, managed-callback and networking boundaries
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod resource;
pub mod render;
pub mod window;
pub mod physics;
pub mod callback;
pub mod network;

// Main ember3d namespace module
pub mod ember3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine context and configuration
    pub use crate::engine::{Engine, TextureHandle};
    pub use crate::config::{Capabilities, Config, DebugSeverity, MAX_FRAMES_IN_FLIGHT};

    // Collaborator boundaries used by most hosts
    pub use crate::callback::NullCallbackSink;
    pub use crate::window::WinitEventQueue;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger, set_min_severity};
    }

    // Render sub-module: device seam and frame orchestration
    pub mod render {
        pub use crate::graphics_device::*;
        pub use crate::render::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod window {
        pub use crate::window::*;
    }

    pub mod physics {
        pub use crate::physics::*;
    }

    pub mod callback {
        pub use crate::callback::*;
    }

    pub mod network {
        pub use crate::network::*;
    }
}

// Re-export math library at crate root
pub use glam;
