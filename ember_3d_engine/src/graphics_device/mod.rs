/// Graphics device module - backend seam, resource descriptors and handles

// Module declarations
pub mod graphics_device;
pub mod buffer;
pub mod texture;
pub mod pipeline;
pub mod command_list;
pub mod swapchain;
pub mod resource_pool;
pub mod retire_queue;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use buffer::*;
pub use texture::*;
pub use pipeline::*;
pub use command_list::*;
pub use swapchain::*;
pub use resource_pool::*;
pub use retire_queue::RetireQueue;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
