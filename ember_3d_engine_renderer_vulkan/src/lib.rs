/*!
# Ember3D Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait of `ember_3d_engine`,
using Ash for the Vulkan bindings and gpu-allocator for device memory.

Rendering targets the swapchain directly with dynamic rendering (Vulkan 1.3),
so there are no render pass or framebuffer objects.
*/

mod debug;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_upload;
mod vulkan_swapchain;
mod vulkan_frame;
mod vulkan_command_list;
mod vulkan_pipeline;
mod vulkan_device;

pub use vulkan_device::VulkanDevice;

// Validation layer statistics
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
