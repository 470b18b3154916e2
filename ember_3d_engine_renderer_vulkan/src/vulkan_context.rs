/// GpuContext - Vulkan instance, device, queues and allocator
///
/// Owned by `VulkanDevice`. Every Vulkan object the backend creates is
/// destroyed through this context before the context itself is dropped.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::fmt::Debug;
use std::mem::ManuallyDrop;
use ember_3d_engine::ember3d::{Capabilities, Config, DebugSeverity, Error, Result};
use ember_3d_engine::{engine_error, engine_info, engine_warn};

/// Shared GPU state for every Vulkan resource of one device
pub struct GpuContext {
    /// Vulkan entry (keeps the loader alive)
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub limits: vk::PhysicalDeviceLimits,

    /// Vulkan logical device
    pub device: ash::Device,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    /// Present queue (may be same as graphics)
    pub present_queue: vk::Queue,

    /// Window surface the swapchain presents to
    pub surface: vk::SurfaceKHR,
    pub surface_loader: ash::khr::surface::Instance,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Allocator>,

    /// Debug utils loader (for validation layers)
    debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    /// Debug messenger handle
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Object naming, only with `DIAGNOSTIC_CAPTURE`
    debug_names: Option<ash::ext::debug_utils::Device>,
}

fn init_failed(what: &str, e: impl Debug) -> Error {
    engine_error!("ember3d::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

impl GpuContext {
    /// Create instance, surface, logical device, queues and allocator
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let validation = config.has(Capabilities::VALIDATION);
        let diagnostics = config.has(Capabilities::DIAGNOSTIC_CAPTURE);

        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_failed("Failed to load Vulkan library", e))?;

            let app_name = CString::new(config.app_name.as_str()).unwrap_or_default();
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Ember3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_failed("Failed to get display handle", e))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_failed("Failed to get required extensions", e))?
                .to_vec();

            if validation || diagnostics {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_failed("Failed to create Vulkan instance", e))?;

            let debug_utils_loader = if validation || diagnostics {
                Some(ash::ext::debug_utils::Instance::new(&entry, &instance))
            } else {
                None
            };

            let debug_messenger = match (&debug_utils_loader, validation) {
                (Some(debug_utils), true) => {
                    crate::debug::init_debug_config(config.debug_severity);

                    let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                        .message_severity(severity_flags(config.debug_severity))
                        .message_type(
                            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                        )
                        .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                    Some(
                        debug_utils
                            .create_debug_utils_messenger(&debug_info, None)
                            .map_err(|e| init_failed("Failed to create debug messenger", e))?,
                    )
                }
                _ => None,
            };

            let window_handle = window
                .window_handle()
                .map_err(|e| init_failed("Failed to get window handle", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_failed("Failed to create surface", e))?;

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            // Pick the first GPU with a graphics queue and a present-capable queue
            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_failed("Failed to enumerate physical devices", e))?;

            let (physical_device, graphics_family_index, present_family_index) = physical_devices
                .into_iter()
                .find_map(|pd| {
                    let families = instance.get_physical_device_queue_family_properties(pd);
                    let graphics = families
                        .iter()
                        .position(|qf| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))?
                        as u32;
                    let present = (0..families.len() as u32).find(|&i| {
                        surface_loader
                            .get_physical_device_surface_support(pd, i, surface)
                            .unwrap_or(false)
                    })?;
                    Some((pd, graphics, present))
                })
                .ok_or_else(|| init_failed("No suitable GPU found", "graphics + present queues required"))?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            // Create Logical Device
            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .queue_priorities(&queue_priorities)];
            if present_family_index != graphics_family_index {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family_index)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let mut vulkan13_features = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .push_next(&mut vulkan13_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_failed("Failed to create logical device", e))?;

            let graphics_queue = device.get_device_queue(graphics_family_index, 0);
            let present_queue = device.get_device_queue(present_family_index, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_failed("Failed to create GPU allocator", e))?;

            let debug_names = if diagnostics {
                Some(ash::ext::debug_utils::Device::new(&instance, &device))
            } else {
                None
            };

            engine_info!(
                "ember3d::vulkan",
                "Using GPU '{}' (graphics family {}, present family {})",
                device_name,
                graphics_family_index,
                present_family_index
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                limits: properties.limits,
                device,
                graphics_queue,
                graphics_queue_family: graphics_family_index,
                present_queue,
                surface,
                surface_loader,
                allocator: ManuallyDrop::new(allocator),
                debug_utils_loader,
                debug_messenger,
                debug_names,
            })
        }
    }

    /// Attach a debug name to a Vulkan object (capture tools show it)
    pub fn set_object_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_names) = &self.debug_names else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        unsafe {
            if let Err(e) = debug_names.set_debug_utils_object_name(&info) {
                engine_warn!("ember3d::vulkan", "Failed to name object '{}': {:?}", name.to_string_lossy(), e);
            }
        }
    }
}

fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    match severity {
        DebugSeverity::ErrorsOnly => vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        DebugSeverity::ErrorsAndWarnings => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        }
        DebugSeverity::All => {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Free VkDeviceMemory pages BEFORE destroying the device
            ManuallyDrop::drop(&mut self.allocator);

            // Stop callbacks during destruction
            crate::debug::cleanup_debug_config();

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}
