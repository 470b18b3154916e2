//! Engine startup configuration
//!
//! Optional subsystems are selected at startup through `Capabilities`
//! rather than compiled in or out.

use std::time::Duration;
use bitflags::bitflags;
use crate::error::{Error, Result};

/// Largest frame-in-flight ring the engine accepts
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

bitflags! {
    /// Optional subsystems enabled at startup
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Vulkan validation layers + debug messenger
        const VALIDATION = 1 << 0;
        /// Debug names on GPU objects so capture tools show buffer names
        const DIAGNOSTIC_CAPTURE = 1 << 1;
        /// Overlay hook recorded at the end of each frame's rendering scope
        const UI_OVERLAY = 1 << 2;
    }
}

/// Validation message severity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only report errors
    ErrorsOnly,
    /// Report errors and warnings
    ErrorsAndWarnings,
    /// Report everything including info and verbose messages
    All,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Depth of the frame-in-flight ring
    pub frames_in_flight: usize,
    /// Clear colour of the swapchain attachment (RGBA)
    pub clear_color: [f32; 4],
    /// Longest a frame fence may block before the device is declared lost
    pub fence_timeout: Duration,
    /// Longest a synchronous upload may block on its transfer fence
    pub upload_timeout: Duration,
    /// Optional cap on live device memory, on top of what the device offers
    pub device_memory_budget: Option<u64>,
    /// Optional subsystems
    pub capabilities: Capabilities,
    /// Validation message severity filter (only used with `VALIDATION`)
    pub debug_severity: DebugSeverity,
}

impl Default for Config {
    fn default() -> Self {
        let capabilities = if cfg!(debug_assertions) {
            Capabilities::VALIDATION
        } else {
            Capabilities::empty()
        };

        Self {
            app_name: "Ember3D Application".to_string(),
            app_version: (1, 0, 0),
            frames_in_flight: 2,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fence_timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(10),
            device_memory_budget: None,
            capabilities,
            debug_severity: DebugSeverity::ErrorsAndWarnings,
        }
    }
}

impl Config {
    /// Whether a capability was requested at startup
    pub fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// Check the configuration before any subsystem is created
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailed` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 || self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::InitializationFailed(format!(
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, self.frames_in_flight
            )));
        }
        if self.fence_timeout.is_zero() {
            return Err(Error::InitializationFailed("fence_timeout must be non-zero".to_string()));
        }
        if self.upload_timeout.is_zero() {
            return Err(Error::InitializationFailed("upload_timeout must be non-zero".to_string()));
        }
        if self.device_memory_budget == Some(0) {
            return Err(Error::InitializationFailed("device_memory_budget must be non-zero".to_string()));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(Error::InitializationFailed("clear_color must be finite".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
