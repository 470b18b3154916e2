//! Error types for the Ember3D engine
//!
//! This module defines the error taxonomy shared by the core and the GPU
//! backends: allocation, transfer, swapchain and device-level failures.

use std::fmt;

/// Result type for Ember3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ember3D engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The device memory pool cannot satisfy an allocation request
    OutOfDeviceMemory,

    /// Staging upload failed (submission or transfer fence).
    /// The destination resource must be treated as invalid.
    TransferFailed(String),

    /// Swapchain no longer matches the surface and must be recreated
    SwapchainOutOfDate,

    /// Swapchain still works but no longer matches the surface exactly
    SwapchainSuboptimal,

    /// The device was lost or stopped responding (driver hang, fence timeout)
    DeviceLost(String),

    /// Invalid resource (stale handle, bad size, malformed mesh data, etc.)
    InvalidResource(String),

    /// Initialization failed (engine, device, subsystems)
    InitializationFailed(String),

    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),
}

impl Error {
    /// Whether this error leaves the engine without a recovery path.
    ///
    /// Only a lost device is fatal. Swapchain conditions are recovered by
    /// recreation, the others are reported to the requesting caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost(_))
    }

    /// Whether this error is an expected swapchain condition
    pub fn is_swapchain_transient(&self) -> bool {
        matches!(self, Error::SwapchainOutOfDate | Error::SwapchainSuboptimal)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfDeviceMemory => write!(f, "Out of device memory"),
            Error::TransferFailed(msg) => write!(f, "Transfer failed: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::SwapchainSuboptimal => write!(f, "Swapchain suboptimal"),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
