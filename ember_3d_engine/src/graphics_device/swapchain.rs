/// Swapchain extent and the outcomes of acquire, present and fence waits

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window reports a zero extent in either dimension
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Result of acquiring the next swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; `suboptimal` means it can still be rendered and presented
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be recreated
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be recreated
    Suboptimal,
    /// Not presented; the swapchain must be recreated
    OutOfDate,
}

/// Result of waiting on a frame slot's in-flight fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fence was observed signaled; the slot may be reused
    Signaled,
    /// The wait exceeded its timeout
    TimedOut,
}
