/// Frame-in-flight ring
///
/// Frame K records into slot `K mod depth`. A slot's command buffer may
/// only be reset once its in-flight fence has been observed signaled, so
/// the ring tracks what it last saw of each slot and blocks on the fence
/// before handing the slot out.

use std::time::Duration;
use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::error::{Error, Result};
use crate::graphics_device::{FenceStatus, GraphicsDevice};
use crate::{engine_error, engine_trace};

const SOURCE: &str = "ember3d::FrameRing";

/// Last known state of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never submitted, or drained by a device wait-idle
    Idle,
    /// Submitted for `frame`; fence not yet observed
    Submitted { frame: u64 },
    /// Fence observed signaled; free to record
    Signaled,
}

pub struct FrameRing {
    slots: Vec<SlotState>,
    frame: u64,
    fence_timeout: Duration,
}

impl FrameRing {
    /// Create a ring of `depth` slots (1..=MAX_FRAMES_IN_FLIGHT)
    pub fn new(depth: usize, fence_timeout: Duration) -> Result<Self> {
        if depth == 0 || depth > MAX_FRAMES_IN_FLIGHT {
            return Err(Error::InitializationFailed(format!(
                "frame ring depth must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, depth
            )));
        }
        Ok(Self {
            slots: vec![SlotState::Idle; depth],
            frame: 0,
            fence_timeout,
        })
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Number of frames submitted so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Slot the current frame records into
    pub fn current_slot(&self) -> usize {
        (self.frame % self.slots.len() as u64) as usize
    }

    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).copied()
    }

    /// Wait until the current slot's fence signals and return the slot
    ///
    /// # Errors
    ///
    /// `DeviceLost` if the fence does not signal within the fence timeout.
    pub fn begin_slot(&mut self, device: &mut dyn GraphicsDevice) -> Result<usize> {
        let slot = self.current_slot();

        match device.wait_for_slot(slot, self.fence_timeout)? {
            FenceStatus::Signaled => {
                if let SlotState::Submitted { frame } = self.slots[slot] {
                    engine_trace!(SOURCE, "Slot {} retired frame {}", slot, frame);
                }
                self.slots[slot] = SlotState::Signaled;
                Ok(slot)
            }
            FenceStatus::TimedOut => {
                let pending = match self.slots[slot] {
                    SlotState::Submitted { frame } => format!("frame {}", frame),
                    _ => "no tracked frame".to_string(),
                };
                engine_error!(
                    SOURCE,
                    "In-flight fence of slot {} ({}) did not signal within {:?}",
                    slot, pending, self.fence_timeout
                );
                Err(Error::DeviceLost(format!(
                    "fence wait on frame slot {} timed out after {:?}",
                    slot, self.fence_timeout
                )))
            }
        }
    }

    /// Check that `slot` may be reset and recorded
    pub fn ensure_recordable(&self, slot: usize) -> Result<()> {
        match self.slots.get(slot) {
            Some(SlotState::Signaled) | Some(SlotState::Idle) => Ok(()),
            Some(SlotState::Submitted { frame }) => Err(Error::BackendError(format!(
                "frame slot {} still owned by frame {}",
                slot, frame
            ))),
            None => Err(Error::InvalidResource(format!("frame slot {} out of range", slot))),
        }
    }

    /// Record that the current frame was submitted on `slot` and move to
    /// the next frame
    pub fn mark_submitted(&mut self, slot: usize) -> Result<()> {
        self.ensure_recordable(slot)?;
        self.slots[slot] = SlotState::Submitted { frame: self.frame };
        self.frame += 1;
        Ok(())
    }

    /// Forget all in-flight tracking after the device was drained
    pub fn mark_all_idle(&mut self) {
        for slot in &mut self.slots {
            *slot = SlotState::Idle;
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
