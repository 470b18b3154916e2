//! Frame rendering: frame-in-flight ring and per-frame orchestration

pub mod sync;
pub mod orchestrator;

pub use sync::{FrameRing, SlotState};
pub use orchestrator::{
    FrameOrchestrator, FrameOutcome, FrameParams, FrameStats, OverlayRenderer, MAX_FRAME_RESTARTS,
};
