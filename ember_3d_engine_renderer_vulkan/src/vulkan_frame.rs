/// Frame slots - per-frame-in-flight command buffer and sync objects

use std::time::Duration;
use ash::vk;
use ember_3d_engine::ember3d::render::FenceStatus;
use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::{engine_err, engine_error};

/// Where a slot's command buffer is in the record/submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording { image_index: u32 },
    Recorded { image_index: u32 },
    Submitted { image_index: u32 },
}

/// One slot of the frame-in-flight ring
pub struct FrameSlot {
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Signaled when the slot's last submission completes (created signaled)
    in_flight: vk::Fence,
    pub(crate) image_available: vk::Semaphore,
    pub(crate) render_finished: vk::Semaphore,
    pub(crate) state: SlotState,
}

pub(crate) fn device_error(what: &str, e: vk::Result) -> Error {
    if e == vk::Result::ERROR_DEVICE_LOST {
        engine_error!("ember3d::vulkan", "Device lost during {}", what);
        return Error::DeviceLost(what.to_string());
    }
    engine_err!("ember3d::vulkan", "Failed to {}: {:?}", what, e)
}

impl FrameSlot {
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let init = |what: &str, e: vk::Result| {
            engine_error!("ember3d::vulkan", "Failed to create frame {}: {:?}", what, e);
            Error::InitializationFailed(format!("frame {}: {:?}", what, e))
        };

        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| init("command pool", e))?;

            let mut slot = Self {
                command_pool,
                command_buffer: vk::CommandBuffer::null(),
                in_flight: vk::Fence::null(),
                image_available: vk::Semaphore::null(),
                render_finished: vk::Semaphore::null(),
                state: SlotState::Idle,
            };

            let result = (|| -> Result<()> {
                let allocate_info = vk::CommandBufferAllocateInfo::default()
                    .command_pool(command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1);
                slot.command_buffer = device
                    .allocate_command_buffers(&allocate_info)
                    .map_err(|e| init("command buffer", e))?[0];

                let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
                slot.in_flight = device.create_fence(&fence_info, None).map_err(|e| init("fence", e))?;

                let semaphore_info = vk::SemaphoreCreateInfo::default();
                slot.image_available = device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| init("semaphore", e))?;
                slot.render_finished = device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(|e| init("semaphore", e))?;
                Ok(())
            })();

            match result {
                Ok(()) => Ok(slot),
                Err(e) => {
                    slot.destroy(device);
                    Err(e)
                }
            }
        }
    }

    /// Block until the last submission of this slot completed
    pub fn wait(&self, device: &ash::Device, timeout: Duration) -> Result<FenceStatus> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { device.wait_for_fences(&[self.in_flight], true, timeout_ns) } {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::TimedOut),
            Err(e) => Err(device_error("wait for frame fence", e)),
        }
    }

    /// Reset the command buffer for a new frame
    ///
    /// The fence stays signaled until `submit`, so a frame abandoned while
    /// recording never leaves the slot waiting on work that was not sent.
    pub fn reset(&mut self, device: &ash::Device) -> Result<()> {
        unsafe {
            device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| device_error("reset frame command buffer", e))?;
        }
        self.state = SlotState::Idle;
        Ok(())
    }

    /// Unsignal the fence and submit the recorded command buffer
    ///
    /// Waits for `image_available` at colour output, signals `render_finished`
    /// and the in-flight fence. A failed submission leaves the slot with a
    /// signaled fence again, so the next wait on it returns at once.
    pub fn submit(&mut self, device: &ash::Device, queue: vk::Queue) -> Result<()> {
        let SlotState::Recorded { image_index } = self.state else {
            return Err(Error::BackendError(format!("submit in state {:?}", self.state)));
        };

        let wait_semaphores = [self.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.command_buffer];
        let signal_semaphores = [self.render_finished];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device
                .reset_fences(&[self.in_flight])
                .map_err(|e| device_error("reset frame fence", e))?;
            if let Err(e) = device.queue_submit(queue, &[submit_info], self.in_flight) {
                let err = device_error("submit frame commands", e);
                self.replace_fence(device)?;
                return Err(err);
            }
        }
        self.state = SlotState::Submitted { image_index };
        Ok(())
    }

    /// Swap the in-flight fence for a new signaled one
    ///
    /// A fence cannot be signaled from the host, so a fence that was reset
    /// for a submission that never happened is replaced.
    fn replace_fence(&mut self, device: &ash::Device) -> Result<()> {
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe { device.create_fence(&fence_info, None) }
            .map_err(|e| device_error("recreate frame fence", e))?;
        unsafe { device.destroy_fence(self.in_flight, None) };
        self.in_flight = fence;
        Ok(())
    }

    /// Drop a frame that acquired an image but was never submitted
    ///
    /// The device must be idle. The image-available semaphore may still
    /// hold the acquire's signal, so it is replaced by a fresh one, and the
    /// command buffer is reset whatever state recording stopped in.
    pub fn abandon(&mut self, device: &ash::Device) -> Result<()> {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
            .map_err(|e| device_error("recreate image-available semaphore", e))?;
        unsafe { device.destroy_semaphore(self.image_available, None) };
        self.image_available = semaphore;
        self.reset(device)
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if self.render_finished != vk::Semaphore::null() {
                device.destroy_semaphore(self.render_finished, None);
            }
            if self.image_available != vk::Semaphore::null() {
                device.destroy_semaphore(self.image_available, None);
            }
            if self.in_flight != vk::Fence::null() {
                device.destroy_fence(self.in_flight, None);
            }
            // Frees the command buffer too
            if self.command_pool != vk::CommandPool::null() {
                device.destroy_command_pool(self.command_pool, None);
            }
        }
        self.command_pool = vk::CommandPool::null();
        self.render_finished = vk::Semaphore::null();
        self.image_available = vk::Semaphore::null();
        self.in_flight = vk::Fence::null();
        self.command_buffer = vk::CommandBuffer::null();
    }
}
