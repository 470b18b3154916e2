/// One-shot transfer commands submitted on the graphics queue and waited on
/// with a fence
///
/// A transfer whose fence does not signal within its timeout is reported as
/// `TransferFailed`. Its command buffer and fence are parked until the device
/// is idle, since the GPU may still be executing them.

use std::time::Duration;
use ash::vk;
use ember_3d_engine::ember3d::render::{ImageDesc, ImageRegion};
use ember_3d_engine::ember3d::{Error, Result};
use ember_3d_engine::{engine_error, engine_warn};

use crate::vulkan_image::{all_levels, COLOR_SUBRESOURCE};

/// Transfer command pool plus transfers that timed out
pub struct UploadQueue {
    command_pool: vk::CommandPool,
    stalled: Vec<(vk::CommandBuffer, vk::Fence)>,
}

fn transfer_error(what: &str, result: vk::Result) -> Error {
    if result == vk::Result::ERROR_DEVICE_LOST {
        engine_error!("ember3d::vulkan", "Device lost during {}", what);
        return Error::DeviceLost(what.to_string());
    }
    engine_error!("ember3d::vulkan", "Transfer failed during {}: {:?}", what, result);
    Error::TransferFailed(format!("{}: {:?}", what, result))
}

impl UploadQueue {
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe {
            device
                .create_command_pool(&pool_info, None)
                .map_err(|e| Error::InitializationFailed(format!("upload command pool: {:?}", e)))?
        };

        Ok(Self { command_pool, stalled: Vec::new() })
    }

    /// Whether a timed-out transfer may still be running on the GPU
    pub fn has_stalled(&self) -> bool {
        !self.stalled.is_empty()
    }

    /// Release parked transfers. The device must be idle.
    pub fn reclaim(&mut self, device: &ash::Device) {
        if self.stalled.is_empty() {
            return;
        }
        engine_warn!("ember3d::vulkan", "Reclaiming {} stalled transfer(s)", self.stalled.len());
        unsafe {
            for (command_buffer, fence) in self.stalled.drain(..) {
                device.free_command_buffers(self.command_pool, &[command_buffer]);
                device.destroy_fence(fence, None);
            }
        }
    }

    /// Record with `record`, submit, and block until done or `timeout`
    pub fn run_blocking(
        &mut self,
        device: &ash::Device,
        queue: vk::Queue,
        timeout: Duration,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<()> {
        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| transfer_error("command buffer allocation", e))?[0];

            let fence = match device.create_fence(&vk::FenceCreateInfo::default(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.free_command_buffers(self.command_pool, &[command_buffer]);
                    return Err(transfer_error("fence creation", e));
                }
            };

            let pool = self.command_pool;
            let release = |device: &ash::Device| {
                device.free_command_buffers(pool, &[command_buffer]);
                device.destroy_fence(fence, None);
            };

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            if let Err(e) = device.begin_command_buffer(command_buffer, &begin_info) {
                release(device);
                return Err(transfer_error("begin command buffer", e));
            }

            record(device, command_buffer);

            if let Err(e) = device.end_command_buffer(command_buffer) {
                release(device);
                return Err(transfer_error("end command buffer", e));
            }

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            if let Err(e) = device.queue_submit(queue, &[submit_info], fence) {
                release(device);
                return Err(transfer_error("queue submit", e));
            }

            let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
            match device.wait_for_fences(&[fence], true, timeout_ns) {
                Ok(()) => {
                    release(device);
                    Ok(())
                }
                Err(vk::Result::TIMEOUT) => {
                    self.stalled.push((command_buffer, fence));
                    engine_error!("ember3d::vulkan", "Transfer did not complete within {:?}", timeout);
                    Err(Error::TransferFailed(format!("timed out after {:?}", timeout)))
                }
                Err(e) => {
                    // The submission may still be pending
                    self.stalled.push((command_buffer, fence));
                    Err(transfer_error("fence wait", e))
                }
            }
        }
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        self.reclaim(device);
        unsafe {
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

// ===== RECORDING =====

/// Buffer-to-buffer copy, made visible to vertex input and index reads
pub fn record_buffer_copy(device: &ash::Device, cmd: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: u64) {
    let region = vk::BufferCopy::default().src_offset(0).dst_offset(0).size(size);
    let barrier = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ | vk::AccessFlags::INDEX_READ | vk::AccessFlags::UNIFORM_READ,
        )
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(dst)
        .offset(0)
        .size(size);

    unsafe {
        device.cmd_copy_buffer(cmd, src, dst, &[region]);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::VERTEX_INPUT | vk::PipelineStageFlags::VERTEX_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[barrier],
            &[],
        );
    }
}

/// Whole-image copy of every mip level: UNDEFINED -> TRANSFER_DST -> SHADER_READ_ONLY
///
/// `src` holds the levels packed level 0 first, as laid out by `ImageDesc`.
pub fn record_image_upload(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Buffer,
    image: vk::Image,
    desc: &ImageDesc,
) {
    let range = all_levels(desc);
    let to_transfer = layout_barrier(
        image,
        range,
        (vk::ImageLayout::UNDEFINED, vk::AccessFlags::empty()),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE),
    );

    let regions: Vec<vk::BufferImageCopy> = (0..desc.mip_levels)
        .map(|level| {
            let (width, height) = desc.mip_extent(level);
            vk::BufferImageCopy::default()
                .buffer_offset(desc.mip_offset(level))
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(level_layers(level))
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width, height, depth: 1 })
        })
        .collect();

    let to_shader = layout_barrier(
        image,
        range,
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE),
        (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::AccessFlags::SHADER_READ),
    );

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_transfer],
        );
        device.cmd_copy_buffer_to_image(cmd, src, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &regions);
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[to_shader],
        );
    }
}

/// Rectangle copy between the level 0 of two shader-readable images
///
/// Both images go to their transfer layouts for the copy and come back to
/// SHADER_READ_ONLY_OPTIMAL.
pub fn record_image_region_copy(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Image,
    dst: vk::Image,
    region: &ImageRegion,
) {
    let shader_read = (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::AccessFlags::SHADER_READ);
    let transfer_src = (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::AccessFlags::TRANSFER_READ);
    let transfer_dst = (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE);

    let to_transfer = [
        layout_barrier(src, COLOR_SUBRESOURCE, shader_read, transfer_src),
        layout_barrier(dst, COLOR_SUBRESOURCE, shader_read, transfer_dst),
    ];
    let to_shader = [
        layout_barrier(src, COLOR_SUBRESOURCE, transfer_src, shader_read),
        layout_barrier(dst, COLOR_SUBRESOURCE, transfer_dst, shader_read),
    ];

    let copy = vk::ImageCopy::default()
        .src_subresource(level_layers(0))
        .src_offset(vk::Offset3D { x: region.src_x as i32, y: region.src_y as i32, z: 0 })
        .dst_subresource(level_layers(0))
        .dst_offset(vk::Offset3D { x: region.dst_x as i32, y: region.dst_y as i32, z: 0 })
        .extent(vk::Extent3D { width: region.width, height: region.height, depth: 1 });

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &to_transfer,
        );
        device.cmd_copy_image(
            cmd,
            src,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            dst,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[copy],
        );
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &to_shader,
        );
    }
}

fn level_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn layout_barrier(
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    (old_layout, src_access): (vk::ImageLayout, vk::AccessFlags),
    (new_layout, dst_access): (vk::ImageLayout, vk::AccessFlags),
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
}
