//! Staging upload path
//!
//! Copies CPU data into device-local buffers and images. Each upload
//! allocates a host-visible staging buffer sized exactly to the data,
//! writes it, runs a one-shot copy and blocks until the transfer fence
//! signals. The staging buffer is freed whether the copy succeeded or not.
//!
//! Uploads are meant for load time; the destination is unusable until
//! the call returns `Ok`.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::engine_error;
use crate::graphics_device::{BufferDesc, BufferHandle, GraphicsDevice, ImageDesc, ImageHandle};

const SOURCE: &str = "ember3d::Upload";

/// Upload `data` into the start of `dst`
///
/// # Errors
///
/// * `InvalidResource` if `dst` is stale, `data` is empty or larger than `dst`
/// * `OutOfDeviceMemory` if the staging buffer cannot be allocated
/// * `TransferFailed` if the write, submission or fence wait fails
pub fn upload(
    device: &mut dyn GraphicsDevice,
    dst: BufferHandle,
    data: &[u8],
    timeout: Duration,
) -> Result<()> {
    let info = device
        .buffer_info(dst)
        .ok_or_else(|| Error::InvalidResource("upload to a stale buffer handle".to_string()))?;
    if data.is_empty() {
        return Err(Error::InvalidResource(format!("empty upload to '{}'", info.name)));
    }
    if data.len() as u64 > info.size {
        return Err(Error::InvalidResource(format!(
            "upload of {} bytes exceeds '{}' ({} bytes)",
            data.len(), info.name, info.size
        )));
    }

    let size = data.len() as u64;
    with_staging(device, &info.name, data, |device, staging| {
        device.copy_buffer_blocking(staging, dst, size, timeout)
    })
}

/// Allocate a buffer from `desc` and fill it with `data`
///
/// The buffer is freed again if the upload fails.
pub fn create_and_upload(
    device: &mut dyn GraphicsDevice,
    desc: &BufferDesc,
    data: &[u8],
    timeout: Duration,
) -> Result<BufferHandle> {
    let handle = device.allocate_buffer(desc)?;
    if let Err(err) = upload(device, handle, data, timeout) {
        device.free_buffer(handle);
        return Err(err);
    }
    Ok(handle)
}

/// Upload the full pixel data of `image` and leave it ready for shader reads
///
/// `data` is every mip level packed level 0 first and must be exactly
/// `ImageDesc::size_bytes` long.
pub fn upload_texture(
    device: &mut dyn GraphicsDevice,
    image: ImageHandle,
    data: &[u8],
    timeout: Duration,
) -> Result<()> {
    let info = device
        .image_info(image)
        .ok_or_else(|| Error::InvalidResource("upload to a stale image handle".to_string()))?;
    if data.len() as u64 != info.size_bytes() {
        return Err(Error::InvalidResource(format!(
            "texture '{}' expects {} bytes ({}x{} {:?}, {} mip levels), got {}",
            info.name,
            info.size_bytes(),
            info.width,
            info.height,
            info.format,
            info.mip_levels,
            data.len()
        )));
    }

    with_staging(device, &info.name, data, |device, staging| {
        device.copy_buffer_to_image_blocking(staging, image, timeout)
    })
}

/// Allocate an image from `desc` and fill it with `data`
pub fn create_texture_image(
    device: &mut dyn GraphicsDevice,
    desc: &ImageDesc,
    data: &[u8],
    timeout: Duration,
) -> Result<ImageHandle> {
    let handle = device.allocate_image(desc)?;
    if let Err(err) = upload_texture(device, handle, data, timeout) {
        device.free_image(handle);
        return Err(err);
    }
    Ok(handle)
}

/// Run `copy` with a filled staging buffer, freeing it afterwards
fn with_staging<F>(device: &mut dyn GraphicsDevice, name: &str, data: &[u8], copy: F) -> Result<()>
where
    F: FnOnce(&mut dyn GraphicsDevice, BufferHandle) -> Result<()>,
{
    let staging = device.allocate_buffer(&BufferDesc::staging(format!("{} (staging)", name), data.len() as u64))?;

    let result = device
        .write_buffer(staging, 0, data)
        .map_err(|e| Error::TransferFailed(format!("staging write failed: {}", e)))
        .and_then(|_| copy(&mut *device, staging));

    device.free_buffer(staging);

    if let Err(err) = &result {
        engine_error!(SOURCE, "Upload of {} bytes to '{}' failed: {}", data.len(), name, err);
    }
    result
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
