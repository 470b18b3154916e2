/// Resource-level texture type.
///
/// Pixel data arrives already decoded; the texture uploads it once through
/// the staging path into a sampled image, optionally with a caller-built
/// mip chain. Level 0 of a loaded texture can later receive rectangles
/// copied from another texture of the same format.

use std::time::Duration;
use crate::error::{Error, Result};
use crate::{engine_debug, engine_error};
use crate::graphics_device::{GraphicsDevice, ImageDesc, ImageHandle, ImageRegion, TextureFormat};
use crate::resource::upload;

const SOURCE: &str = "ember3d::Texture";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    name: String,
    image: ImageHandle,
    width: u32,
    height: u32,
    format: TextureFormat,
    mip_levels: u32,
}

impl Texture {
    /// Allocate the image and upload `pixels` (exactly `width * height * bpp` bytes)
    pub fn load(
        device: &mut dyn GraphicsDevice,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixels: &[u8],
        timeout: Duration,
    ) -> Result<Self> {
        Self::load_mip_chain(device, name, width, height, format, &[pixels], timeout)
    }

    /// Allocate an image with one mip level per entry of `levels` and
    /// upload them. Level `i` is `max(width >> i, 1)` by
    /// `max(height >> i, 1)` pixels.
    ///
    /// # Errors
    ///
    /// `InvalidResource` for an empty or over-long chain or a level of the
    /// wrong size, checked before anything is allocated.
    pub fn load_mip_chain(
        device: &mut dyn GraphicsDevice,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        levels: &[&[u8]],
        timeout: Duration,
    ) -> Result<Self> {
        let mip_levels = u32::try_from(levels.len())
            .map_err(|_| Error::InvalidResource("mip chain too long".to_string()))?;
        let desc = ImageDesc::new(name, width, height, format).with_mip_levels(mip_levels);
        desc.validate()?;
        for (level, pixels) in (0..mip_levels).zip(levels) {
            let expected = desc.mip_size_bytes(level);
            if pixels.len() as u64 != expected {
                let (w, h) = desc.mip_extent(level);
                return Err(Error::InvalidResource(format!(
                    "texture '{}' mip {} ({}x{}) expects {} bytes, got {}",
                    desc.name, level, w, h, expected, pixels.len()
                )));
            }
        }

        let image = upload::create_texture_image(device, &desc, &levels.concat(), timeout)?;

        engine_debug!(
            SOURCE,
            "Loaded texture '{}' ({}x{} {:?}, {} mip levels)",
            desc.name, width, height, format, mip_levels
        );

        Ok(Self {
            name: desc.name,
            image,
            width,
            height,
            format,
            mip_levels,
        })
    }

    /// Copy `region` of `src`'s level 0 into this texture's level 0
    ///
    /// Lower mip levels of this texture are left as they were.
    pub fn copy_region_from(
        &self,
        device: &mut dyn GraphicsDevice,
        src: &Texture,
        region: ImageRegion,
        timeout: Duration,
    ) -> Result<()> {
        let result = device.copy_image_region_blocking(src.image, self.image, region, timeout);
        if let Err(err) = &result {
            engine_error!(SOURCE, "Copy from '{}' into '{}' failed: {}", src.name, self.name, err);
        }
        result
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> ImageHandle {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Free the image
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.free_image(self.image);
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
