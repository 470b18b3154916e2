/// Image descriptors, formats, regions and handles

use slotmap::new_key_type;
use crate::error::{Error, Result};

new_key_type! {
    /// Generation-checked handle to a GPU image
    pub struct ImageHandle;
}

/// Pixel format of a sampled image or swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R8_UNORM,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM => 4,
        }
    }
}

/// Length of the full mip chain of a `width` x `height` image
pub fn max_mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Descriptor for creating a sampled 2D image
///
/// Pixel data of every mip level is packed level 0 first, each level
/// tightly packed row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    /// Debug name
    pub name: String,
    /// Width in pixels of level 0
    pub width: u32,
    /// Height in pixels of level 0
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Number of mip levels (1 = no mipmaps)
    pub mip_levels: u32,
}

impl ImageDesc {
    /// Single-level image
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format,
            mip_levels: 1,
        }
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Check the extent and the mip count
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidResource(format!("image '{}' has a zero extent", self.name)));
        }
        let max = max_mip_levels(self.width, self.height);
        if self.mip_levels == 0 || self.mip_levels > max {
            return Err(Error::InvalidResource(format!(
                "image '{}' ({}x{}) asks for {} mip levels, allowed 1..={}",
                self.name, self.width, self.height, self.mip_levels, max
            )));
        }
        Ok(())
    }

    /// Extent of mip `level`
    pub fn mip_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// Byte size of mip `level`
    pub fn mip_size_bytes(&self, level: u32) -> u64 {
        let (width, height) = self.mip_extent(level);
        width as u64 * height as u64 * self.format.bytes_per_pixel() as u64
    }

    /// Byte offset of mip `level` in the packed pixel data
    pub fn mip_offset(&self, level: u32) -> u64 {
        (0..level).map(|l| self.mip_size_bytes(l)).sum()
    }

    /// Exact byte size of the pixel data of every mip level
    pub fn size_bytes(&self) -> u64 {
        self.mip_offset(self.mip_levels)
    }
}

/// Rectangle copied from one image's level 0 to another's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

impl ImageRegion {
    /// Check the region against both images
    ///
    /// # Errors
    ///
    /// `InvalidResource` for an empty region, differing formats or a
    /// rectangle outside either image.
    pub fn validate(&self, src: &ImageDesc, dst: &ImageDesc) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidResource("empty image region".to_string()));
        }
        if src.format != dst.format {
            return Err(Error::InvalidResource(format!(
                "cannot copy {:?} '{}' into {:?} '{}'",
                src.format, src.name, dst.format, dst.name
            )));
        }
        let fits = |x: u32, y: u32, desc: &ImageDesc| {
            x as u64 + self.width as u64 <= desc.width as u64
                && y as u64 + self.height as u64 <= desc.height as u64
        };
        if !fits(self.src_x, self.src_y, src) {
            return Err(Error::InvalidResource(format!("region outside source image '{}'", src.name)));
        }
        if !fits(self.dst_x, self.dst_y, dst) {
            return Err(Error::InvalidResource(format!("region outside destination image '{}'", dst.name)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
