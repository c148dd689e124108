// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Texture abstraction for the frame-publishing pipeline.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::external_handle::SurfaceHandle;
use crate::core::Result;

/// Texture pixel formats supported by the publishing pipeline.
///
/// Backends map these to native format constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TextureFormat {
    /// 8-bit RGBA, unsigned normalized.
    Rgba8Unorm = 0,
    /// 8-bit RGBA, sRGB.
    Rgba8UnormSrgb = 1,
    /// 8-bit BGRA, unsigned normalized.
    Bgra8Unorm = 2,
    /// 8-bit BGRA, sRGB.
    Bgra8UnormSrgb = 3,
}

impl TextureFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8Unorm | Self::Bgra8UnormSrgb => 4,
        }
    }

    /// Whether this format has an sRGB transfer function.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb)
    }
}

/// Texture usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureUsages(u32);

impl TextureUsages {
    pub const NONE: Self = Self(0);
    /// Can be copied from.
    pub const COPY_SRC: Self = Self(1 << 0);
    /// Can be copied to.
    pub const COPY_DST: Self = Self(1 << 1);
    /// Can be bound as a sampled texture.
    pub const TEXTURE_BINDING: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsages {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TextureUsages {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Descriptor for creating a texture or shared surface.
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl TextureDescriptor {
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_SRC,
        }
    }

    pub fn with_usage(mut self, usage: TextureUsages) -> Self {
        self.usage = usage;
        self
    }

    /// Total byte size of one full image at this descriptor.
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Backend-owned texture storage.
///
/// Implemented by each device backend; `GpuTexture` wraps an `Arc` of this.
pub trait TextureBacking: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> TextureFormat;

    /// Export the surface for sharing with another process.
    ///
    /// Fails for textures that were not created as shared surfaces.
    fn export_handle(&self) -> Result<SurfaceHandle>;

    /// Read the full image back to CPU memory (CPU-visible backends only).
    fn read_pixels(&self) -> Result<Vec<u8>>;

    /// Overwrite the full image from CPU memory (CPU-visible backends only).
    fn write_pixels(&self, data: &[u8]) -> Result<()>;

    /// Dip down to the concrete backend texture type.
    fn as_any(&self) -> &dyn Any;
}

/// Backend-agnostic texture wrapper.
///
/// Cheap to clone; all clones reference the same backend storage.
#[derive(Clone)]
pub struct GpuTexture {
    inner: Arc<dyn TextureBacking>,
}

impl GpuTexture {
    pub fn from_backing(inner: Arc<dyn TextureBacking>) -> Self {
        Self { inner }
    }

    /// Texture width in pixels.
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Texture height in pixels.
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Texture format.
    pub fn format(&self) -> TextureFormat {
        self.inner.format()
    }

    /// Export the cross-process sharing handle for this surface.
    pub fn export_handle(&self) -> Result<SurfaceHandle> {
        self.inner.export_handle()
    }

    /// Read the full image back to CPU memory (CPU-visible backends only).
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        self.inner.read_pixels()
    }

    /// Overwrite the full image from CPU memory (CPU-visible backends only).
    pub fn write_pixels(&self, data: &[u8]) -> Result<()> {
        self.inner.write_pixels(data)
    }

    pub(crate) fn backing(&self) -> &dyn TextureBacking {
        self.inner.as_ref()
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format())
            .finish()
    }
}
