// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared-memory device backend.
//!
//! CPU-visible stand-in for the OS GPU interop layers: shared surfaces live in
//! a process-global arena keyed by numeric id, and importing a
//! [`SurfaceHandle::Shm`] resolves the same storage by id the way
//! `IOSurfaceLookup` resolves an IOSurface. Rotation and versioning logic
//! never depends on this backend specifically.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use super::device::DeviceBackend;
use super::external_handle::SurfaceHandle;
use super::texture::{GpuTexture, TextureBacking, TextureDescriptor, TextureFormat};
use crate::core::{FramecastError, Region, Result};

static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(1);

static ARENA: OnceLock<Mutex<HashMap<u64, Weak<ShmSegment>>>> = OnceLock::new();

fn arena() -> &'static Mutex<HashMap<u64, Weak<ShmSegment>>> {
    ARENA.get_or_init(|| Mutex::new(HashMap::new()))
}

/// One surface's storage. Shared segments are registered in the arena and
/// deregistered on drop.
struct ShmSegment {
    id: Option<u64>,
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: RwLock<Vec<u8>>,
}

impl ShmSegment {
    fn new(desc: &TextureDescriptor, id: Option<u64>) -> Self {
        Self {
            id,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            pixels: RwLock::new(vec![0u8; desc.byte_size()]),
        }
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            arena().lock().remove(&id);
        }
    }
}

/// Texture handed out by [`ShmDevice`]. Imported surfaces are read-only.
struct ShmTexture {
    segment: Arc<ShmSegment>,
    read_only: bool,
}

impl TextureBacking for ShmTexture {
    fn width(&self) -> u32 {
        self.segment.width
    }

    fn height(&self) -> u32 {
        self.segment.height
    }

    fn format(&self) -> TextureFormat {
        self.segment.format
    }

    fn export_handle(&self) -> Result<SurfaceHandle> {
        match self.segment.id {
            Some(id) => Ok(SurfaceHandle::Shm { id }),
            None => Err(FramecastError::NotSupported(
                "texture was not created as a shared surface".into(),
            )),
        }
    }

    fn read_pixels(&self) -> Result<Vec<u8>> {
        Ok(self.segment.pixels.read().clone())
    }

    fn write_pixels(&self, data: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(FramecastError::NotSupported(
                "imported surfaces are read-only".into(),
            ));
        }
        let mut pixels = self.segment.pixels.write();
        if data.len() != pixels.len() {
            return Err(FramecastError::Texture(format!(
                "pixel data length {} does not match surface size {}",
                data.len(),
                pixels.len()
            )));
        }
        pixels.copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared-memory device backend.
pub struct ShmDevice {
    _private: (),
}

impl ShmDevice {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn downcast<'a>(&self, texture: &'a GpuTexture) -> Result<&'a ShmTexture> {
        texture
            .backing()
            .as_any()
            .downcast_ref::<ShmTexture>()
            .ok_or_else(|| {
                FramecastError::Gpu("texture was not created by the shared-memory backend".into())
            })
    }
}

impl Default for ShmDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for ShmDevice {
    fn backend_name(&self) -> &'static str {
        "shm"
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture> {
        let segment = Arc::new(ShmSegment::new(desc, None));
        Ok(GpuTexture::from_backing(Arc::new(ShmTexture {
            segment,
            read_only: false,
        })))
    }

    fn create_shared_surface(&self, desc: &TextureDescriptor) -> Result<GpuTexture> {
        let id = NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed);
        let segment = Arc::new(ShmSegment::new(desc, Some(id)));
        arena().lock().insert(id, Arc::downgrade(&segment));

        tracing::debug!(
            id,
            width = desc.width,
            height = desc.height,
            format = ?desc.format,
            "allocated shared surface"
        );

        Ok(GpuTexture::from_backing(Arc::new(ShmTexture {
            segment,
            read_only: false,
        })))
    }

    fn import_surface(&self, handle: &SurfaceHandle) -> Result<GpuTexture> {
        let id = handle.shm_id().ok_or_else(|| {
            FramecastError::NotSupported(format!(
                "handle {:?} is not resolvable by the shared-memory backend",
                handle
            ))
        })?;

        let segment = arena()
            .lock()
            .get(&id)
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                FramecastError::Texture(format!("shared surface {} no longer exists", id))
            })?;

        Ok(GpuTexture::from_backing(Arc::new(ShmTexture {
            segment,
            read_only: true,
        })))
    }

    fn copy_region(&self, src: &GpuTexture, region: Region, dst: &GpuTexture) -> Result<()> {
        let src_tex = self.downcast(src)?;
        let dst_tex = self.downcast(dst)?;

        if dst_tex.read_only {
            return Err(FramecastError::NotSupported(
                "imported surfaces are read-only".into(),
            ));
        }
        if Arc::ptr_eq(&src_tex.segment, &dst_tex.segment) {
            return Err(FramecastError::Texture(
                "cannot copy a surface onto itself".into(),
            ));
        }
        if src_tex.format() != dst_tex.format() {
            return Err(FramecastError::Texture(format!(
                "format mismatch: {:?} -> {:?}",
                src_tex.format(),
                dst_tex.format()
            )));
        }
        if !region.fits_within(src_tex.width(), src_tex.height()) {
            return Err(FramecastError::Texture(format!(
                "copy region {:?} outside source bounds {}x{}",
                region,
                src_tex.width(),
                src_tex.height()
            )));
        }
        if region.width > dst_tex.width() || region.height > dst_tex.height() {
            return Err(FramecastError::Texture(format!(
                "destination {}x{} smaller than copy region {:?}",
                dst_tex.width(),
                dst_tex.height(),
                region
            )));
        }

        let bpp = src_tex.format().bytes_per_pixel() as usize;
        let src_pixels = src_tex.segment.pixels.read();
        let mut dst_pixels = dst_tex.segment.pixels.write();

        let src_stride = src_tex.width() as usize * bpp;
        let dst_stride = dst_tex.width() as usize * bpp;
        let row_bytes = region.width as usize * bpp;

        for row in 0..region.height as usize {
            let src_off = (region.y as usize + row) * src_stride + region.x as usize * bpp;
            let dst_off = row * dst_stride;
            dst_pixels[dst_off..dst_off + row_bytes]
                .copy_from_slice(&src_pixels[src_off..src_off + row_bytes]);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::device::GpuDevice;

    fn device() -> GpuDevice {
        GpuDevice::shm()
    }

    #[test]
    fn test_shared_surface_export_and_import() {
        let device = device();
        let desc = TextureDescriptor::new(4, 4, TextureFormat::Bgra8Unorm);

        let surface = device.create_shared_surface(&desc).unwrap();
        surface.write_pixels(&[9u8; 64]).unwrap();

        let handle = surface.export_handle().unwrap();
        let imported = device.import_surface(&handle).unwrap();

        assert_eq!(imported.width(), 4);
        assert_eq!(imported.format(), TextureFormat::Bgra8Unorm);
        assert_eq!(imported.read_pixels().unwrap(), vec![9u8; 64]);
    }

    #[test]
    fn test_imported_surface_is_read_only() {
        let device = device();
        let desc = TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm);

        let surface = device.create_shared_surface(&desc).unwrap();
        let imported = device.import_surface(&surface.export_handle().unwrap()).unwrap();

        assert!(imported.write_pixels(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_plain_texture_is_not_exportable() {
        let device = device();
        let desc = TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm);

        let texture = device.create_texture(&desc).unwrap();
        assert!(texture.export_handle().is_err());
    }

    #[test]
    fn test_import_fails_after_surface_dropped() {
        let device = device();
        let desc = TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm);

        let surface = device.create_shared_surface(&desc).unwrap();
        let handle = surface.export_handle().unwrap();
        drop(surface);

        assert!(device.import_surface(&handle).is_err());
    }

    #[test]
    fn test_copy_region_extracts_subrectangle() {
        let device = device();
        let src = device
            .create_texture(&TextureDescriptor::new(4, 4, TextureFormat::Rgba8Unorm))
            .unwrap();
        let dst = device
            .create_texture(&TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm))
            .unwrap();

        // Pixel (x, y) gets value x + 4 * y across all four channels.
        let mut data = vec![0u8; 64];
        for y in 0..4u8 {
            for x in 0..4u8 {
                let off = (y as usize * 4 + x as usize) * 4;
                data[off..off + 4].fill(x + 4 * y);
            }
        }
        src.write_pixels(&data).unwrap();

        device
            .copy_region(&src, Region::new(1, 2, 2, 2), &dst)
            .unwrap();

        let out = dst.read_pixels().unwrap();
        // Rows (y=2, x=1..3) and (y=3, x=1..3).
        assert_eq!(&out[0..4], &[9u8; 4]);
        assert_eq!(&out[4..8], &[10u8; 4]);
        assert_eq!(&out[8..12], &[13u8; 4]);
        assert_eq!(&out[12..16], &[14u8; 4]);
    }

    #[test]
    fn test_copy_region_rejects_format_mismatch() {
        let device = device();
        let src = device
            .create_texture(&TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm))
            .unwrap();
        let dst = device
            .create_texture(&TextureDescriptor::new(2, 2, TextureFormat::Bgra8Unorm))
            .unwrap();

        assert!(device.copy_region(&src, Region::new(0, 0, 2, 2), &dst).is_err());
    }
}
