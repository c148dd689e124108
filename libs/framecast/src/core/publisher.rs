// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Server-side publication pipeline.
//!
//! Owns the version counter, the current-frame snapshot, and slot staging.
//! A publish is staged synchronously (region validation, slot selection,
//! handle export) and installed from the caller's command-buffer completion,
//! so the copy is ordered before any client read of the new frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::frame::PublishedFrame;
use super::region::Region;
use super::rotation::SurfaceRotation;
use super::{FramecastError, Result};
use crate::rhi::{GpuTexture, TextureDescriptor, TextureUsages};

/// A staged publish: the frame metadata plus the slot surface the copy
/// targets. Install on copy completion, abort otherwise.
pub(crate) struct StagedFrame {
    pub frame: Arc<PublishedFrame>,
    pub surface: GpuTexture,
}

pub(crate) struct FramePublisher {
    rotation: Arc<SurfaceRotation>,
    next_version: AtomicU64,
    current: RwLock<Option<Arc<PublishedFrame>>>,
}

impl FramePublisher {
    pub fn new(rotation: Arc<SurfaceRotation>) -> Self {
        Self {
            rotation,
            next_version: AtomicU64::new(1),
            current: RwLock::new(None),
        }
    }

    pub fn current_frame(&self) -> Option<Arc<PublishedFrame>> {
        self.current.read().clone()
    }

    /// Validate the region, select a slot, and build the frame snapshot.
    ///
    /// May block when the rotation pool is exhausted. No observable state
    /// changes on error; the previous frame stays current.
    pub fn stage(&self, texture: &GpuTexture, region: Region, flipped: bool) -> Result<StagedFrame> {
        if !region.fits_within(texture.width(), texture.height()) {
            return Err(FramecastError::InvalidRegion {
                region,
                width: texture.width(),
                height: texture.height(),
            });
        }

        let desc = TextureDescriptor::new(region.width, region.height, texture.format())
            .with_usage(TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING);
        let (slot, surface) = self.rotation.acquire_for_publish(&desc)?;

        let handle = match surface.export_handle() {
            Ok(handle) => handle,
            Err(e) => {
                self.rotation.abort_publish(slot);
                return Err(e);
            }
        };

        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let frame = Arc::new(PublishedFrame {
            version,
            handle,
            slot,
            region,
            texture_width: texture.width(),
            texture_height: texture.height(),
            format: texture.format(),
            flipped,
        });

        Ok(StagedFrame { frame, surface })
    }

    /// Atomically install a staged frame as current.
    ///
    /// The slot's published version is recorded before the snapshot swap, so
    /// a reader that sees the new snapshot can always retain its slot. Out of
    /// order completions never regress the current version. Returns whether
    /// the frame was installed.
    pub fn install(&self, frame: Arc<PublishedFrame>) -> bool {
        let mut current = self.current.write();
        if current.as_ref().is_some_and(|c| c.version >= frame.version) {
            self.rotation.abort_publish(frame.slot);
            return false;
        }
        self.rotation.complete_publish(frame.slot, frame.version);
        *current = Some(frame);
        true
    }

    /// Roll back a staged frame whose copy did not complete.
    pub fn abort(&self, frame: &PublishedFrame) {
        self.rotation.abort_publish(frame.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::{GpuDevice, TextureFormat};

    fn publisher() -> (GpuDevice, FramePublisher) {
        let device = GpuDevice::shm();
        let rotation = SurfaceRotation::new(device.clone());
        (device, FramePublisher::new(rotation))
    }

    fn texture(device: &GpuDevice, w: u32, h: u32) -> GpuTexture {
        device
            .create_texture(&TextureDescriptor::new(w, h, TextureFormat::Bgra8Unorm))
            .unwrap()
    }

    #[test]
    fn test_versions_strictly_increase() {
        let (device, publisher) = publisher();
        let texture = texture(&device, 16, 16);

        let first = publisher.stage(&texture, Region::of_size(16, 16), false).unwrap();
        assert!(publisher.install(Arc::clone(&first.frame)));

        let second = publisher.stage(&texture, Region::of_size(16, 16), false).unwrap();
        assert!(publisher.install(Arc::clone(&second.frame)));

        assert!(second.frame.version > first.frame.version);
        assert_eq!(publisher.current_frame().unwrap().version, second.frame.version);
    }

    #[test]
    fn test_invalid_region_leaves_current_frame() {
        let (device, publisher) = publisher();
        let texture = texture(&device, 16, 16);

        let staged = publisher.stage(&texture, Region::of_size(16, 16), false).unwrap();
        publisher.install(Arc::clone(&staged.frame));

        let result = publisher.stage(&texture, Region::of_size(17, 17), false);
        assert!(matches!(result, Err(FramecastError::InvalidRegion { .. })));
        assert_eq!(publisher.current_frame().unwrap().version, staged.frame.version);
    }

    #[test]
    fn test_out_of_order_completion_never_regresses() {
        let (device, publisher) = publisher();
        let texture = texture(&device, 16, 16);

        let first = publisher.stage(&texture, Region::of_size(16, 16), false).unwrap();
        let second = publisher.stage(&texture, Region::of_size(16, 16), false).unwrap();

        assert!(publisher.install(Arc::clone(&second.frame)));
        assert!(!publisher.install(Arc::clone(&first.frame)));

        assert_eq!(publisher.current_frame().unwrap().version, second.frame.version);
    }

    #[test]
    fn test_staged_frame_records_metadata() {
        let (device, publisher) = publisher();
        let texture = texture(&device, 32, 24);

        let region = Region::new(4, 2, 8, 8);
        let staged = publisher.stage(&texture, region, true).unwrap();

        assert_eq!(staged.frame.region, region);
        assert_eq!(staged.frame.texture_width, 32);
        assert_eq!(staged.frame.texture_height, 24);
        assert!(staged.frame.flipped);
        assert_eq!(staged.surface.width(), 8);
    }
}
