// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU device abstraction.

use std::sync::Arc;

use super::command_buffer::CommandBuffer;
use super::external_handle::SurfaceHandle;
use super::shm::ShmDevice;
use super::texture::{GpuTexture, TextureDescriptor};
use crate::core::{Region, Result};

/// Capability set a device backend must provide for frame publishing.
///
/// Platform backends (Metal/IOSurface, Vulkan/DMA-BUF, DX12/DXGI) implement
/// this trait out of tree; the in-tree [`ShmDevice`] is the shared-memory
/// backend used when no GPU interop layer is wired up, and by tests.
pub trait DeviceBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Create a device-local texture.
    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture>;

    /// Create a texture whose storage can be exported across processes.
    fn create_shared_surface(&self, desc: &TextureDescriptor) -> Result<GpuTexture>;

    /// Wrap a surface exported by another context as a read-only texture.
    fn import_surface(&self, handle: &SurfaceHandle) -> Result<GpuTexture>;

    /// Copy `src[region]` into `dst` at the origin. Formats must match and
    /// `dst` must be at least `region`-sized.
    fn copy_region(&self, src: &GpuTexture, region: Region, dst: &GpuTexture) -> Result<()>;
}

/// Backend-agnostic GPU device wrapper.
///
/// Cheap to clone; all clones reference the same backend.
#[derive(Clone)]
pub struct GpuDevice {
    inner: Arc<dyn DeviceBackend>,
}

impl GpuDevice {
    /// Create a device over the in-tree shared-memory backend.
    pub fn shm() -> Self {
        Self::from_backend(Arc::new(ShmDevice::new()))
    }

    /// Wrap an externally provided backend (platform GPU interop layers).
    pub fn from_backend(inner: Arc<dyn DeviceBackend>) -> Self {
        Self { inner }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    /// Create a device-local texture.
    pub fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture> {
        self.inner.create_texture(desc)
    }

    /// Create a texture whose storage can be exported across processes.
    pub fn create_shared_surface(&self, desc: &TextureDescriptor) -> Result<GpuTexture> {
        self.inner.create_shared_surface(desc)
    }

    /// Wrap a surface exported by another context as a read-only texture.
    pub fn import_surface(&self, handle: &SurfaceHandle) -> Result<GpuTexture> {
        self.inner.import_surface(handle)
    }

    /// Begin recording a command buffer on this device.
    pub fn new_command_buffer(&self) -> CommandBuffer {
        CommandBuffer::new(self.clone())
    }

    pub(crate) fn copy_region(
        &self,
        src: &GpuTexture,
        region: Region,
        dst: &GpuTexture,
    ) -> Result<()> {
        self.inner.copy_region(src, region, dst)
    }
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("backend", &self.backend_name())
            .finish()
    }
}
