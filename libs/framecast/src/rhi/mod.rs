// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! GPU seam: device, texture, command buffer, and cross-process surface
//! handles. Platform GPU interop layers plug in behind [`DeviceBackend`].

pub mod command_buffer;
pub mod device;
pub mod external_handle;
pub mod shm;
pub mod texture;

pub use command_buffer::CommandBuffer;
pub use device::{DeviceBackend, GpuDevice};
pub use external_handle::SurfaceHandle;
pub use shm::ShmDevice;
pub use texture::{GpuTexture, TextureBacking, TextureDescriptor, TextureFormat, TextureUsages};
