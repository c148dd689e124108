// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Cross-process, GPU-resident frame sharing.
//!
//! A producer runs a [`FrameServer`] per video output and publishes frames by
//! copying them into shared surfaces; consumers attach a [`ClientSession`]
//! and pull the latest frame as a zero-copy [`FrameView`]. Frames never leave
//! device-accessible memory and delivery is latest-only: a slow consumer gets
//! the newest frame, never a backlog.
//!
//! Publishing side:
//!
//! ```no_run
//! use framecast::{FrameServer, Region, ServerOptions};
//! use framecast::rhi::{GpuDevice, TextureDescriptor, TextureFormat};
//!
//! # fn main() -> framecast::Result<()> {
//! let device = GpuDevice::shm();
//! let server = FrameServer::new(Some("main out"), device.clone(), ServerOptions::default())
//!     .ok_or(framecast::FramecastError::Configuration("server start failed".into()))?;
//!
//! let canvas = device.create_texture(&TextureDescriptor::new(
//!     1920, 1080, TextureFormat::Bgra8Unorm,
//! ))?;
//!
//! let mut commands = device.new_command_buffer();
//! server.publish(&canvas, &mut commands, Region::of_size(1920, 1080), false)?;
//! commands.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! Consuming side:
//!
//! ```no_run
//! use framecast::{ClientSession, ConnectionDirectory};
//! use framecast::rhi::GpuDevice;
//!
//! # fn main() -> framecast::Result<()> {
//! let device = GpuDevice::shm();
//! let listing = ConnectionDirectory::global().list_public();
//! let mut session = ClientSession::attach(&listing[0].id, device)?;
//!
//! if let Some(view) = session.retrieve_latest()? {
//!     // Sample view.texture(); drop the view when done drawing.
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod rhi;
pub mod telemetry;

pub use crate::core::{
    ClientSession,
    ConnectionDirectory,
    FrameServer,
    FrameView,
    FramecastError,
    PublishedFrame,
    Region,
    Result,
    ServerDescription,
    ServerId,
    ServerIdentity,
    ServerOptions,
    ServerSnapshot,
    Visibility,
    DEFAULT_LIVENESS_TTL,
};
