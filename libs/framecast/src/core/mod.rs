// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod client;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod frame;
pub(crate) mod publisher;
pub mod region;
pub mod rotation;
pub mod server;

pub use client::{ClientSession, FrameView};
pub use descriptor::{ServerDescription, ServerId, ServerIdentity, ServerOptions, Visibility};
pub use directory::{ConnectionDirectory, ServerSnapshot, DEFAULT_LIVENESS_TTL};
pub use error::{FramecastError, Result};
pub use frame::PublishedFrame;
pub use region::Region;
pub use rotation::{ReaderKind, SlotGuard, SurfaceRotation};
pub use server::FrameServer;
