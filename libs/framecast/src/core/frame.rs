// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Published frame snapshot.

use serde::{Deserialize, Serialize};

use super::region::Region;
use crate::rhi::{SurfaceHandle, TextureFormat};

/// One published frame.
///
/// Immutable once published; the next publish supersedes it with a fresh
/// snapshot rather than mutating this one, so readers always observe a
/// self-consistent (version, surface, region, dimensions, flip) tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedFrame {
    /// Strictly increasing publication counter, starting at 1.
    pub version: u64,
    /// Cross-process handle for the surface holding this frame's pixels.
    pub handle: SurfaceHandle,
    /// Rotation-pool slot the frame was published into.
    pub slot: usize,
    /// Source sub-rectangle that was published.
    pub region: Region,
    /// Full dimensions of the source texture.
    pub texture_width: u32,
    pub texture_height: u32,
    /// Pixel format of the shared surface.
    pub format: TextureFormat,
    /// Whether the image is vertically flipped relative to its natural
    /// orientation. Carried as metadata; consumers compensate when sampling.
    pub flipped: bool,
}
