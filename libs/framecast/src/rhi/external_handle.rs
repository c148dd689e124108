// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Cross-process shared-surface handle.

use serde::{Deserialize, Serialize};

/// Platform-agnostic GPU surface handle for cross-process sharing.
///
/// A handle names a surface in a way another process can resolve without
/// copying the pixel data. The rotation and versioning logic never inspects
/// the concrete variant; only device backends do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceHandle {
    /// macOS: IOSurface via mach port, created with `IOSurfaceCreateMachPort()`.
    #[cfg(target_os = "macos")]
    IOSurfaceMachPort { port: u32 },

    /// Linux: DMA-BUF file descriptor, passed via SCM_RIGHTS ancillary data.
    #[cfg(target_os = "linux")]
    DmaBuf { fd: i32, size: usize },

    /// Windows: DXGI shared handle, opened with `OpenSharedHandle()`.
    #[cfg(target_os = "windows")]
    DxgiShared { handle: u64 },

    /// Shared-memory surface arena segment, addressable by id.
    ///
    /// This is the always-available backend used by the in-tree CPU device.
    Shm { id: u64 },
}

impl SurfaceHandle {
    /// Extract the arena segment id from a `Shm` handle.
    pub fn shm_id(&self) -> Option<u64> {
        match self {
            SurfaceHandle::Shm { id } => Some(*id),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shm_id_extraction() {
        let handle = SurfaceHandle::Shm { id: 42 };
        assert_eq!(handle.shm_id(), Some(42));
    }

    #[test]
    fn test_handle_roundtrips_through_json() {
        let handle = SurfaceHandle::Shm { id: 7 };
        let encoded = serde_json::to_string(&handle).unwrap();
        let decoded: SurfaceHandle = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, handle);
    }
}
