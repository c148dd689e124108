// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Client session: attach to a server and retrieve its latest frame.
//!
//! Retrieval is pull-based and latest-only. Each retrieve returns the current
//! frame or nothing; intermediate frames a slow client never asked for are
//! simply gone, they are not queued. A session keeps at most one slot pinned:
//! retrieving a newer frame unpins the previous one even if the caller still
//! holds the old view object.

use std::sync::Arc;

use super::descriptor::{ServerDescription, ServerId};
use super::directory::ConnectionDirectory;
use super::frame::PublishedFrame;
use super::region::Region;
use super::rotation::{ReaderKind, SlotGuard};
use super::{FramecastError, Result};
use crate::rhi::{GpuDevice, GpuTexture, TextureFormat};

/// A retrieved frame, pinned for reading.
///
/// Holding the view pins its rotation slot: the publisher will not overwrite
/// the surface until the pin is released. Release happens on drop, or earlier
/// when the owning session retrieves a newer frame or detaches; a view whose
/// pin was released that way stays safe to use, but its pixels may be
/// overwritten by a later publish. Release promptly; a long-held view forces
/// the publisher onto other slots and can eventually block it.
pub struct FrameView {
    texture: GpuTexture,
    frame: Arc<PublishedFrame>,
    guard: Arc<SlotGuard>,
}

impl FrameView {
    pub(crate) fn new(
        texture: GpuTexture,
        frame: Arc<PublishedFrame>,
        guard: Arc<SlotGuard>,
    ) -> Self {
        Self {
            texture,
            frame,
            guard,
        }
    }

    /// The frame's pixels, sized to the published region.
    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// Publication counter of this frame.
    pub fn version(&self) -> u64 {
        self.frame.version
    }

    /// Source sub-rectangle the producer published.
    pub fn region(&self) -> Region {
        self.frame.region
    }

    /// Frame dimensions (the published region's size).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.frame.region.width, self.frame.region.height)
    }

    pub fn format(&self) -> TextureFormat {
        self.frame.format
    }

    /// Whether the image is vertically flipped relative to its natural
    /// orientation. Compensate when sampling.
    pub fn flipped(&self) -> bool {
        self.frame.flipped
    }

    /// Release the view, unpinning its slot. Equivalent to dropping it.
    pub fn release(self) {}
}

impl Drop for FrameView {
    fn drop(&mut self) {
        self.guard.release_now();
    }
}

impl std::fmt::Debug for FrameView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameView")
            .field("version", &self.frame.version)
            .field("region", &self.frame.region)
            .field("flipped", &self.frame.flipped)
            .finish()
    }
}

/// Consumer-side attachment to one server.
///
/// Tracks the last retrieved version so [`ClientSession::retrieve_latest`]
/// hands each frame out once, and the slot pin of the most recent view so a
/// session never holds more than one slot. Sessions are independent; several
/// sessions may attach to the same server, each with its own cursor.
pub struct ClientSession {
    directory: ConnectionDirectory,
    server_id: ServerId,
    device: GpuDevice,
    last_version: u64,
    outstanding: Option<Arc<SlotGuard>>,
}

impl ClientSession {
    /// Attach to a server listed in the process-global directory.
    pub fn attach(server_id: &ServerId, device: GpuDevice) -> Result<Self> {
        Self::attach_in(server_id, device, ConnectionDirectory::global().clone())
    }

    /// Attach to a server in a specific directory.
    pub fn attach_in(
        server_id: &ServerId,
        device: GpuDevice,
        directory: ConnectionDirectory,
    ) -> Result<Self> {
        if directory.lookup(server_id).is_none() {
            return Err(FramecastError::NotFound(server_id.to_string()));
        }
        tracing::debug!(server = %server_id, "client attached");
        Ok(Self {
            directory,
            server_id: server_id.clone(),
            device,
            last_version: 0,
            outstanding: None,
        })
    }

    /// Attach using an out-of-band [`ServerDescription`].
    ///
    /// Works for private servers, which public listings exclude.
    pub fn attach_description(description: &ServerDescription, device: GpuDevice) -> Result<Self> {
        Self::attach_in(
            &description.identity.id,
            device,
            ConnectionDirectory::global().clone(),
        )
    }

    /// [`Self::attach_description`] against a specific directory.
    pub fn attach_description_in(
        description: &ServerDescription,
        device: GpuDevice,
        directory: ConnectionDirectory,
    ) -> Result<Self> {
        Self::attach_in(&description.identity.id, device, directory)
    }

    /// Id of the server this session is attached to.
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// Whether a frame newer than the last retrieved one is available.
    ///
    /// Cheap; does not pin anything. A subsequent retrieve may still return
    /// `None` if the server stops in between.
    pub fn has_new_frame(&self) -> bool {
        self.directory
            .lookup(&self.server_id)
            .and_then(|snapshot| snapshot.frame)
            .is_some_and(|frame| frame.version > self.last_version)
    }

    /// Retrieve the server's current frame, if newer than the last retrieve.
    ///
    /// Returns `Ok(None)` when the server has not published yet or when the
    /// current frame was already retrieved by this session. Fails with
    /// `ServerGone` once the server stops or its process exits; views already
    /// retrieved stay valid.
    ///
    /// A successful retrieve unpins the previous view's slot: a stale view is
    /// by definition no longer worth protecting from the publisher.
    pub fn retrieve_latest(&mut self) -> Result<Option<FrameView>> {
        loop {
            let core = self
                .directory
                .resolve(&self.server_id)
                .ok_or(FramecastError::ServerGone)?;
            if !core.is_active() {
                return Err(FramecastError::ServerGone);
            }

            let Some(frame) = core.current_frame() else {
                return Ok(None);
            };
            if frame.version <= self.last_version {
                return Ok(None);
            }

            let Some(guard) =
                core.rotation()
                    .retain_for_read(frame.slot, frame.version, ReaderKind::Client)
            else {
                // Slot republished between snapshot and retain; the next
                // snapshot is strictly newer, so this terminates.
                continue;
            };

            let texture = self.device.import_surface(&frame.handle)?;
            let guard = Arc::new(guard);
            if let Some(previous) = self.outstanding.replace(Arc::clone(&guard)) {
                previous.release_now();
            }
            self.last_version = frame.version;
            return Ok(Some(FrameView::new(texture, frame, guard)));
        }
    }

    /// Detach from the server, unpinning any outstanding view's slot.
    ///
    /// Views retrieved earlier remain safe to use, but their pixels may be
    /// overwritten by later publishes once unpinned.
    pub fn detach(self) {
        tracing::debug!(server = %self.server_id, "client detached");
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Some(previous) = self.outstanding.take() {
            previous.release_now();
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("server", &self.server_id)
            .field("last_version", &self.last_version)
            .finish()
    }
}
