// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame server: one publishing endpoint per video output.
//!
//! Frames are published by handing in an existing texture plus a command
//! buffer the server appends its copy to; the caller remains responsible for
//! committing the buffer. Safe to access across threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::client::FrameView;
use super::descriptor::{ServerDescription, ServerId, ServerIdentity, ServerOptions, Visibility};
use super::directory::ConnectionDirectory;
use super::frame::PublishedFrame;
use super::publisher::FramePublisher;
use super::region::Region;
use super::rotation::{ReaderKind, SurfaceRotation};
use super::{FramecastError, Result};
use crate::rhi::{CommandBuffer, GpuDevice, GpuTexture};

pub(crate) struct ServerCore {
    identity: ServerIdentity,
    visibility: Visibility,
    device: GpuDevice,
    rotation: Arc<SurfaceRotation>,
    publisher: FramePublisher,
    directory: ConnectionDirectory,
    stopped: AtomicBool,
}

impl ServerCore {
    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    pub fn current_frame(&self) -> Option<Arc<PublishedFrame>> {
        self.publisher.current_frame()
    }

    pub fn rotation(&self) -> &Arc<SurfaceRotation> {
        &self.rotation
    }

    fn publish(
        self: &Arc<Self>,
        texture: &GpuTexture,
        command_buffer: &mut CommandBuffer,
        region: Region,
        flipped: bool,
    ) -> Result<()> {
        if !self.is_active() {
            return Err(FramecastError::ServerStopped);
        }

        let staged = self.publisher.stage(texture, region, flipped)?;
        command_buffer.copy_region(texture, region, &staged.surface);

        let core = Arc::clone(self);
        let frame = Arc::clone(&staged.frame);
        command_buffer.on_completed(move |success| core.finish_publish(frame, success));

        Ok(())
    }

    fn finish_publish(&self, frame: Arc<PublishedFrame>, success: bool) {
        if !success || !self.is_active() {
            self.publisher.abort(&frame);
            return;
        }

        if self.publisher.install(Arc::clone(&frame)) {
            self.directory.update(&self.identity.id, Arc::clone(&frame));
            tracing::debug!(
                server = %self.identity.id,
                version = frame.version,
                slot = frame.slot,
                "frame published"
            );
        }
    }

    fn new_frame_image(self: &Arc<Self>) -> Option<FrameView> {
        loop {
            let frame = self.publisher.current_frame()?;
            if let Some(guard) =
                self.rotation
                    .retain_for_read(frame.slot, frame.version, ReaderKind::LocalPreview)
            {
                let surface = self.rotation.surface_at(frame.slot)?;
                return Some(FrameView::new(surface, frame, Arc::new(guard)));
            }
            // Lost a race with a newer publish; re-read the snapshot.
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.directory.unregister(&self.identity.id);
        tracing::info!(server = %self.identity.id, "server stopped");
    }
}

/// A frame-publishing server.
///
/// One server represents one video output; applications producing several
/// outputs run one server each. Stopping is permanent: a stopped server never
/// reactivates, a new one must be created. Dropping the server stops it.
pub struct FrameServer {
    core: Arc<ServerCore>,
}

impl FrameServer {
    /// Create and start a server registered in the process-global directory.
    ///
    /// `name` is a human-readable label shown to consumers; it need not be
    /// unique. Returns `None` if the server could not be started.
    pub fn new(name: Option<&str>, device: GpuDevice, options: ServerOptions) -> Option<Self> {
        Self::with_directory(name, device, options, ConnectionDirectory::global().clone())
    }

    /// Create and start a server registered in a specific directory.
    pub fn with_directory(
        name: Option<&str>,
        device: GpuDevice,
        options: ServerOptions,
        directory: ConnectionDirectory,
    ) -> Option<Self> {
        let identity = ServerIdentity {
            name: name.map(str::to_owned),
            id: ServerId::generate(),
        };
        let visibility = options.visibility();
        let rotation = SurfaceRotation::new(device.clone());

        let core = Arc::new(ServerCore {
            identity: identity.clone(),
            visibility,
            device,
            publisher: FramePublisher::new(Arc::clone(&rotation)),
            rotation,
            directory: directory.clone(),
            stopped: AtomicBool::new(false),
        });

        if let Err(e) = directory.register(identity, visibility, Arc::downgrade(&core)) {
            tracing::warn!("server could not be started: {}", e);
            return None;
        }

        Some(Self { core })
    }

    /// The server's human-readable name.
    pub fn name(&self) -> Option<&str> {
        self.core.identity.name.as_deref()
    }

    /// The server's process-unique id.
    pub fn id(&self) -> &ServerId {
        &self.core.identity.id
    }

    /// The device textures must be valid on for publishing.
    pub fn device(&self) -> &GpuDevice {
        &self.core.device
    }

    /// Whether the server is still Active (not stopped).
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Encode/decode-capable description of this server.
    ///
    /// For a private server this is the only attach path: pass it out-of-band
    /// to any process that should consume frames.
    pub fn server_description(&self) -> ServerDescription {
        ServerDescription {
            identity: self.core.identity.clone(),
            visibility: self.core.visibility,
        }
    }

    /// Whether any client currently holds a retrieved frame view.
    ///
    /// Producers rendering on a timer may test this and skip publishing when
    /// nobody is watching. The server's own [`Self::new_frame_image`] preview
    /// holds are not counted.
    pub fn has_clients(&self) -> bool {
        self.core.rotation.has_client_readers()
    }

    /// Publish `texture[region]` as the next frame.
    ///
    /// Appends a copy into the next rotation slot onto `command_buffer`; the
    /// caller is responsible for committing it. The new frame becomes current
    /// when the buffer completes, never before, so client reads are always
    /// ordered after the copy.
    ///
    /// Fails with `InvalidRegion` if `region` exceeds the texture bounds and
    /// with `ServerStopped` after [`Self::stop`]; both leave the previous
    /// frame current. May block briefly when every pool slot is held by
    /// lagging clients. Callers decide publish cadence; nothing throttles.
    pub fn publish(
        &self,
        texture: &GpuTexture,
        command_buffer: &mut CommandBuffer,
        region: Region,
        flipped: bool,
    ) -> Result<()> {
        self.core.publish(texture, command_buffer, region, flipped)
    }

    /// The server's own latest frame, for local preview.
    ///
    /// Returns a view valid on the server's device; the slot stays pinned
    /// until the view is dropped, so release it as soon as drawing finishes.
    pub fn new_frame_image(&self) -> Option<FrameView> {
        self.core.new_frame_image()
    }

    /// Stop the server: unregister it and fail all future publishes.
    ///
    /// Idempotent. Views clients already hold remain valid until they release
    /// them; new retrieves fail with `ServerGone`. Releasing the last
    /// reference to the server has the same effect.
    pub fn stop(&self) {
        self.core.stop();
    }
}

impl Drop for FrameServer {
    fn drop(&mut self) {
        self.core.stop();
    }
}

impl std::fmt::Debug for FrameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameServer")
            .field("id", &self.core.identity.id)
            .field("name", &self.core.identity.name)
            .field("active", &self.is_active())
            .finish()
    }
}
