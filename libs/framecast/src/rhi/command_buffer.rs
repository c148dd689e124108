// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Command buffer abstraction.
//!
//! Batches region copies for submission and fires completion handlers once
//! every recorded copy is ordered before any future read. Publication of a
//! frame rides on a completion handler, which is what keeps the publish-time
//! copy ordered before client reads.

use super::device::GpuDevice;
use super::texture::GpuTexture;
use crate::core::{Region, Result};

struct CopyCommand {
    src: GpuTexture,
    region: Region,
    dst: GpuTexture,
}

type CompletionHandler = Box<dyn FnOnce(bool) + Send + 'static>;

/// Recorded GPU work plus completion handlers.
///
/// The caller that obtained the buffer is responsible for committing it.
/// Dropping an uncommitted buffer fires the handlers with `success = false`,
/// so staged publications are rolled back rather than leaked.
pub struct CommandBuffer {
    device: GpuDevice,
    commands: Vec<CopyCommand>,
    handlers: Vec<CompletionHandler>,
    committed: bool,
}

impl CommandBuffer {
    pub(crate) fn new(device: GpuDevice) -> Self {
        Self {
            device,
            commands: Vec::new(),
            handlers: Vec::new(),
            committed: false,
        }
    }

    /// Record a copy of `src[region]` into `dst` at the origin.
    pub fn copy_region(&mut self, src: &GpuTexture, region: Region, dst: &GpuTexture) {
        self.commands.push(CopyCommand {
            src: src.clone(),
            region,
            dst: dst.clone(),
        });
    }

    /// Register a handler to run after commit. The argument is `true` when
    /// every recorded copy executed.
    pub fn on_completed(&mut self, handler: impl FnOnce(bool) + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Number of recorded copies.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute the recorded copies in order, then fire completion handlers.
    pub fn commit(mut self) -> Result<()> {
        self.committed = true;

        let mut result = Ok(());
        for command in self.commands.drain(..) {
            if let Err(e) = self
                .device
                .copy_region(&command.src, command.region, &command.dst)
            {
                result = Err(e);
                break;
            }
        }

        let success = result.is_ok();
        for handler in self.handlers.drain(..) {
            handler(success);
        }

        result
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.handlers.is_empty() {
            tracing::debug!(
                handlers = self.handlers.len(),
                "command buffer dropped uncommitted"
            );
        }
        for handler in self.handlers.drain(..) {
            handler(false);
        }
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("commands", &self.commands.len())
            .field("committed", &self.committed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::rhi::texture::{TextureDescriptor, TextureFormat};

    #[test]
    fn test_completion_handler_fires_on_commit() {
        let device = GpuDevice::shm();
        let fired = Arc::new(AtomicBool::new(false));

        let mut cmd = device.new_command_buffer();
        let flag = fired.clone();
        cmd.on_completed(move |success| {
            assert!(success);
            flag.store(true, Ordering::SeqCst);
        });

        cmd.commit().unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dropped_buffer_fires_handlers_with_failure() {
        let device = GpuDevice::shm();
        let fired = Arc::new(AtomicBool::new(false));

        let mut cmd = device.new_command_buffer();
        let flag = fired.clone();
        cmd.on_completed(move |success| {
            assert!(!success);
            flag.store(true, Ordering::SeqCst);
        });

        drop(cmd);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_copy_executes_in_commit_order() {
        let device = GpuDevice::shm();
        let desc = TextureDescriptor::new(2, 2, TextureFormat::Rgba8Unorm);
        let src = device.create_texture(&desc).unwrap();
        let dst = device.create_texture(&desc).unwrap();

        src.write_pixels(&[7u8; 16]).unwrap();

        let mut cmd = device.new_command_buffer();
        cmd.copy_region(&src, Region::new(0, 0, 2, 2), &dst);
        assert_eq!(cmd.len(), 1);
        cmd.commit().unwrap();

        assert_eq!(dst.read_pixels().unwrap(), vec![7u8; 16]);
    }
}
