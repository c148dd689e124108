// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Surface rotation pool.
//!
//! Breaks the producer/consumer dependency: a surface currently held by
//! readers is never handed out for the next publish. The pool itself tracks
//! which slot backs the current frame, so selection stays correct even when
//! several publishes are staged or parked concurrently. The pool starts at
//! two slots, grows up to [`SurfaceRotation::MAX_SLOTS`] when every slot is
//! held by lagging readers, and past that blocks the publish call until a
//! reader releases. Slots are addressed by index, never by pointer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::core::Result;
use crate::rhi::{GpuDevice, GpuTexture, TextureDescriptor};

struct SurfaceSlot {
    surface: Option<GpuTexture>,
    /// Number of readers currently holding this slot.
    readers: usize,
    /// Version last published into this slot; 0 = never published.
    version: u64,
    /// A copy has been scheduled into this slot but not yet completed.
    pending: bool,
}

impl SurfaceSlot {
    fn empty() -> Self {
        Self {
            surface: None,
            readers: 0,
            version: 0,
            pending: false,
        }
    }

    fn reclaimable(&self) -> bool {
        self.readers == 0 && !self.pending
    }

    fn matches(&self, desc: &TextureDescriptor) -> bool {
        self.surface.as_ref().is_some_and(|s| {
            s.width() == desc.width && s.height() == desc.height && s.format() == desc.format
        })
    }
}

struct PoolState {
    slots: Vec<SurfaceSlot>,
    /// Slot backing the current frame; never selected for the next publish.
    current: Option<usize>,
    /// Holds originated by client views, as opposed to the publishing side's
    /// own preview holds.
    client_readers: usize,
}

/// Who is holding a slot for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// The publishing side previewing its own frame.
    LocalPreview,
    /// A client view.
    Client,
}

/// Fixed-bound pool of shared surfaces with per-slot reader counts.
pub struct SurfaceRotation {
    device: GpuDevice,
    inner: Mutex<PoolState>,
    reclaimed: Condvar,
}

impl SurfaceRotation {
    /// Slots allocated up front.
    pub const INITIAL_SLOTS: usize = 2;
    /// Hard pool bound; beyond this, publish blocks instead of growing.
    pub const MAX_SLOTS: usize = 8;

    pub fn new(device: GpuDevice) -> Arc<Self> {
        let slots = (0..Self::INITIAL_SLOTS).map(|_| SurfaceSlot::empty()).collect();
        Arc::new(Self {
            device,
            inner: Mutex::new(PoolState {
                slots,
                current: None,
                client_readers: 0,
            }),
            reclaimed: Condvar::new(),
        })
    }

    /// Select the least-recently-published reclaimable slot and stage it for
    /// a publish, allocating or resizing its surface to match `desc`.
    ///
    /// The slot backing the current frame is never selected, even when no
    /// reader holds it. The exclusion is re-evaluated on every pass, so a
    /// publish that was parked while another one installed cannot land on
    /// the newly current slot. Blocks when the pool is at its bound and every
    /// other slot is held.
    pub fn acquire_for_publish(&self, desc: &TextureDescriptor) -> Result<(usize, GpuTexture)> {
        let mut state = self.inner.lock();
        loop {
            let current = state.current;
            let candidate = state
                .slots
                .iter()
                .enumerate()
                .filter(|(i, slot)| Some(*i) != current && slot.reclaimable())
                .min_by_key(|(_, slot)| slot.version)
                .map(|(i, _)| i);

            if let Some(index) = candidate {
                if !state.slots[index].matches(desc) {
                    state.slots[index].surface = Some(self.device.create_shared_surface(desc)?);
                    state.slots[index].version = 0;
                }
                state.slots[index].pending = true;
                let surface = state.slots[index].surface.clone().expect("slot surface staged");
                return Ok((index, surface));
            }

            if state.slots.len() < Self::MAX_SLOTS {
                let mut slot = SurfaceSlot::empty();
                slot.surface = Some(self.device.create_shared_surface(desc)?);
                slot.pending = true;
                state.slots.push(slot);
                let index = state.slots.len() - 1;
                tracing::debug!(slots = state.slots.len(), "rotation pool grew");
                let surface = state.slots[index].surface.clone().expect("slot surface staged");
                return Ok((index, surface));
            }

            tracing::debug!("rotation pool exhausted; publish waiting for a reader release");
            self.reclaimed.wait(&mut state);
        }
    }

    /// Mark a staged publish as completed; its slot becomes the current one.
    pub fn complete_publish(&self, index: usize, version: u64) {
        let mut state = self.inner.lock();
        if state.slots.get(index).is_some() {
            state.slots[index].pending = false;
            state.slots[index].version = version;
            state.current = Some(index);
        }
    }

    /// Roll back a staged publish whose copy never completed.
    pub fn abort_publish(&self, index: usize) {
        let mut state = self.inner.lock();
        if let Some(slot) = state.slots.get_mut(index) {
            slot.pending = false;
        }
        drop(state);
        self.reclaimed.notify_all();
    }

    /// Retain `index` for reading, but only if it still holds `version`.
    ///
    /// Returns `None` when the slot has been republished since the caller
    /// snapshotted the frame; the caller re-reads the current snapshot and
    /// retries, so a reader can never pair a surface with another frame's
    /// metadata.
    pub fn retain_for_read(
        self: &Arc<Self>,
        index: usize,
        version: u64,
        kind: ReaderKind,
    ) -> Option<SlotGuard> {
        let mut state = self.inner.lock();
        let slot = state.slots.get_mut(index)?;
        if slot.pending || slot.version != version || slot.surface.is_none() {
            return None;
        }
        slot.readers += 1;
        if kind == ReaderKind::Client {
            state.client_readers += 1;
        }
        Some(SlotGuard {
            pool: Arc::clone(self),
            index,
            kind,
            released: AtomicBool::new(false),
        })
    }

    /// The surface currently backing `index`.
    pub fn surface_at(&self, index: usize) -> Option<GpuTexture> {
        self.inner.lock().slots.get(index).and_then(|s| s.surface.clone())
    }

    /// Whether any slot currently has readers of any kind.
    pub fn has_readers(&self) -> bool {
        self.inner.lock().slots.iter().any(|slot| slot.readers > 0)
    }

    /// Whether any client view currently holds a slot. Local preview holds
    /// are not counted.
    pub fn has_client_readers(&self) -> bool {
        self.inner.lock().client_readers > 0
    }

    /// Current pool size.
    pub fn slot_count(&self) -> usize {
        self.inner.lock().slots.len()
    }

    fn release(&self, index: usize, kind: ReaderKind) {
        let mut state = self.inner.lock();
        if kind == ReaderKind::Client {
            debug_assert!(state.client_readers > 0, "client reader count underflow");
            state.client_readers = state.client_readers.saturating_sub(1);
        }
        if let Some(slot) = state.slots.get_mut(index) {
            debug_assert!(slot.readers > 0, "slot reader count underflow");
            slot.readers = slot.readers.saturating_sub(1);
            if slot.readers == 0 {
                drop(state);
                self.reclaimed.notify_all();
            }
        }
    }
}

impl std::fmt::Debug for SurfaceRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRotation")
            .field("slots", &self.slot_count())
            .finish()
    }
}

/// Reader hold on one rotation slot.
///
/// The hold is released at most once: either eagerly through
/// [`SlotGuard::release_now`] (the session's latest-only discipline) or on
/// drop, so the slot's reader count is decremented exactly once on every
/// exit path.
pub struct SlotGuard {
    pool: Arc<SurfaceRotation>,
    index: usize,
    kind: ReaderKind,
    released: AtomicBool,
}

impl SlotGuard {
    pub fn slot(&self) -> usize {
        self.index
    }

    /// Release the hold immediately. Idempotent; a later drop is a no-op.
    pub(crate) fn release_now(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.pool.release(self.index, self.kind);
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("slot", &self.index)
            .field("kind", &self.kind)
            .finish()
    }
}
