// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide server directory.
//!
//! Maps server ids to their latest published frame plus the data a consumer
//! needs to open the shared surface. Entries live for the server's Active
//! lifetime; a liveness sweep removes entries whose server died without
//! unregistering, so clients do not retrieve from a dead server. An
//! in-process owner is authoritative for liveness; the publish-time heartbeat
//! only backs up entries whose owner handle is gone.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::descriptor::{ServerId, ServerIdentity, Visibility};
use super::frame::PublishedFrame;
use super::server::ServerCore;
use super::{FramecastError, Result};

/// Default staleness bound for the liveness sweep.
pub const DEFAULT_LIVENESS_TTL: Duration = Duration::from_secs(10);

struct DirectoryEntry {
    identity: ServerIdentity,
    visibility: Visibility,
    server: Weak<ServerCore>,
    frame: Option<Arc<PublishedFrame>>,
    last_seen: Instant,
}

/// Read-only view of one directory entry.
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    pub identity: ServerIdentity,
    pub visibility: Visibility,
    pub frame: Option<Arc<PublishedFrame>>,
}

/// Process-wide registry of frame servers.
///
/// Cheap to clone; all clones share the same entry table. The process-global
/// instance is [`ConnectionDirectory::global`]; separate instances exist for
/// embedding and tests.
#[derive(Clone)]
pub struct ConnectionDirectory {
    inner: Arc<Mutex<HashMap<ServerId, DirectoryEntry>>>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The process-global directory.
    pub fn global() -> &'static ConnectionDirectory {
        static GLOBAL: OnceLock<ConnectionDirectory> = OnceLock::new();
        GLOBAL.get_or_init(ConnectionDirectory::new)
    }

    pub(crate) fn register(
        &self,
        identity: ServerIdentity,
        visibility: Visibility,
        server: Weak<ServerCore>,
    ) -> Result<()> {
        let mut entries = self.inner.lock();
        if entries.contains_key(&identity.id) {
            return Err(FramecastError::Configuration(format!(
                "server '{}' is already registered",
                identity.id
            )));
        }

        tracing::info!(
            server = %identity.id,
            name = identity.name.as_deref().unwrap_or(""),
            ?visibility,
            "server registered"
        );

        entries.insert(
            identity.id.clone(),
            DirectoryEntry {
                identity,
                visibility,
                server,
                frame: None,
                last_seen: Instant::now(),
            },
        );
        Ok(())
    }

    /// Install a new current frame for `id` and refresh its liveness stamp.
    pub(crate) fn update(&self, id: &ServerId, frame: Arc<PublishedFrame>) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(id) {
            entry.frame = Some(frame);
            entry.last_seen = Instant::now();
        }
    }

    pub(crate) fn unregister(&self, id: &ServerId) -> bool {
        let removed = self.inner.lock().remove(id).is_some();
        if removed {
            tracing::info!(server = %id, "server unregistered");
        }
        removed
    }

    /// Look up a server's current snapshot.
    pub fn lookup(&self, id: &ServerId) -> Option<ServerSnapshot> {
        let entries = self.inner.lock();
        entries.get(id).map(|entry| ServerSnapshot {
            identity: entry.identity.clone(),
            visibility: entry.visibility,
            frame: entry.frame.clone(),
        })
    }

    /// Resolve the live server behind an entry, if its process still holds it.
    pub(crate) fn resolve(&self, id: &ServerId) -> Option<Arc<ServerCore>> {
        self.inner.lock().get(id).and_then(|e| e.server.upgrade())
    }

    /// Identities of all publicly listed servers.
    ///
    /// Private servers are excluded; they stay reachable through an
    /// out-of-band [`super::ServerDescription`].
    pub fn list_public(&self) -> Vec<ServerIdentity> {
        self.inner
            .lock()
            .values()
            .filter(|e| e.visibility == Visibility::Public)
            .map(|e| e.identity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop entries whose server is no longer alive.
    ///
    /// A live, Active in-process server is never swept, no matter how long it
    /// has been idle. The `ttl` applies only to entries whose owner handle is
    /// dead, where the publish heartbeat is the sole liveness signal.
    /// Returns the number of entries removed.
    pub fn sweep_stale(&self, ttl: Duration) -> usize {
        let mut entries = self.inner.lock();
        let before = entries.len();
        entries.retain(|id, entry| {
            let alive = match entry.server.upgrade() {
                Some(core) => core.is_active(),
                None => entry.last_seen.elapsed() <= ttl,
            };
            if !alive {
                tracing::warn!(server = %id, "sweeping stale directory entry");
            }
            alive
        });
        before - entries.len()
    }

    /// Run [`Self::sweep_stale`] on a background thread every `interval`.
    ///
    /// The sweeper holds only a weak reference and exits once the directory
    /// is dropped.
    pub fn spawn_sweeper(&self, interval: Duration, ttl: Duration) -> std::thread::JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        std::thread::Builder::new()
            .name("framecast-directory-sweep".into())
            .spawn(move || {
                loop {
                    std::thread::sleep(interval);
                    let Some(inner) = inner.upgrade() else { break };
                    let directory = ConnectionDirectory { inner };
                    let removed = directory.sweep_stale(ttl);
                    if removed > 0 {
                        tracing::debug!(removed, "directory sweep removed stale entries");
                    }
                }
            })
            .expect("failed to spawn directory sweeper")
    }
}

impl Default for ConnectionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDirectory")
            .field("entries", &self.len())
            .finish()
    }
}
