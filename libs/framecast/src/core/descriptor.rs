// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Server identity and the serializable server description.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FramecastError, Result};

/// Process-unique server identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable name (not required unique) plus the unique id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub name: Option<String>,
    pub id: ServerId,
}

/// Whether a server appears in public directory listings.
///
/// Private servers are excluded from listings but remain reachable by any
/// caller that already holds their [`ServerDescription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

/// Options supplied at server construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Exclude the server from public directory listings.
    pub private: bool,
}

impl ServerOptions {
    pub fn private() -> Self {
        Self { private: true }
    }

    pub(crate) fn visibility(&self) -> Visibility {
        if self.private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// Opaque, encode/decode-capable description of a server.
///
/// The out-of-band attach path for private servers: pass this to the consumer
/// process, which feeds it to `ClientSession::attach_description`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescription {
    pub identity: ServerIdentity,
    pub visibility: Visibility,
}

impl ServerDescription {
    /// Encode to JSON for out-of-band transfer.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| FramecastError::Configuration(format!("encoding description: {}", e)))
    }

    /// Decode from JSON.
    pub fn from_json(encoded: &str) -> Result<Self> {
        serde_json::from_str(encoded)
            .map_err(|e| FramecastError::Configuration(format!("decoding description: {}", e)))
    }
}
