// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use super::region::Region;

#[derive(Error, Debug)]
pub enum FramecastError {
    #[error("region {region:?} outside texture bounds {width}x{height}")]
    InvalidRegion {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("server has been stopped")]
    ServerStopped,

    #[error("server not found: {0}")]
    NotFound(String),

    #[error("server is gone")]
    ServerGone,

    #[error("GPU operation failed: {0}")]
    Gpu(String),

    #[error("texture operation failed: {0}")]
    Texture(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FramecastError>;
