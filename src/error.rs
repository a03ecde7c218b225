// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Crate-wide error type.
//!
//! Every fallible operation reports one of these instead of panicking.  A failed
//! call leaves the receiver either in its pre-call state or fully released; no
//! variant implies a partially constructed resource.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of channels, height or width was zero.
    #[error("invalid shape {channels} {height} {width}: channels, height and width must be non-zero")]
    InvalidShape {
        channels: u32,
        height: u32,
        width: u32,
    },
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to create device resource `{label}`: {reason}")]
    DeviceResourceCreationFailed { label: String, reason: String },
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),
    #[error("host data is empty")]
    NullInput,
    #[error("host data holds {actual} bytes but {expected} are required")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("texel type is {requested:?} but the buffer holds {actual:?}")]
    FormatMismatch {
        requested: crate::pixel_formats::PixelFormat,
        actual: crate::pixel_formats::PixelFormat,
    },
    #[error("{0} is empty")]
    EmptyInput(&'static str),
    #[error("compile failed. {0}")]
    CompileError(String),
    #[error("kernel creation failed: {0}")]
    KernelCreationFailed(String),
    #[error("failed to read kernel source {}: {reason}", path.display())]
    FileReadError { path: PathBuf, reason: String },
    #[error("no adapter with index {index} ({count} available)")]
    AdapterNotFound { index: usize, count: usize },
    #[error("device creation failed: {0}")]
    DeviceCreationFailed(String),
    /// The buffer was created without a writable view, because the device cannot
    /// bind its format as a storage texture.
    #[error("`{0}` has no writable view on this device")]
    ViewUnavailable(String),
    #[error("transfer failed: {0}")]
    TransferFailed(String),
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Renders a captured device error the way the backend phrased it.
pub(crate) fn describe(error: &wgpu::Error) -> String {
    match error {
        wgpu::Error::Validation { description, .. } | wgpu::Error::Internal { description, .. } => {
            description.clone()
        }
        other => other.to_string(),
    }
}
