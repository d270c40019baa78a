//! Error types shared by the registries and the renderer facade.

use thiserror::Error;

/// Failures of texture and mesh resource operations.
///
/// Registries return these directly. The [`Renderer`](crate::renderer::Renderer)
/// logs them and hands out `None` instead, so a single bad asset never unwinds
/// through a frame.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The image bytes could not be read or decoded.
    #[error("could not decode image {name}: {reason}")]
    Decode { name: String, reason: String },

    /// Only 3- and 4-channel 8-bit images can be uploaded.
    #[error("unsupported pixel format for {name}: {channels} channel(s)")]
    UnsupportedFormat { name: String, channels: u32 },

    /// Zero dimension, zero depth or missing pixel data.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The driver refused the allocation.
    #[error("GPU resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Persistent error flag of a renderer, readable after the fact.
///
/// The numeric codes are stable so that they can be handed across an FFI
/// boundary unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    NoError,
    ShutdownFailed,
}

impl ErrorState {
    pub fn code(self) -> i32 {
        match self {
            ErrorState::NoError => 0,
            ErrorState::ShutdownFailed => -50,
        }
    }
}
