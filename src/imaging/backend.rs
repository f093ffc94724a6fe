//! Image transform backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the upload pipeline
//! needs from an image engine: identify an input, and transform it into one
//! variant while streaming the encoded result into a writer.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, no system
//! libraries. Tests use the recording `MockBackend` in this module.
//!
//! ## Contract
//!
//! - Inputs are raw encoded bytes (`&[u8]`). Backends must not assume
//!   exclusive access: the same slice is transformed by several variants,
//!   possibly at the same time, so implementations are `Sync` and keep no
//!   shared read cursor.
//! - Orientation correction happens before any geometry.
//! - Output is written progressively to the supplied writer; the backend
//!   never buffers the complete encoded output.
//! - Errors are scoped to the single call. An error from one variant says
//!   nothing about its siblings.

use super::params::VariantSpec;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode input: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for image transform backends.
pub trait ImageBackend: Sync {
    /// Orientation-corrected dimensions of an encoded image.
    fn identify(&self, input: &[u8]) -> Result<Dimensions, BackendError>;

    /// Produce one variant of `input`, encoding straight into `output`.
    ///
    /// Returns the dimensions of the written image.
    fn transform(
        &self,
        input: &[u8],
        spec: &VariantSpec,
        output: &mut dyn Write,
    ) -> Result<Dimensions, BackendError>;
}
