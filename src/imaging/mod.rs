//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageDecoder::dimensions` + EXIF orientation |
//! | **Cover** | Lanczos3 fill, then gravity-anchored crop |
//! | **Contain** | Lanczos3 fit inside the box, no upscaling by default |
//! | **Encode** | JPEG, PNG, WebP, AVIF, TIFF from the `image` crate |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a variant
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining a backend with an output

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use operations::{Output, Processed, get_dimensions, process_image};
pub use params::{Gravity, OutputFormat, Quality, ResizeMode, VariantSpec};
pub use rust_backend::RustBackend;
