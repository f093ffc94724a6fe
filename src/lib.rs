//! # Renditions
//!
//! Upload an image once, get every size you serve. Renditions takes the raw
//! bytes of an uploaded image, derives a content address from them, and
//! produces a configured list of variants (thumbnails, previews, re-encodes),
//! streaming each one straight into a blob store under a deterministic key.
//!
//! # Architecture: One Job, N Variants
//!
//! ```text
//! bytes ─▶ hash ─▶ for each variant (bounded concurrency):
//!                    key  = path rule(hash) / <variant>.<ext>
//!                    sink = store.create_write_sink(key)
//!                    backend.transform(bytes, variant, sink)
//!                    sink.finish()  (or drop = abort)
//!        ─▶ ordered results: store, process, key, url, status
//! ```
//!
//! Identical content always lands on identical keys, so re-uploading a file
//! overwrites its variants with the same bytes instead of duplicating them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`hashing`] | SHA-256 content hash of the upload |
//! | [`naming`] | Path rule: content hash → storage directory, key and URL |
//! | [`imaging`] | Pure-Rust transforms: orientation, cover/contain, encoding |
//! | [`store`] | `BlobStore` / `WriteSink` traits, filesystem and in-memory stores |
//! | [`process`] | The variant pipeline: fan-out, failure classification, progress events |
//! | [`upload`] | `Uploader`, the entry point that owns config, backend, store and pool |
//! | [`config`] | `renditions.toml` loading, merging, validation, typed builder |
//! | [`types`] | Results returned to callers (`VariantResult`, `UploadOutcome`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Streaming Into Sinks
//!
//! Encoders write directly into the store's sink; a variant is never held in
//! memory as a whole (TIFF excepted, whose encoder needs to seek). A sink only
//! publishes on an explicit `finish`, so a variant that fails halfway leaves
//! nothing behind under its key.
//!
//! ## Failures Are Per Variant
//!
//! One broken variant does not cancel its siblings. Every variant settles,
//! its result records success or the reason for failure, and the job-level
//! error (if the failure policy asks for one) carries all results.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding (AVIF through `rav1e`). No system libraries, no
//! shelling out.

pub mod config;
pub mod hashing;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod store;
pub mod types;
pub mod upload;

pub use config::{FailurePolicy, UploadConfig};
pub use imaging::{ImageBackend, RustBackend, VariantSpec};
pub use process::{UploadError, VariantEvent};
pub use store::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use types::{ErrorKind, UploadOutcome, VariantResult};
pub use upload::Uploader;

#[cfg(test)]
pub(crate) mod test_helpers;
