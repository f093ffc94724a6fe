//! Upload entry point.
//!
//! An [`Uploader`] owns a validated [`UploadConfig`], an image backend, a blob
//! store and (for concurrency above 1) the worker pool. It is built once and
//! shared by every upload.
//!
//! ```no_run
//! use renditions::{FsBlobStore, RustBackend, UploadConfig, Uploader};
//!
//! let uploader = Uploader::new(
//!     UploadConfig::default(),
//!     RustBackend::new(),
//!     FsBlobStore::new("files"),
//! )?;
//! let bytes = std::fs::read("photo.jpg")?;
//! let outcome = uploader.upload(Some(bytes.as_slice()), "photo.jpg")?;
//! for file in &outcome.files {
//!     println!("{} -> {}", file.process, file.url);
//! }
//! # Ok::<(), renditions::UploadError>(())
//! ```

use crate::config::{ConfigError, UploadConfig};
use crate::imaging::ImageBackend;
use crate::process::{self, PipelineContext, UploadError, UploadJob, VariantEvent};
use crate::store::BlobStore;
use crate::types::UploadOutcome;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use std::sync::mpsc::Sender;

pub struct Uploader<B, S> {
    config: UploadConfig,
    backend: B,
    store: S,
    pool: Option<ThreadPool>,
}

impl<B: ImageBackend, S: BlobStore> Uploader<B, S> {
    /// Build an uploader, starting a worker pool when concurrency exceeds 1.
    pub fn new(config: UploadConfig, backend: B, store: S) -> Result<Self, UploadError> {
        let pool = match config.concurrency() {
            1 => None,
            threads => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("renditions-{i}"))
                    .build()
                    .map_err(ConfigError::from)?,
            ),
        };
        tracing::debug!(
            concurrency = config.concurrency(),
            variants = config.variants().len(),
            store = store.name(),
            "uploader ready"
        );
        Ok(Self {
            config,
            backend,
            store,
            pool,
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identifier reported in results: the configured name, else the store's.
    pub fn store_name(&self) -> &str {
        self.config
            .store_name()
            .unwrap_or_else(|| self.store.name())
    }

    /// Process one upload.
    ///
    /// A request without a file (`None` or zero bytes) is not an error: it
    /// yields an outcome with no hash and no files.
    pub fn upload(
        &self,
        bytes: Option<&[u8]>,
        original_filename: &str,
    ) -> Result<UploadOutcome, UploadError> {
        self.upload_inner(bytes, original_filename, None)
    }

    /// Like [`upload`](Self::upload), reporting per-variant progress on
    /// `events`. The sender is dropped when the upload returns.
    pub fn upload_with_events(
        &self,
        bytes: Option<&[u8]>,
        original_filename: &str,
        events: Sender<VariantEvent>,
    ) -> Result<UploadOutcome, UploadError> {
        self.upload_inner(bytes, original_filename, Some(&events))
    }

    /// Read `path` and upload its contents under its file name.
    pub fn upload_file(&self, path: &Path) -> Result<UploadOutcome, UploadError> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.upload(Some(bytes.as_slice()), &filename)
    }

    fn upload_inner(
        &self,
        bytes: Option<&[u8]>,
        original_filename: &str,
        events: Option<&Sender<VariantEvent>>,
    ) -> Result<UploadOutcome, UploadError> {
        let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
            tracing::debug!(filename = original_filename, "no file in request, nothing to do");
            return Ok(UploadOutcome::noop(original_filename));
        };

        let job = UploadJob::new(original_filename, bytes, self.config.variants());
        let ctx = PipelineContext {
            backend: &self.backend,
            store: &self.store,
            store_name: self.store_name(),
            store_url: self.config.store_url(),
            path_rule: self.config.path_rule(),
            failure_policy: self.config.failure_policy(),
            pool: self.pool.as_ref(),
        };
        let files = process::run(&job, &ctx, events)?;

        Ok(UploadOutcome {
            filename: job.original_filename,
            hash: Some(job.content_hash),
            files,
        })
    }
}
