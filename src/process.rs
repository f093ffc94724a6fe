//! Variant pipeline: one upload in, one stored file per variant out.
//!
//! For every configured variant the pipeline:
//!
//! 1. derives the storage key from the content hash ([`PathRule`]),
//! 2. opens a write sink on the [`BlobStore`],
//! 3. lets the [`ImageBackend`] stream the encoded variant into the sink,
//! 4. commits the sink on success or drops it (aborting the write) on failure.
//!
//! ## Concurrency
//!
//! Variants run on a dedicated [rayon](https://docs.rs/rayon) pool sized by
//! `processing.concurrency`; with a concurrency of 1 there is no pool and
//! variants run one after another on the calling thread. Every variant reads
//! the same `&[u8]` and its own `&VariantSpec`, so the transform path takes
//! no locks. Results are collected in configured order whatever order the
//! variants finish in.
//!
//! ## Failures
//!
//! A failing variant never stops its siblings: every variant is attempted
//! and settles as succeeded or failed. Errors raised by the sink while the
//! backend was writing count as storage failures, everything else the backend
//! reports counts as a transform failure.
//!
//! Each settled variant draws a sequence number from a shared counter. Under
//! [`FailurePolicy::FailJob`] the job fails with the failure that settled
//! first, carrying all results; under [`FailurePolicy::BestEffort`] the
//! results are returned as they are.
//!
//! ## Progress
//!
//! An optional [`Sender`] receives a [`VariantEvent::Dispatched`] when a
//! variant starts and a [`VariantEvent::Settled`] when it is done. The
//! returned list only ever contains settled results.

use crate::config::{ConfigError, FailurePolicy, validate_variants};
use crate::hashing::content_hash;
use crate::imaging::{ImageBackend, Output, VariantSpec, process_image};
use crate::naming::{PathRule, public_url};
use crate::store::BlobStore;
use crate::types::{ErrorKind, VariantError, VariantResult, VariantStatus};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Upload contains no data")]
    EmptyInput,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Variant {variant:?} failed: {source}")]
    Variant {
        variant: String,
        source: VariantError,
        /// Every settled result, failures included, in configured order.
        results: Vec<VariantResult>,
    },
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Config(_) => ErrorKind::Config,
            UploadError::EmptyInput => ErrorKind::NoInput,
            UploadError::Io(_) => ErrorKind::FatalIo,
            UploadError::Variant { source, .. } => source.kind,
        }
    }

    /// Results produced before the job was reported as failed.
    pub fn partial_results(&self) -> &[VariantResult] {
        match self {
            UploadError::Variant { results, .. } => results,
            _ => &[],
        }
    }
}

/// Progress notification for a single variant.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantEvent {
    /// The variant's key is known and its transform is starting.
    Dispatched {
        index: usize,
        variant: String,
        key: String,
    },
    /// The variant finished; `sequence` is its settlement order (0-based).
    Settled {
        index: usize,
        sequence: usize,
        result: VariantResult,
    },
}

/// One upload: the bytes, their hash and the variants to produce.
#[derive(Debug, Clone)]
pub struct UploadJob<'a> {
    pub original_filename: String,
    pub bytes: &'a [u8],
    pub content_hash: String,
    pub variants: &'a [VariantSpec],
}

impl<'a> UploadJob<'a> {
    /// Build a job, hashing `bytes` once.
    pub fn new(
        original_filename: impl Into<String>,
        bytes: &'a [u8],
        variants: &'a [VariantSpec],
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            bytes,
            content_hash: content_hash(bytes),
            variants,
        }
    }
}

/// Everything a job needs besides its own data. Borrowed, so a single
/// uploader can run many jobs against the same backend, store and pool.
pub struct PipelineContext<'a, B: ?Sized, S: ?Sized> {
    pub backend: &'a B,
    pub store: &'a S,
    /// Identifier reported as `store` in results.
    pub store_name: &'a str,
    pub store_url: &'a str,
    pub path_rule: &'a PathRule,
    pub failure_policy: FailurePolicy,
    /// `None` runs variants sequentially on the calling thread.
    pub pool: Option<&'a ThreadPool>,
}

/// Writer wrapper that counts bytes and remembers the first error raised by
/// the wrapped sink.
struct CountingWriter<W> {
    inner: W,
    written: u64,
    sink_error: Option<String>,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            sink_error: None,
        }
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result
            && self.sink_error.is_none()
        {
            self.sink_error = Some(e.to_string());
        }
        result
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        let n = self.record(result)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result)
    }
}

struct Written {
    dimensions: (u32, u32),
    bytes: u64,
}

/// Transform one variant into a fresh sink and commit it.
fn write_variant<B, S>(
    backend: &B,
    store: &S,
    input: &[u8],
    spec: &VariantSpec,
    key: &str,
) -> Result<Written, VariantError>
where
    B: ImageBackend + ?Sized,
    S: BlobStore + ?Sized,
{
    let mut sink = store
        .create_write_sink(key)
        .map_err(VariantError::storage)?;

    let mut counter = CountingWriter::new(&mut *sink);
    let processed = process_image(backend, input, Output::Writer(&mut counter), spec);
    let CountingWriter {
        written,
        sink_error,
        ..
    } = counter;

    match processed {
        Ok(processed) => {
            sink.finish().map_err(VariantError::storage)?;
            let dims = processed.dimensions();
            Ok(Written {
                dimensions: (dims.width, dims.height),
                bytes: written,
            })
        }
        // Dropping the sink aborts the partial write
        Err(e) => Err(match sink_error {
            Some(message) => VariantError::storage(format!("write to {key} failed: {message}")),
            None => VariantError::transform(e),
        }),
    }
}

/// Run every variant of `job` and aggregate the results.
///
/// Fails before doing any work on empty input or an invalid variant list.
pub fn run<B, S>(
    job: &UploadJob<'_>,
    ctx: &PipelineContext<'_, B, S>,
    events: Option<&Sender<VariantEvent>>,
) -> Result<Vec<VariantResult>, UploadError>
where
    B: ImageBackend + ?Sized,
    S: BlobStore + ?Sized,
{
    if job.bytes.is_empty() {
        return Err(UploadError::EmptyInput);
    }
    validate_variants(job.variants)?;

    tracing::info!(
        filename = %job.original_filename,
        hash = %job.content_hash,
        bytes = job.bytes.len(),
        variants = job.variants.len(),
        "processing upload"
    );

    let settled = AtomicUsize::new(0);
    let task = |(index, spec): (usize, &VariantSpec)| {
        let key = ctx
            .path_rule
            .storage_key(&job.content_hash, &spec.name, spec.extension());
        let url = public_url(ctx.store_url, &key);
        if let Some(tx) = events {
            tx.send(VariantEvent::Dispatched {
                index,
                variant: spec.name.clone(),
                key: key.clone(),
            })
            .ok();
        }
        tracing::debug!(variant = %spec.name, %key, "variant dispatched");

        let outcome = write_variant(ctx.backend, ctx.store, job.bytes, spec, &key);
        let sequence = settled.fetch_add(1, Ordering::SeqCst);

        let mut result = VariantResult {
            store: ctx.store_name.to_string(),
            process: spec.name.clone(),
            key,
            url,
            status: VariantStatus::Succeeded,
            dimensions: None,
            bytes: 0,
            error: None,
        };
        match outcome {
            Ok(written) => {
                tracing::debug!(
                    variant = %spec.name,
                    width = written.dimensions.0,
                    height = written.dimensions.1,
                    bytes = written.bytes,
                    "variant stored"
                );
                result.dimensions = Some(written.dimensions);
                result.bytes = written.bytes;
            }
            Err(error) => {
                tracing::warn!(
                    variant = %spec.name,
                    key = %result.key,
                    kind = %error.kind,
                    "variant failed: {}",
                    error.message
                );
                result.status = VariantStatus::Failed;
                result.error = Some(error);
            }
        }

        if let Some(tx) = events {
            tx.send(VariantEvent::Settled {
                index,
                sequence,
                result: result.clone(),
            })
            .ok();
        }
        (sequence, result)
    };

    let settled_results: Vec<(usize, VariantResult)> = match ctx.pool {
        Some(pool) => pool.install(|| job.variants.par_iter().enumerate().map(&task).collect()),
        None => job.variants.iter().enumerate().map(&task).collect(),
    };

    let first_failure = settled_results
        .iter()
        .filter_map(|(sequence, r)| r.error.as_ref().map(|e| (*sequence, &r.process, e)))
        .min_by_key(|(sequence, _, _)| *sequence)
        .map(|(_, variant, error)| (variant.clone(), error.clone()));
    let results: Vec<VariantResult> = settled_results.into_iter().map(|(_, r)| r).collect();

    let failed = results.iter().filter(|r| !r.is_success()).count();
    tracing::info!(
        hash = %job.content_hash,
        succeeded = results.len() - failed,
        failed,
        "upload processed"
    );

    match (ctx.failure_policy, first_failure) {
        (FailurePolicy::FailJob, Some((variant, source))) => Err(UploadError::Variant {
            variant,
            source,
            results,
        }),
        _ => Ok(results),
    }
}
