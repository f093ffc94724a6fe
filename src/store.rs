//! Key-addressable blob stores with streamed writes.
//!
//! The pipeline only ever *writes*: it asks a [`BlobStore`] for a
//! [`WriteSink`] under a key, streams encoded bytes into it, and then either
//! commits it with [`WriteSink::finish`] or drops it. Dropping an unfinished
//! sink aborts the write; nothing becomes visible under the key.
//!
//! Writing to an existing key overwrites it. Keys are content-addressed, so an
//! overwrite replaces a variant with identical bytes.
//!
//! | Store | Name | Backing |
//! |---|---|---|
//! | [`FsBlobStore`] | `filestore` | files under a root directory, temp file + atomic rename |
//! | [`MemoryBlobStore`] | `memory` | `BTreeMap` behind a mutex |

use std::collections::BTreeMap;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("Failed to commit {key}: {source}")]
    Commit { key: String, source: io::Error },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// An open, uncommitted write under one key.
pub trait WriteSink: Write + Send {
    /// Flush and publish the written bytes under the sink's key.
    ///
    /// Consumes the sink, so completion is signalled exactly once.
    fn finish(self: Box<Self>) -> Result<(), StorageError>;
}

/// A blob store the pipeline can stream variants into.
pub trait BlobStore: Sync {
    /// Short identifier reported in results (`store` field).
    fn name(&self) -> &str {
        ""
    }

    /// Open a sink that will publish to `key` when finished.
    fn create_write_sink(&self, key: &str) -> Result<Box<dyn WriteSink + '_>, StorageError>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create_write_sink(&self, key: &str) -> Result<Box<dyn WriteSink + '_>, StorageError> {
        (**self).create_write_sink(key)
    }
}

/// Reject keys that could escape a store root or address a directory.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.ends_with('/')
        || key.contains('\\')
        || !Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// Filesystem store
// ============================================================================

/// Stores each key as a file under `root`, creating directories on demand.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path a key resolves to.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

struct FsSink {
    key: String,
    path: PathBuf,
    writer: BufWriter<NamedTempFile>,
}

impl Write for FsSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl WriteSink for FsSink {
    fn finish(self: Box<Self>) -> Result<(), StorageError> {
        let FsSink { key, path, writer } = *self;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| StorageError::Commit {
            key,
            source: e.error,
        })?;
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn name(&self) -> &str {
        "filestore"
    }

    fn create_write_sink(&self, key: &str) -> Result<Box<dyn WriteSink + '_>, StorageError> {
        let path = self.path_for(key)?;
        let dir = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir)?;
        // Staged next to the destination so the final rename stays on one filesystem
        let staged = NamedTempFile::new_in(dir)?;
        Ok(Box::new(FsSink {
            key: key.to_string(),
            path,
            writer: BufWriter::new(staged),
        }))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Keeps committed blobs in memory. Useful for tests and for callers that
/// forward variants elsewhere themselves.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    /// Committed keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

struct MemorySink<'a> {
    store: &'a MemoryBlobStore,
    key: String,
    buffer: Vec<u8>,
}

impl Write for MemorySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteSink for MemorySink<'_> {
    fn finish(self: Box<Self>) -> Result<(), StorageError> {
        let MemorySink { store, key, buffer } = *self;
        store.objects().insert(key, buffer);
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn create_write_sink(&self, key: &str) -> Result<Box<dyn WriteSink + '_>, StorageError> {
        validate_key(key)?;
        Ok(Box::new(MemorySink {
            store: self,
            key: key.to_string(),
            buffer: Vec::new(),
        }))
    }
}
