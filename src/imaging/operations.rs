//! High-level image operations.
//!
//! These functions sit between callers and an [`ImageBackend`]: they pick the
//! destination for the encoded bytes and hand back what was produced.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::VariantSpec;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Where an encoded variant goes.
pub enum Output<'a> {
    /// Collect the encoded bytes in memory and return them.
    Buffer,
    /// Stream into a caller-owned writer (a store sink, stdout, ...).
    Writer(&'a mut dyn Write),
    /// Write a file at this path, replacing it only once encoding succeeded.
    File(&'a Path),
}

/// What [`process_image`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// The encoded image, for [`Output::Buffer`].
    Buffer { bytes: Vec<u8>, dimensions: Dimensions },
    /// The image went to a writer or file.
    Written { dimensions: Dimensions },
}

impl Processed {
    pub fn dimensions(&self) -> Dimensions {
        match self {
            Processed::Buffer { dimensions, .. } | Processed::Written { dimensions } => {
                *dimensions
            }
        }
    }
}

/// Get orientation-corrected image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, input: &[u8]) -> Result<(u32, u32)> {
    let dims = backend.identify(input)?;
    Ok((dims.width, dims.height))
}

/// Transform `input` into one variant and deliver it to `output`.
pub fn process_image(
    backend: &(impl ImageBackend + ?Sized),
    input: &[u8],
    output: Output<'_>,
    spec: &VariantSpec,
) -> Result<Processed> {
    match output {
        Output::Buffer => {
            let mut bytes = Vec::new();
            let dimensions = backend.transform(input, spec, &mut bytes)?;
            Ok(Processed::Buffer { bytes, dimensions })
        }
        Output::Writer(writer) => {
            let dimensions = backend.transform(input, spec, writer)?;
            Ok(Processed::Written { dimensions })
        }
        Output::File(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            // Staged next to the target; dropped (and deleted) on failure
            let mut writer = BufWriter::new(NamedTempFile::new_in(dir)?);
            let dimensions = backend.transform(input, spec, &mut writer)?;
            let staged = writer.into_inner().map_err(|e| e.into_error())?;
            staged.as_file().sync_all()?;
            staged.persist(path).map_err(|e| e.error)?;
            Ok(Processed::Written { dimensions })
        }
    }
}
