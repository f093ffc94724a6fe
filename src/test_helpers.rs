//! Shared test utilities for the renditions test suite.
//!
//! Provides synthetic image fixtures (generated in memory, no fixture files)
//! and a [`FlakyStore`] that injects storage failures into the pipeline.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = synthetic_jpeg(300, 200);
//! let store = FlakyStore::new().fail_writes_to("large");
//! ```

use crate::store::{BlobStore, MemoryBlobStore, StorageError, WriteSink};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat, RgbImage, RgbaImage};
use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::Mutex;
use std::time::Duration;

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A `width`×`height` JPEG with a gradient pattern (quality 90).
///
/// Red follows x and green follows y, so orientation changes are visible
/// in the pixels.
pub fn synthetic_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&gradient(width, height))
        .unwrap();
    out
}

/// Same as [`synthetic_jpeg`], with `profile` embedded as an ICC profile.
pub fn synthetic_jpeg_with_icc(width: u32, height: u32, profile: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
    encoder.set_icc_profile(profile.to_vec()).unwrap();
    encoder.encode_image(&gradient(width, height)).unwrap();
    out
}

/// Header-only ICC profile: the declared size and the `acsp` signature.
pub fn fake_icc_profile() -> Vec<u8> {
    let mut profile = vec![0u8; 132];
    profile[..4].copy_from_slice(&132u32.to_be_bytes());
    profile[36..40].copy_from_slice(b"acsp");
    profile
}

/// A `width`×`height` PNG with a varying alpha channel.
pub fn synthetic_png_rgba(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Insert a minimal big-endian EXIF APP1 segment carrying only the
/// orientation tag right after the JPEG SOI marker.
pub fn insert_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\0\x2A\0\0\0\x08"); // header, IFD0 at offset 8
    tiff.extend_from_slice(&1u16.to_be_bytes()); // one entry
    tiff.extend_from_slice(&0x0112u16.to_be_bytes()); // Orientation
    tiff.extend_from_slice(&3u16.to_be_bytes()); // SHORT
    tiff.extend_from_slice(&1u32.to_be_bytes()); // count
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0, 0]); // value padding
    tiff.extend_from_slice(&0u32.to_be_bytes()); // no next IFD

    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(&tiff);
    let segment_len = (payload.len() + 2) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Failure-injecting store
// =========================================================================

/// Where a [`FlakyStore`] breaks for keys containing a given fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `create_write_sink` fails.
    Open,
    /// Every `write` on the sink fails.
    Write,
    /// `finish` fails after all bytes were written.
    Commit,
}

/// In-memory store that fails or stalls on selected keys.
///
/// Faults and delays are matched by substring against the key, so
/// `fail_writes_to("large")` hits `ab/abc/large.jpeg`.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryBlobStore,
    faults: Vec<(String, Fault)>,
    delays: Vec<(String, Duration)>,
    opened: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, fragment: &str, fault: Fault) -> Self {
        self.faults.push((fragment.to_string(), fault));
        self
    }

    pub fn fail_writes_to(self, fragment: &str) -> Self {
        self.failing(fragment, Fault::Write)
    }

    /// Sleep before opening sinks for matching keys.
    pub fn delaying(mut self, fragment: &str, delay: Duration) -> Self {
        self.delays.push((fragment.to_string(), delay));
        self
    }

    /// Keys a sink was opened for, in open order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Keys whose sink was dropped without being finished.
    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    fn fault_for(&self, key: &str) -> Option<Fault> {
        self.faults
            .iter()
            .find(|(fragment, _)| key.contains(fragment.as_str()))
            .map(|(_, fault)| *fault)
    }
}

struct FlakySink<'a> {
    store: &'a FlakyStore,
    key: String,
    fault: Option<Fault>,
    inner: Option<Box<dyn WriteSink + 'a>>,
}

impl Write for FlakySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fault == Some(Fault::Write) {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "injected write failure"));
        }
        self.inner.as_mut().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.as_mut().unwrap().flush()
    }
}

impl WriteSink for FlakySink<'_> {
    fn finish(mut self: Box<Self>) -> Result<(), StorageError> {
        if self.fault == Some(Fault::Commit) {
            return Err(StorageError::Backend("injected commit failure".into()));
        }
        self.inner.take().unwrap().finish()
    }
}

impl Drop for FlakySink<'_> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.store.aborted.lock().unwrap().push(self.key.clone());
        }
    }
}

impl BlobStore for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn create_write_sink(&self, key: &str) -> Result<Box<dyn WriteSink + '_>, StorageError> {
        if let Some((_, delay)) = self.delays.iter().find(|(f, _)| key.contains(f.as_str())) {
            std::thread::sleep(*delay);
        }
        self.opened.lock().unwrap().push(key.to_string());

        let fault = self.fault_for(key);
        if fault == Some(Fault::Open) {
            return Err(StorageError::Backend("injected open failure".into()));
        }
        Ok(Box::new(FlakySink {
            store: self,
            key: key.to_string(),
            fault,
            inner: Some(self.inner.create_write_sink(key)?),
        }))
    }
}

/// Map of key → committed bytes, for compact assertions.
pub fn committed(store: &MemoryBlobStore) -> HashMap<String, Vec<u8>> {
    store
        .keys()
        .into_iter()
        .filter_map(|k| store.get(&k).map(|v| (k, v)))
        .collect()
}
