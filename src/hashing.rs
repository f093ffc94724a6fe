//! Content hashing for upload identity.
//!
//! Every upload is identified by the SHA-256 of its raw bytes, rendered as
//! lowercase hex. The digest seeds every variant's storage key (see
//! [`naming`](crate::naming)), so identical uploads land on identical keys and
//! a re-upload overwrites instead of duplicating.
//!
//! The hash is computed once per upload and shared by all of its variants.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 of an in-memory buffer, returned as a lowercase hex string.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of everything readable from `reader`.
///
/// Produces the same digest as [`content_hash`] over the same bytes, without
/// holding the whole input in memory.
pub fn hash_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
