//! Storage key derivation for content-addressed variants.
//!
//! A variant's key is built from the upload digest, the variant name and the
//! output extension:
//!
//! ```text
//! <digest rewritten by the path rule>/<variant>.<ext>
//! ```
//!
//! The rewrite is a regex pattern/replacement pair applied to the **first**
//! match in the digest. The stock rule shards on the first three hex
//! characters and keeps the full digest as the leaf directory:
//!
//! ```text
//! pattern     = "(...).*"
//! replacement = "$1/$0"
//!
//! ba7816bf…  →  ba7/ba7816bf…/small.jpeg
//! ```
//!
//! Replacement strings use `regex` syntax: `$0` is the whole match, `$1`…`$n`
//! are capture groups, and `${1}` disambiguates a group followed by letters,
//! digits or underscores (`${1}_x`, not `$1_x`).
//!
//! Key derivation is pure: the same (digest, variant, extension, rule) always
//! yields the same key.

use regex::Regex;

/// Default digest pattern: capture the first three characters, match the rest.
pub const DEFAULT_PATTERN: &str = "(...).*";

/// Default replacement: `<first three>/<full digest>`.
pub const DEFAULT_REPLACEMENT: &str = "$1/$0";

/// A compiled pattern/replacement rule that maps a digest to a directory.
#[derive(Debug, Clone)]
pub struct PathRule {
    pattern: Regex,
    replacement: String,
}

impl PathRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Rewrite a digest into its directory part.
    ///
    /// Digests the pattern does not match pass through unchanged.
    pub fn directory(&self, digest: &str) -> String {
        self.pattern
            .replace(digest, self.replacement.as_str())
            .into_owned()
    }

    /// Full storage key for one variant of one upload.
    pub fn storage_key(&self, digest: &str, variant: &str, extension: &str) -> String {
        format!("{}/{}.{}", self.directory(digest), variant, extension)
    }
}

impl Default for PathRule {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN, DEFAULT_REPLACEMENT).expect("default path rule must compile")
    }
}

/// Join a public URL prefix and a storage key with exactly one slash.
pub fn public_url(store_url: &str, key: &str) -> String {
    format!("{}/{}", store_url.trim_end_matches('/'), key)
}
