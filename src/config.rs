//! Upload configuration module.
//!
//! Handles loading, validating, and merging `renditions.toml`. Configuration
//! is layered: stock defaults are overridden by the user's config file, and
//! the merged result is validated once before anything runs.
//!
//! There are two views of the same configuration:
//!
//! - [`UploadSettings`]: the serde/TOML form. Sparse, stringly media types,
//!   `cover`/`contain` booleans. This is what users write.
//! - [`UploadConfig`]: the validated, immutable form the pipeline consumes,
//!   with compiled path rule and typed [`VariantSpec`]s. Built either from
//!   settings or directly through [`UploadConfigBuilder`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [store]
//! url = "/files"            # Public URL prefix for stored variants
//! # name = "filestore"      # Store identifier in results (default: the store's own name)
//! path = "files"            # Root directory for the filesystem store (CLI)
//!
//! [path]
//! pattern = "(...).*"       # Regex applied to the content hash
//! replacement = "$1/$0"     # Directory the first match is rewritten to
//!
//! [processing]
//! concurrency = 1           # Variants transformed at the same time
//! failure_policy = "fail-job"  # or "best-effort"
//!
//! [[variants]]
//! name = "small"
//! cover = true
//! width = 128
//! height = 128
//!
//! [[variants]]
//! name = "large"
//! contain = true
//! width = 1280
//! height = 1280
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Tables merge key by key; arrays replace, so a
//! file that declares any `[[variants]]` replaces the whole stock list:
//!
//! ```toml
//! [processing]
//! concurrency = 4
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Gravity, OutputFormat, Quality, ResizeMode, VariantSpec};
use crate::naming::{DEFAULT_PATTERN, DEFAULT_REPLACEMENT, PathRule};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("At least one variant must be configured")]
    EmptyVariants,
    #[error("Variant name {0:?} is used more than once")]
    DuplicateVariant(String),
    #[error("Variant name {0:?} must be a single non-empty path segment")]
    InvalidVariantName(String),
    #[error("Variant {variant:?} has invalid dimensions {width}x{height}")]
    InvalidDimensions {
        variant: String,
        width: u32,
        height: u32,
    },
    #[error("Variant {0:?} sets both cover and contain")]
    ConflictingResize(String),
    #[error("Variant {variant:?} has unsupported media type {media_type:?}")]
    UnsupportedMediaType { variant: String, media_type: String },
    #[error("Variant {variant:?} quality must be 0-100, got {quality}")]
    InvalidQuality { variant: String, quality: u32 },
    #[error("processing.concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("Invalid path rule: {0}")]
    InvalidPathRule(#[from] regex::Error),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// What the pipeline does with a job where some variants failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Report the job as failed, carrying the first failure and all results.
    #[default]
    FailJob,
    /// Report every result, failures included, as a successful job.
    BestEffort,
}

/// Stock variants used when the caller configures none.
///
/// - `small`: cover 128×128, JPEG quality 75
/// - `large`: contain 1280×1280, JPEG quality 75
pub fn default_variants() -> Vec<VariantSpec> {
    vec![
        VariantSpec::cover("small", 128, 128),
        VariantSpec::contain("large", 1280, 1280),
    ]
}

// =============================================================================
// TOML settings
// =============================================================================

/// Upload configuration as written in `renditions.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSettings {
    /// Where variants are published.
    pub store: StoreSettings,
    /// How a content hash becomes a storage directory.
    pub path: PathSettings,
    /// Concurrency and failure handling.
    pub processing: ProcessingSettings,
    /// Variants to produce, in order.
    pub variants: Vec<VariantSettings>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            path: PathSettings::default(),
            processing: ProcessingSettings::default(),
            variants: default_variants().iter().map(VariantSettings::from).collect(),
        }
    }
}

impl UploadSettings {
    /// Validate all values by building the pipeline configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_config().map(|_| ())
    }

    /// Build the validated pipeline configuration.
    pub fn to_config(&self) -> Result<UploadConfig, ConfigError> {
        let variants = self
            .variants
            .iter()
            .map(VariantSettings::to_spec)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = UploadConfig::builder()
            .variants(variants)
            .path_rule(&self.path.pattern, &self.path.replacement)
            .store_url(&self.store.url)
            .concurrency(self.processing.concurrency)
            .failure_policy(self.processing.failure_policy);
        if let Some(name) = &self.store.name {
            builder = builder.store_name(name);
        }
        builder.build()
    }
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Public URL prefix joined with each key.
    pub url: String,
    /// Store identifier reported in results. When absent the store's own
    /// name is used (`filestore` for the filesystem store).
    pub name: Option<String>,
    /// Root directory of the filesystem store used by the CLI.
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: "/files".to_string(),
            name: None,
            path: "files".to_string(),
        }
    }
}

/// Path rule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    pub pattern: String,
    pub replacement: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingSettings {
    /// Number of variants transformed at the same time. `1` is sequential.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// One `[[variants]]` entry.
///
/// Omitted fields fall back to: 1024×1024, gravity center, `image/jpeg`,
/// quality 75, strip metadata, no enlarging, no resize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantSettings {
    pub name: String,
    pub cover: bool,
    pub contain: bool,
    pub width: u32,
    pub height: u32,
    pub gravity: Gravity,
    pub media_type: String,
    pub quality: u32,
    pub strip: bool,
    pub enlarge: bool,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self::from(&VariantSpec::new(""))
    }
}

impl From<&VariantSpec> for VariantSettings {
    fn from(spec: &VariantSpec) -> Self {
        Self {
            name: spec.name.clone(),
            cover: spec.resize == ResizeMode::Cover,
            contain: spec.resize == ResizeMode::Contain,
            width: spec.width,
            height: spec.height,
            gravity: spec.gravity,
            media_type: spec.format.media_type().to_string(),
            quality: spec.quality.value(),
            strip: spec.strip,
            enlarge: spec.enlarge,
        }
    }
}

impl VariantSettings {
    /// Convert to a typed spec, rejecting values the spec cannot express.
    pub fn to_spec(&self) -> Result<VariantSpec, ConfigError> {
        let resize = match (self.cover, self.contain) {
            (true, true) => return Err(ConfigError::ConflictingResize(self.name.clone())),
            (true, false) => ResizeMode::Cover,
            (false, true) => ResizeMode::Contain,
            (false, false) => ResizeMode::None,
        };
        if self.quality > 100 {
            return Err(ConfigError::InvalidQuality {
                variant: self.name.clone(),
                quality: self.quality,
            });
        }
        let format = OutputFormat::from_media_type(&self.media_type).ok_or_else(|| {
            ConfigError::UnsupportedMediaType {
                variant: self.name.clone(),
                media_type: self.media_type.clone(),
            }
        })?;

        Ok(VariantSpec {
            name: self.name.clone(),
            resize,
            width: self.width,
            height: self.height,
            gravity: self.gravity,
            format,
            quality: Quality::new(self.quality),
            strip: self.strip,
            enlarge: self.enlarge,
        })
    }
}

// =============================================================================
// Validated configuration
// =============================================================================

/// Validated, immutable configuration consumed by the pipeline.
///
/// Construct with [`UploadConfig::builder`] or [`UploadSettings::to_config`].
/// Shared read-only by every job.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    variants: Vec<VariantSpec>,
    path_rule: PathRule,
    store_url: String,
    store_name: Option<String>,
    concurrency: usize,
    failure_policy: FailurePolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfigBuilder::default()
            .build()
            .expect("stock configuration must be valid")
    }
}

impl UploadConfig {
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder::default()
    }

    pub fn variants(&self) -> &[VariantSpec] {
        &self.variants
    }

    pub fn variant(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn path_rule(&self) -> &PathRule {
        &self.path_rule
    }

    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    /// Explicit store identifier, if one was configured.
    pub fn store_name(&self) -> Option<&str> {
        self.store_name.as_deref()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

/// Typed builder over the stock defaults. Validation happens once, in
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct UploadConfigBuilder {
    variants: Option<Vec<VariantSpec>>,
    pattern: String,
    replacement: String,
    store_url: String,
    store_name: Option<String>,
    concurrency: usize,
    failure_policy: FailurePolicy,
}

impl Default for UploadConfigBuilder {
    fn default() -> Self {
        let store = StoreSettings::default();
        let path = PathSettings::default();
        let processing = ProcessingSettings::default();
        Self {
            variants: None,
            pattern: path.pattern,
            replacement: path.replacement,
            store_url: store.url,
            store_name: store.name,
            concurrency: processing.concurrency,
            failure_policy: processing.failure_policy,
        }
    }
}

impl UploadConfigBuilder {
    /// Append one variant. The first call discards the stock variants.
    pub fn variant(mut self, spec: VariantSpec) -> Self {
        self.variants.get_or_insert_with(Vec::new).push(spec);
        self
    }

    /// Replace the variant list.
    pub fn variants(mut self, specs: impl IntoIterator<Item = VariantSpec>) -> Self {
        self.variants = Some(specs.into_iter().collect());
        self
    }

    pub fn path_rule(mut self, pattern: &str, replacement: &str) -> Self {
        self.pattern = pattern.to_string();
        self.replacement = replacement.to_string();
        self
    }

    pub fn store_url(mut self, url: &str) -> Self {
        self.store_url = url.to_string();
        self
    }

    pub fn store_name(mut self, name: &str) -> Self {
        self.store_name = Some(name.to_string());
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn build(self) -> Result<UploadConfig, ConfigError> {
        let variants = self.variants.unwrap_or_else(default_variants);
        validate_variants(&variants)?;
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let path_rule = PathRule::new(&self.pattern, &self.replacement)?;

        Ok(UploadConfig {
            variants,
            path_rule,
            store_url: self.store_url,
            store_name: self.store_name,
            concurrency: self.concurrency,
            failure_policy: self.failure_policy,
        })
    }
}

fn validate_variant_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::InvalidVariantName(name.to_string()));
    }
    Ok(())
}

/// Check a variant list: non-empty, valid and unique names, non-zero boxes.
pub fn validate_variants(variants: &[VariantSpec]) -> Result<(), ConfigError> {
    if variants.is_empty() {
        return Err(ConfigError::EmptyVariants);
    }
    let mut seen = HashSet::new();
    for spec in variants {
        validate_variant_name(&spec.name)?;
        if spec.width == 0 || spec.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                variant: spec.name.clone(),
                width: spec.width,
                height: spec.height,
            });
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateVariant(spec.name.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// Loading and merging
// =============================================================================

/// Stock defaults as a TOML value, the base layer for merging.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(UploadSettings::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` into `base`.
///
/// Tables merge key by key; every other value (arrays included) in the
/// overlay replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. A missing file is `None`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay over `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<UploadSettings, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: UploadSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `path` over the stock defaults.
pub fn load_config(path: &Path) -> Result<UploadSettings, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// A fully-commented `renditions.toml` with all stock defaults.
pub fn stock_config_toml() -> &'static str {
    r##"# Renditions Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Tables merge with the defaults key by key. Arrays replace: declaring any
# [[variants]] replaces the whole stock variant list.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Store
# ---------------------------------------------------------------------------
[store]
# Public URL prefix. Each variant's URL is "<url>/<key>".
url = "/files"

# Identifier reported as "store" in results.
# Omit to use the store's own name ("filestore" for the filesystem store).
# name = "filestore"

# Root directory of the filesystem store.
path = "files"

# ---------------------------------------------------------------------------
# Storage paths
# ---------------------------------------------------------------------------
[path]
# Regex applied to the content hash; the first match is rewritten to the
# replacement. $0 is the whole match, $1..$n are capture groups, ${1}
# separates a group from following letters or digits.
# The default shards on the first three characters: abc/abcdef.../small.jpeg
pattern = "(...).*"
replacement = "$1/$0"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Variants transformed at the same time. 1 processes them one by one.
concurrency = 1

# "fail-job": any failed variant fails the upload (results are still reported).
# "best-effort": failed variants are reported, the upload succeeds.
failure_policy = "fail-job"

# ---------------------------------------------------------------------------
# Variants
# ---------------------------------------------------------------------------
# Each entry produces one stored file per upload.
#   name        unique, used as the file name: <dir>/<name>.<ext>
#   cover       scale to fill width x height, then crop (default false)
#   contain     scale to fit inside width x height (default false)
#               neither: keep the source geometry
#   width       default 1024
#   height      default 1024
#   gravity     crop anchor for cover: center, north, northeast, east,
#               southeast, south, southwest, west, northwest
#   media_type  image/jpeg, image/png, image/webp, image/avif, image/tiff
#   quality     0-100, used by JPEG and AVIF (default 75)
#   strip       drop embedded metadata (default true)
#   enlarge     let contain scale small images up (default false)

[[variants]]
name = "small"
cover = true
contain = false
width = 128
height = 128
gravity = "center"
media_type = "image/jpeg"
quality = 75
strip = true
enlarge = false

[[variants]]
name = "large"
cover = false
contain = true
width = 1280
height = 1280
gravity = "center"
media_type = "image/jpeg"
quality = 75
strip = true
enlarge = false
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, content: &str) -> std::path::PathBuf {
        let path = tmp.path().join("renditions.toml");
        fs::write(&path, content).unwrap();
        path
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn default_settings_have_stock_values() {
        let s = UploadSettings::default();
        assert_eq!(s.store.url, "/files");
        assert_eq!(s.store.name, None);
        assert_eq!(s.store.path, "files");
        assert_eq!(s.path.pattern, "(...).*");
        assert_eq!(s.path.replacement, "$1/$0");
        assert_eq!(s.processing.concurrency, 1);
        assert_eq!(s.processing.failure_policy, FailurePolicy::FailJob);
    }

    #[test]
    fn default_variants_are_small_then_large() {
        let config = UploadConfig::default();
        let names: Vec<_> = config.variants().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["small", "large"]);

        let small = config.variant("small").unwrap();
        assert_eq!(small.resize, ResizeMode::Cover);
        assert_eq!((small.width, small.height), (128, 128));
        assert_eq!(small.format, OutputFormat::Jpeg);
        assert_eq!(small.quality.value(), 75);

        let large = config.variant("large").unwrap();
        assert_eq!(large.resize, ResizeMode::Contain);
        assert_eq!((large.width, large.height), (1280, 1280));
    }

    #[test]
    fn variant_settings_defaults() {
        let v = VariantSettings::default();
        assert_eq!((v.width, v.height), (1024, 1024));
        assert_eq!(v.gravity, Gravity::Center);
        assert_eq!(v.media_type, "image/jpeg");
        assert_eq!(v.quality, 75);
        assert!(v.strip);
        assert!(!v.cover && !v.contain && !v.enlarge);
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(UploadSettings::default().validate().is_ok());
    }

    // =========================================================================
    // Variant conversion
    // =========================================================================

    #[test]
    fn parse_sparse_variant() {
        let toml = r#"
[[variants]]
name = "thumb"
cover = true
width = 64
height = 48
gravity = "north-east"
media_type = "image/webp"
"#;
        let s: UploadSettings = toml::from_str(toml).unwrap();
        let spec = s.variants[0].to_spec().unwrap();
        assert_eq!(spec.name, "thumb");
        assert_eq!(spec.resize, ResizeMode::Cover);
        assert_eq!((spec.width, spec.height), (64, 48));
        assert_eq!(spec.gravity, Gravity::NorthEast);
        assert_eq!(spec.format, OutputFormat::WebP);
        assert_eq!(spec.quality.value(), 75);
        assert!(spec.strip);
    }

    #[test]
    fn cover_and_contain_conflict() {
        let v = VariantSettings {
            name: "both".into(),
            cover: true,
            contain: true,
            ..VariantSettings::default()
        };
        assert!(matches!(v.to_spec(), Err(ConfigError::ConflictingResize(n)) if n == "both"));
    }

    #[test]
    fn neither_cover_nor_contain_keeps_geometry() {
        let v = VariantSettings {
            name: "orig".into(),
            ..VariantSettings::default()
        };
        assert_eq!(v.to_spec().unwrap().resize, ResizeMode::None);
    }

    #[test]
    fn unsupported_media_type_rejected() {
        let v = VariantSettings {
            name: "gif".into(),
            media_type: "image/gif".into(),
            ..VariantSettings::default()
        };
        assert!(matches!(
            v.to_spec(),
            Err(ConfigError::UnsupportedMediaType { media_type, .. }) if media_type == "image/gif"
        ));
    }

    #[test]
    fn quality_boundary() {
        let ok = VariantSettings {
            name: "q".into(),
            quality: 100,
            ..VariantSettings::default()
        };
        assert!(ok.to_spec().is_ok());

        let too_high = VariantSettings {
            quality: 101,
            ..ok
        };
        assert!(matches!(
            too_high.to_spec(),
            Err(ConfigError::InvalidQuality { quality: 101, .. })
        ));
    }

    #[test]
    fn settings_roundtrip_through_spec() {
        for spec in default_variants() {
            let settings = VariantSettings::from(&spec);
            assert_eq!(settings.to_spec().unwrap(), spec);
        }
    }

    // =========================================================================
    // Builder validation
    // =========================================================================

    #[test]
    fn builder_without_variants_uses_stock_list() {
        let config = UploadConfig::builder().build().unwrap();
        assert_eq!(config.variants().len(), 2);
    }

    #[test]
    fn builder_variant_replaces_stock_list() {
        let config = UploadConfig::builder()
            .variant(VariantSpec::cover("only", 10, 10))
            .build()
            .unwrap();
        assert_eq!(config.variants().len(), 1);
        assert_eq!(config.variants()[0].name, "only");
    }

    #[test]
    fn builder_explicit_empty_list_rejected() {
        let result = UploadConfig::builder().variants(Vec::new()).build();
        assert!(matches!(result, Err(ConfigError::EmptyVariants)));
    }

    #[test]
    fn builder_duplicate_names_rejected() {
        let result = UploadConfig::builder()
            .variant(VariantSpec::cover("x", 10, 10))
            .variant(VariantSpec::contain("x", 20, 20))
            .build();
        assert!(matches!(result, Err(ConfigError::DuplicateVariant(n)) if n == "x"));
    }

    #[test]
    fn builder_zero_dimension_rejected() {
        let result = UploadConfig::builder()
            .variant(VariantSpec::contain("flat", 100, 0))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDimensions { height: 0, .. })
        ));
    }

    #[test]
    fn builder_bad_names_rejected() {
        for name in ["", ".", "..", "a/b", "a\\b"] {
            let result = UploadConfig::builder()
                .variant(VariantSpec::cover(name, 1, 1))
                .build();
            assert!(
                matches!(result, Err(ConfigError::InvalidVariantName(_))),
                "{name:?}"
            );
        }
    }

    #[test]
    fn builder_zero_concurrency_rejected() {
        let result = UploadConfig::builder().concurrency(0).build();
        assert!(matches!(result, Err(ConfigError::InvalidConcurrency)));
    }

    #[test]
    fn builder_invalid_pattern_rejected() {
        let result = UploadConfig::builder().path_rule("(unclosed", "$1").build();
        assert!(matches!(result, Err(ConfigError::InvalidPathRule(_))));
    }

    #[test]
    fn builder_sets_all_fields() {
        let config = UploadConfig::builder()
            .store_url("https://cdn.example.com/img")
            .store_name("s3")
            .concurrency(3)
            .failure_policy(FailurePolicy::BestEffort)
            .path_rule("(..)(..).*", "$1/$2/$0")
            .build()
            .unwrap();
        assert_eq!(config.store_url(), "https://cdn.example.com/img");
        assert_eq!(config.store_name(), Some("s3"));
        assert_eq!(config.concurrency(), 3);
        assert_eq!(config.failure_policy(), FailurePolicy::BestEffort);
        assert_eq!(config.path_rule().directory("abcdef"), "ab/cd/abcdef");
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let settings = load_config(&tmp.path().join("renditions.toml")).unwrap();
        assert_eq!(settings.store.url, "/files");
        assert_eq!(settings.variants.len(), 2);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
url = "https://cdn.example.com"

[processing]
concurrency = 2
failure_policy = "best-effort"
"#,
        );

        let settings = load_config(&path).unwrap();
        assert_eq!(settings.store.url, "https://cdn.example.com");
        assert_eq!(settings.processing.concurrency, 2);
        assert_eq!(settings.processing.failure_policy, FailurePolicy::BestEffort);
        // Unspecified values keep their defaults
        assert_eq!(settings.store.path, "files");
        assert_eq!(settings.path.pattern, "(...).*");
        assert_eq!(settings.variants.len(), 2);
    }

    #[test]
    fn load_config_variants_replace_stock_list() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[[variants]]
name = "thumb"
cover = true
width = 200
height = 200
"#,
        );

        let config = load_config(&path).unwrap().to_config().unwrap();
        assert_eq!(config.variants().len(), 1);
        assert_eq!(config.variants()[0].name, "thumb");
    }

    #[test]
    fn load_config_empty_variant_list_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "variants = []\n");
        assert!(matches!(load_config(&path), Err(ConfigError::EmptyVariants)));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "this is not valid toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[[variants]]
name = "a"
cover = true
contain = true
"#,
        );
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::ConflictingResize(_))
        ));
    }

    #[test]
    fn load_config_unreadable_path_is_io_error() {
        let tmp = TempDir::new().unwrap();
        // A directory exists but cannot be read as a file
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_raw_config(&tmp.path().join("absent.toml")).unwrap();
        assert!(result.is_none());
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<UploadSettings, _> = toml::from_str("colour = \"red\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_key_rejected() {
        let result: Result<UploadSettings, _> = toml::from_str("[store]\nbucket = \"x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_variant_key_rejected() {
        let toml = "[[variants]]\nname = \"a\"\nfit = \"cover\"\n";
        let result: Result<UploadSettings, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[processing]\nmax_processes = 4\n");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[store]\nurl = \"/files\"\npath = \"files\"").unwrap();
        let overlay: toml::Value = toml::from_str("[store]\nurl = \"/cdn\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["store"]["url"].as_str(), Some("/cdn"));
        assert_eq!(merged["store"]["path"].as_str(), Some("files"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("xs = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("xs = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["xs"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn resolve_config_with_no_overlay() {
        let settings = resolve_config(stock_defaults_value(), None).unwrap();
        assert_eq!(settings.variants, UploadSettings::default().variants);
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[processing]\nconcurrency = 0").unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::InvalidConcurrency)));
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let settings: UploadSettings = toml::from_str(stock_config_toml()).unwrap();
        let defaults = UploadSettings::default();
        assert_eq!(settings.store.url, defaults.store.url);
        assert_eq!(settings.store.name, defaults.store.name);
        assert_eq!(settings.store.path, defaults.store.path);
        assert_eq!(settings.path.pattern, defaults.path.pattern);
        assert_eq!(settings.path.replacement, defaults.path.replacement);
        assert_eq!(settings.processing.concurrency, defaults.processing.concurrency);
        assert_eq!(
            settings.processing.failure_policy,
            defaults.processing.failure_policy
        );
        assert_eq!(settings.variants, defaults.variants);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        let table = val.as_table().unwrap();
        for key in ["store", "path", "processing", "variants"] {
            assert!(table.contains_key(key), "missing {key}");
        }
        assert!(table["store"].get("name").is_none());
    }
}
