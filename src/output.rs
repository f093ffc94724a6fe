//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output leads with what the user cares about, the variant, and shows
//! storage details as secondary context. Every formatter is a pure function
//! returning lines, so layouts are unit tested without capturing stdout;
//! the `print_*` wrappers only write those lines.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! photo.jpg
//!     Hash: 3a7bd3e2360a3d29eea436fcfb7e44c735d117c42d1c1835420b6b9942dd4f1b
//!     small → /files/3a7/3a7bd3e2…/small.jpeg (128x128, 4.1 KB)
//!     large → /files/3a7/3a7bd3e2…/large.jpeg (1280x853, 212.0 KB)
//! ```
//!
//! A failed variant keeps its line, with the reason instead of the size:
//!
//! ```text
//!     large: failed (storage error: write to 3a7/…/large.jpeg failed: No space left on device)
//! ```
//!
//! ## Progress
//!
//! ```text
//! small: processing
//! small: stored 128x128, 4.1 KB
//! ```

use crate::process::{UploadError, VariantEvent};
use crate::types::{UploadOutcome, VariantResult};

/// Indentation for context lines.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// One line per variant result, without indentation.
pub fn variant_line(result: &VariantResult) -> String {
    match &result.error {
        None => {
            let mut detail = Vec::new();
            if let Some((w, h)) = result.dimensions {
                detail.push(format!("{}x{}", w, h));
            }
            detail.push(format_size(result.bytes));
            format!(
                "{} \u{2192} {} ({})",
                result.process,
                result.url,
                detail.join(", ")
            )
        }
        Some(error) => format!("{}: failed ({})", result.process, error),
    }
}

// ============================================================================
// Upload output
// ============================================================================

/// Format the outcome of one upload as a tree.
pub fn format_upload_outcome(outcome: &UploadOutcome) -> Vec<String> {
    let mut lines = vec![outcome.filename.clone()];
    match &outcome.hash {
        None => lines.push(format!("{}No file uploaded", indent(1))),
        Some(hash) => {
            lines.push(format!("{}Hash: {}", indent(1), hash));
            for file in &outcome.files {
                lines.push(format!("{}{}", indent(1), variant_line(file)));
            }
        }
    }
    lines
}

/// Format a failed upload: the error, then whatever results exist.
pub fn format_upload_error(filename: &str, error: &UploadError) -> Vec<String> {
    let mut lines = vec![filename.to_string()];
    lines.push(format!("{}Error ({}): {}", indent(1), error.kind(), error));
    for result in error.partial_results() {
        lines.push(format!("{}{}", indent(1), variant_line(result)));
    }
    lines
}

/// Format a single progress event.
pub fn format_variant_event(event: &VariantEvent) -> Vec<String> {
    match event {
        VariantEvent::Dispatched { variant, .. } => vec![format!("{}: processing", variant)],
        VariantEvent::Settled { result, .. } => {
            let line = match (&result.error, result.dimensions) {
                (Some(error), _) => format!("{}: failed ({})", result.process, error),
                (None, Some((w, h))) => format!(
                    "{}: stored {}x{}, {}",
                    result.process,
                    w,
                    h,
                    format_size(result.bytes)
                ),
                (None, None) => format!("{}: stored {}", result.process, format_size(result.bytes)),
            };
            vec![line]
        }
    }
}

/// Format what `inspect` learned about a file without storing anything.
pub fn format_inspect(
    filename: &str,
    hash: &str,
    dimensions: (u32, u32),
    keys: &[(String, String)],
) -> Vec<String> {
    let mut lines = vec![
        filename.to_string(),
        format!("{}Hash: {}", indent(1), hash),
        format!("{}Size: {}x{}", indent(1), dimensions.0, dimensions.1),
    ];
    for (variant, key) in keys {
        lines.push(format!("{}{} \u{2192} {}", indent(1), variant, key));
    }
    lines
}

pub fn print_upload_outcome(outcome: &UploadOutcome) {
    for line in format_upload_outcome(outcome) {
        println!("{}", line);
    }
}

pub fn print_upload_error(filename: &str, error: &UploadError) {
    for line in format_upload_error(filename, error) {
        eprintln!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VariantError, VariantStatus};

    fn ok(name: &str, dims: (u32, u32), bytes: u64) -> VariantResult {
        VariantResult {
            store: "filestore".into(),
            process: name.into(),
            key: format!("abc/abcdef/{name}.jpeg"),
            url: format!("/files/abc/abcdef/{name}.jpeg"),
            status: VariantStatus::Succeeded,
            dimensions: Some(dims),
            bytes,
            error: None,
        }
    }

    fn failed(name: &str, error: VariantError) -> VariantResult {
        VariantResult {
            status: VariantStatus::Failed,
            dimensions: None,
            bytes: 0,
            error: Some(error),
            ..ok(name, (0, 0), 0)
        }
    }

    #[test]
    fn size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4198), "4.1 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn upload_outcome_tree() {
        let outcome = UploadOutcome {
            filename: "photo.jpg".into(),
            hash: Some("abcdef".into()),
            files: vec![
                ok("small", (128, 128), 4198),
                failed("large", VariantError::storage("disk full")),
            ],
        };
        let lines = format_upload_outcome(&outcome);
        assert_eq!(
            lines,
            vec![
                "photo.jpg",
                "    Hash: abcdef",
                "    small \u{2192} /files/abc/abcdef/small.jpeg (128x128, 4.1 KB)",
                "    large: failed (storage error: disk full)",
            ]
        );
    }

    #[test]
    fn noop_outcome() {
        let lines = format_upload_outcome(&UploadOutcome::noop("form.jpg"));
        assert_eq!(lines, vec!["form.jpg", "    No file uploaded"]);
    }

    #[test]
    fn upload_error_lists_partial_results() {
        let error = UploadError::Variant {
            variant: "large".into(),
            source: VariantError::transform("bad huffman table"),
            results: vec![
                ok("small", (128, 128), 100),
                failed("large", VariantError::transform("bad huffman table")),
            ],
        };
        let lines = format_upload_error("photo.jpg", &error);
        assert_eq!(lines[0], "photo.jpg");
        assert_eq!(
            lines[1],
            "    Error (transform): Variant \"large\" failed: transform error: bad huffman table"
        );
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn upload_error_without_results() {
        let lines = format_upload_error("x.jpg", &UploadError::EmptyInput);
        assert_eq!(
            lines,
            vec!["x.jpg", "    Error (no input): Upload contains no data"]
        );
    }

    #[test]
    fn progress_events() {
        let dispatched = VariantEvent::Dispatched {
            index: 0,
            variant: "small".into(),
            key: "abc/abcdef/small.jpeg".into(),
        };
        assert_eq!(format_variant_event(&dispatched), vec!["small: processing"]);

        let settled = VariantEvent::Settled {
            index: 0,
            sequence: 0,
            result: ok("small", (128, 128), 2048),
        };
        assert_eq!(
            format_variant_event(&settled),
            vec!["small: stored 128x128, 2.0 KB"]
        );

        let failed = VariantEvent::Settled {
            index: 1,
            sequence: 1,
            result: failed("large", VariantError::storage("quota")),
        };
        assert_eq!(
            format_variant_event(&failed),
            vec!["large: failed (storage error: quota)"]
        );
    }

    #[test]
    fn inspect_lines() {
        let keys = vec![("small".to_string(), "abc/abcdef/small.jpeg".to_string())];
        let lines = format_inspect("a.jpg", "abcdef", (640, 480), &keys);
        assert_eq!(
            lines,
            vec![
                "a.jpg",
                "    Hash: abcdef",
                "    Size: 640x480",
                "    small \u{2192} abc/abcdef/small.jpeg",
            ]
        );
    }
}
