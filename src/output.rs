//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! 001 uploads/dawn.jpg → uploads/dawn.webp
//!     400x500 webp, 4 operations
//! 002 uploads/broken.jpg
//!     Error (decode): failed to decode uploads/broken.jpg: ...
//!
//! Processed 1 file, 1 failed
//! ```
//!
//! ## Check
//!
//! ```text
//! Recipe (2 operations)
//! 001 auto_orient
//! 002 resize_to_fill(400x500, North)
//!
//! Encoding
//!     quality: 90
//!     avif speed: 6
//!     resize filter: lanczos3
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::PipelineConfig;
use crate::pipeline::ProcessingError;
use crate::writer::Flushed;
use std::path::{Path, PathBuf};

/// Outcome of running the pipeline on one file.
pub type FileOutcome = (PathBuf, Result<Option<Flushed>, ProcessingError>);

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// process
// ============================================================================

/// Format one file's outcome: a header line plus indented detail.
pub fn format_outcome(
    index: usize,
    source: &Path,
    outcome: &Result<Option<Flushed>, ProcessingError>,
) -> Vec<String> {
    match outcome {
        Ok(Some(flushed)) if flushed.path != source => vec![
            format!(
                "{} {} → {}",
                format_index(index),
                source.display(),
                flushed.path.display()
            ),
            flushed_detail(flushed),
        ],
        Ok(Some(flushed)) => vec![
            format!("{} {}", format_index(index), source.display()),
            flushed_detail(flushed),
        ],
        Ok(None) => vec![
            format!("{} {}", format_index(index), source.display()),
            format!("{}unchanged (empty recipe)", indent(1)),
        ],
        Err(err) => vec![
            format!("{} {}", format_index(index), source.display()),
            format!("{}Error ({}): {}", indent(1), err.kind(), error_cause(err)),
        ],
    }
}

fn flushed_detail(flushed: &Flushed) -> String {
    format!(
        "{}{}x{} {}, {}",
        indent(1),
        flushed.width,
        flushed.height,
        flushed.format.extensions_str().first().copied().unwrap_or("?"),
        plural(flushed.operations, "operation")
    )
}

/// The underlying cause. The wrapper itself only names the failed phase.
fn error_cause(err: &ProcessingError) -> String {
    std::error::Error::source(err)
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// Format every outcome followed by a summary line.
pub fn format_process_output(outcomes: &[FileOutcome]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, (source, outcome)) in outcomes.iter().enumerate() {
        lines.extend(format_outcome(i + 1, source, outcome));
    }

    let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
    let processed = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, Ok(Some(_))))
        .count();
    lines.push(String::new());
    if failed == 0 {
        lines.push(format!("Processed {}", plural(processed, "file")));
    } else {
        lines.push(format!(
            "Processed {}, {} failed",
            plural(processed, "file"),
            failed
        ));
    }
    lines
}

pub fn print_process_output(outcomes: &[FileOutcome]) {
    for line in format_process_output(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the configured recipe and encoder settings.
pub fn format_check_output(config: &PipelineConfig) -> Vec<String> {
    let mut lines = Vec::new();

    if config.process.is_empty() {
        lines.push("Recipe (empty: files are left untouched)".to_string());
    } else {
        lines.push(format!(
            "Recipe ({})",
            plural(config.process.len(), "operation")
        ));
        for (i, operation) in config.process.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), operation));
        }
    }

    lines.push(String::new());
    lines.push("Encoding".to_string());
    lines.push(format!("{}quality: {}", indent(1), config.encoding.quality));
    lines.push(format!("{}avif speed: {}", indent(1), config.encoding.avif_speed));
    lines.push(format!(
        "{}resize filter: {}",
        indent(1),
        config.resize.filter.as_str()
    ));
    lines
}

pub fn print_check_output(config: &PipelineConfig) {
    for line in format_check_output(config) {
        println!("{}", line);
    }
}
