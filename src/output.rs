//! CLI output formatting for intake notifications, reports, and the image list.
//!
//! # Output Format
//!
//! ## Events
//!
//! ```text
//! Image limit reached: kept 8, dropped 2 (max 8)
//! Address: Seoul, KR
//! Added dawn.jpg
//! Compression failed: broken.jpg
//!     decode failed for broken.jpg: ...
//! ```
//!
//! ## Report
//!
//! ```text
//! Selected 10 files
//! Appended 7 images
//!     dawn.jpg
//!     ...
//! Dropped (limit 8)
//!     09.jpg
//! Failed
//!     broken.jpg: decode failed for broken.jpg: ...
//! Address: Seoul, KR
//! ```
//!
//! ## List
//!
//! ```text
//! Images (3 of 8)
//! 001 dawn.jpg (cover)
//!     image/jpeg, 182.4 KB
//! 002 harbour.jpg
//!     image/jpeg, 96.0 KB
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::intake::{IntakeEvent, IntakeReport};
use crate::list::ImageList;
use crate::location::AddressOutcome;
use crate::types::MAX_IMAGES;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

fn address_line(outcome: &AddressOutcome) -> String {
    match outcome {
        AddressOutcome::Resolved(address) => format!("Address: {}", address),
        AddressOutcome::Suggested { current, found } => {
            format!("Address kept: {} (GPS suggests {})", current, found)
        }
        AddressOutcome::Skipped => "Address already set, GPS not read".to_string(),
        AddressOutcome::NoLocation => "Address: no GPS location found".to_string(),
    }
}

// ============================================================================
// Events
// ============================================================================

/// Format one intake notification as display lines.
pub fn format_intake_event(event: &IntakeEvent) -> Vec<String> {
    match event {
        IntakeEvent::CapacityExceeded {
            accepted,
            dropped,
            max,
        } => vec![format!(
            "Image limit reached: kept {}, dropped {} (max {})",
            accepted, dropped, max
        )],
        IntakeEvent::UnsupportedFile { name } => {
            vec![format!("Skipped {}: unsupported file type", name)]
        }
        IntakeEvent::AddressResolved { address } => {
            vec![address_line(&AddressOutcome::Resolved(address.clone()))]
        }
        IntakeEvent::AddressSuggested { current, found } => {
            vec![address_line(&AddressOutcome::Suggested {
                current: current.clone(),
                found: found.clone(),
            })]
        }
        IntakeEvent::CompressionFailed { name, reason, .. } => vec![
            format!("Compression failed: {}", name),
            format!("{}{}", indent(1), reason),
        ],
        IntakeEvent::EntryAppended { name, .. } => vec![format!("Added {}", name)],
        IntakeEvent::RetrievalFailed { path, reason } => vec![
            format!("Download failed: {}", path),
            format!("{}{}", indent(1), reason),
        ],
    }
}

pub fn print_intake_event(event: &IntakeEvent) {
    for line in format_intake_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Report
// ============================================================================

/// Summarize one selection. Empty sections are omitted.
pub fn format_report(report: &IntakeReport) -> Vec<String> {
    let mut lines = vec![format!("Selected {}", plural(report.selected, "file", "files"))];

    lines.push(format!(
        "Appended {}",
        plural(report.appended.len(), "image", "images")
    ));
    for entry in &report.appended {
        lines.push(format!("{}{}", indent(1), entry.name));
    }

    if !report.dropped.is_empty() {
        lines.push(format!("Dropped (limit {})", MAX_IMAGES));
        for name in &report.dropped {
            lines.push(format!("{}{}", indent(1), name));
        }
    }

    if !report.unsupported.is_empty() {
        lines.push("Unsupported".to_string());
        for name in &report.unsupported {
            lines.push(format!("{}{}", indent(1), name));
        }
    }

    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for failure in &report.failed {
            lines.push(format!("{}{}: {}", indent(1), failure.name, failure.reason));
        }
    }

    if let Some(outcome) = &report.address {
        lines.push(address_line(outcome));
    }
    lines
}

pub fn print_report(report: &IntakeReport) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// List inventory
// ============================================================================

/// Inventory of the list in order. Position 001 is the cover image.
pub fn format_list(list: &ImageList) -> Vec<String> {
    let mut lines = vec![format!("Images ({} of {})", list.len(), MAX_IMAGES)];
    for (i, entry) in list.entries().iter().enumerate() {
        let payload = entry.payload();
        let cover = if i == 0 { " (cover)" } else { "" };
        lines.push(format!("{} {}{}", format_index(i + 1), payload.name(), cover));
        lines.push(format!(
            "{}{}, {}",
            indent(1),
            payload.mime(),
            format_bytes(payload.len())
        ));
    }
    lines
}

pub fn print_list(list: &ImageList) {
    for line in format_list(list) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
