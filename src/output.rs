//! CLI output formatting for builds.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each work leads with
//! its positional index and title; its id and the fate of each media file
//! are indented context underneath. The output reads as an inventory of the
//! database while still pointing back at the files involved.
//!
//! # Output Format
//!
//! ```text
//! Building 4 works
//! 001 Lamp (a-lamp)
//!     front.png: analyzed, copied
//!     back.png: cached
//!     https://videos.example/v.mp4: online
//! 002 (b-chair): carried over
//! 003 (c-new): skipped
//! 004 (d-broken): failed: layout for language "en" references unknown block "p9"
//!
//! Built 1 work, carried over 1, skipped 1, failed 1
//! Media: 1 cached, 1 analyzed (2 total), 1 copied
//! Database: site/database.json
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::database::{BuildEvent, BuildSummary};
use crate::work::{MediaReport, MediaStatus};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Titled works show title and id, untitled ones just the id in parens.
///
/// ```text
/// 001 Lamp (a-lamp)
/// 002 (b-chair)
/// ```
fn work_line(index: usize, title: &str, id: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        format!("{} ({})", format_index(index), id)
    } else {
        format!("{} {} ({})", format_index(index), title, id)
    }
}

fn media_line(report: &MediaReport) -> String {
    let status = match &report.status {
        MediaStatus::Online => "online".to_string(),
        MediaStatus::Cached => "cached".to_string(),
        MediaStatus::Analyzed => "analyzed".to_string(),
        MediaStatus::Failed(error) => format!("failed: {}", error),
    };
    if report.copied {
        format!("{}{}: {}, copied", indent(1), report.source, status)
    } else {
        format!("{}{}: {}", indent(1), report.source, status)
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::Started { total } => vec![format!("Building {}", plural(*total, "work"))],
        BuildEvent::WorkBuilt {
            index,
            id,
            title,
            media,
        } => {
            let mut lines = vec![work_line(*index, title, id)];
            lines.extend(media.iter().map(media_line));
            lines
        }
        BuildEvent::WorkCarriedOver { index, id } => {
            vec![format!("{}: carried over", work_line(*index, "", id))]
        }
        BuildEvent::WorkSkipped { index, id } => {
            vec![format!("{}: skipped", work_line(*index, "", id))]
        }
        BuildEvent::WorkFailed { index, id, error } => {
            vec![format!("{}: failed: {}", work_line(*index, "", id), error)]
        }
    }
}

// ============================================================================
// Build summary
// ============================================================================

/// Format the closing summary of a build.
///
/// Writing to stdout (`-`) leaves out the database line, since the database
/// itself was printed.
pub fn format_build_summary(summary: &BuildSummary, output: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Built {}, carried over {}, skipped {}, failed {}",
        plural(summary.built, "work"),
        summary.carried_over,
        summary.skipped,
        summary.failed
    )];
    if summary.stats.total() > 0 || summary.stats.copies > 0 {
        lines.push(format!("Media: {}", summary.stats));
    }
    if output != Path::new(crate::database::STDOUT) {
        lines.push(format!("Database: {}", output.display()));
    }
    lines
}

/// Print to stdout, or to stderr when stdout carries the database.
pub fn print_build_summary(summary: &BuildSummary, output: &Path) {
    for line in format_build_summary(summary, output) {
        if output == Path::new(crate::database::STDOUT) {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}
