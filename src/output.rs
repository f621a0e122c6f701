//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Building My Documentation
//! Cleaning build directory
//! Rendering pages
//!     index.html
//!     guide/intro.html
//!     Skipped content/broken.md: template error: ...
//! Writing search page
//! Copying content files
//!     Conflict: content/index.html → build/index.html already exists, not copied
//! Writing language redirect
//! Copying theme assets
//!
//! Built 2 pages, 1 skipped, copied 4 files, 3 assets
//! Done in 0.42 seconds
//! ```
//!
//! ## Serve
//!
//! ```text
//! Serving build/ at http://localhost:4444
//! Watching content/, theme/, menu*.yml and project.yml for changes
//! Press Enter to rebuild, or type anything and press Enter to stop
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and, where the CLI needs one, a `print_*` wrapper that writes
//! to stdout. Format functions are pure: no I/O, no side effects. Paths are
//! shown relative to the project root when they live under it.

use crate::build::BuildReport;
use crate::events::BuildEvent;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `root` when it lives under it, as-is otherwise.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// `"1 page"`, `"2 pages"`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format one build event as it arrives.
pub fn format_build_event(event: &BuildEvent, root: &Path) -> Vec<String> {
    match event {
        BuildEvent::Started { project } => vec![format!("Building {project}")],
        BuildEvent::Step(step) => vec![step.label().to_string()],
        BuildEvent::PageRendered { url } => vec![format!("{}{}", indent(1), url)],
        BuildEvent::PageSkipped { source, reason } => vec![format!(
            "{}Skipped {}: {}",
            indent(1),
            display_path(source, root),
            reason
        )],
        BuildEvent::LoadConflict {
            source,
            winner,
            url,
        } => vec![
            format!(
                "Conflict: {} → {} is already produced by another page, skipped",
                display_path(source, root),
                url
            ),
            format!("{}Kept: {}", indent(1), display_path(winner, root)),
        ],
        BuildEvent::CopyConflict {
            source,
            destination,
        } => vec![format!(
            "{}Conflict: {} → {} already exists, not copied",
            indent(1),
            display_path(source, root),
            display_path(destination, root)
        )],
        BuildEvent::Finished { .. } => Vec::new(),
        BuildEvent::Failed { message } => vec![format!("Build failed: {message}")],
    }
}

/// One-line totals for a finished build.
pub fn format_build_summary(report: &BuildReport) -> Vec<String> {
    let mut parts = vec![format!("Built {}", count(report.rendered.len(), "page", "pages"))];
    if !report.skipped.is_empty() {
        parts.push(format!("{} skipped", report.skipped.len()));
    }
    parts.push(format!("copied {}", count(report.copied, "file", "files")));
    let assets = report.assets.copied + report.assets.transformed;
    parts.push(count(assets, "asset", "assets"));
    if !report.copy_conflicts.is_empty() {
        parts.push(count(report.copy_conflicts.len(), "conflict", "conflicts"));
    }
    vec![String::new(), parts.join(", ")]
}

pub fn print_build_summary(report: &BuildReport) {
    for line in format_build_summary(report) {
        println!("{}", line);
    }
}

/// The trailer printed after every successful command.
pub fn format_done(elapsed: Duration) -> String {
    format!("Done in {:.2} seconds", elapsed.as_secs_f64())
}

pub fn print_done(elapsed: Duration) {
    println!("{}", format_done(elapsed));
}

// ============================================================================
// New project
// ============================================================================

pub fn format_new_project(dir: &Path, written: &[PathBuf]) -> Vec<String> {
    let mut lines = vec![format!("Created project in {}", dir.display())];
    for path in written {
        lines.push(format!("{}{}", indent(1), display_path(path, dir)));
    }
    lines.push(String::new());
    lines.push(format!(
        "Run `quire serve {}` to preview it",
        dir.display()
    ));
    lines
}

pub fn print_new_project(dir: &Path, written: &[PathBuf]) {
    for line in format_new_project(dir, written) {
        println!("{}", line);
    }
}

// ============================================================================
// Serve
// ============================================================================

pub fn format_serve_banner(build_dir: &Path, port: u16, manual_rebuild: bool) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Serving {} at http://localhost:{}",
            build_dir.display(),
            port
        ),
        "Watching content/, theme/, menu*.yml and project.yml for changes".to_string(),
    ];
    if manual_rebuild {
        lines.push("Press Enter to rebuild, or type anything and press Enter to stop".to_string());
    } else {
        lines.push("Press Ctrl+C to stop".to_string());
    }
    lines
}

pub fn print_serve_banner(build_dir: &Path, port: u16, manual_rebuild: bool) {
    for line in format_serve_banner(build_dir, port, manual_rebuild) {
        println!("{}", line);
    }
}
