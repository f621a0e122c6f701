//! Project file watching.
//!
//! The whole project directory is watched recursively, but only changes under
//! a fixed set of top-level names trigger a rebuild:
//!
//! | Name | Why |
//! |------|-----|
//! | `content/` | Pages and copied files |
//! | `theme/` | Skeleton and assets |
//! | `menu*.yml` | Menus |
//! | `project.yml` | Settings |
//!
//! Everything else (notably `build/`, which every rebuild rewrites) is
//! ignored.
//!
//! ## Reload or render-only
//!
//! A rebuild normally reloads the whole project from disk. With render-only
//! edits enabled, a batch of changes that only modifies files the loaded
//! project already knows about is rebuilt from the loaded project instead.
//! Anything that changes what [`Project::load`] would produce forces a
//! reload: settings, menus, the skeleton, Markdown files being created or
//! removed, and edits to a page's header.

use crate::config::PROJECT_FILE;
use crate::frontmatter;
use crate::menu::MENU_PREFIX;
use crate::page::{MARKDOWN_EXTENSION, Page};
use crate::project::{CONTENT_DIR, Project, THEME_DIR};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Whether a change to `path` can affect the build of the project at `root`.
pub fn is_watched(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let Some(Component::Normal(first)) = relative.components().next() else {
        return false;
    };
    let Some(first) = first.to_str() else {
        return false;
    };
    first == CONTENT_DIR
        || first == THEME_DIR
        || first == PROJECT_FILE
        || first.starts_with(MENU_PREFIX)
}

/// Files that are read while loading a project: a change to one always
/// requires a reload.
pub fn should_reload_project(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "yml" | "yaml" | "html"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildKind {
    /// Load the project again, then build.
    Reload,
    /// Build the already-loaded project.
    RenderOnly,
}

/// How to rebuild after `changes`.
#[derive(Debug, Clone, Copy)]
pub struct RebuildPolicy {
    pub render_only_edits: bool,
}

impl RebuildPolicy {
    pub fn decide(&self, root: &Path, project: Option<&Project>, changes: &[PathBuf]) -> RebuildKind {
        if !self.render_only_edits {
            return RebuildKind::Reload;
        }
        let Some(project) = project else {
            return RebuildKind::Reload;
        };
        let known: HashMap<&Path, &Page> = project
            .pages
            .iter()
            .map(|p| (p.source.as_path(), p))
            .collect();
        let content_dir = root.join(CONTENT_DIR);
        let theme_dir = root.join(THEME_DIR);

        let safe = changes.iter().all(|path| {
            if path.starts_with(&content_dir) {
                let is_markdown = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
                !is_markdown
                    || known
                        .get(path.as_path())
                        .is_some_and(|page| header_unchanged(page, path))
            } else if path.starts_with(&theme_dir) {
                !should_reload_project(path)
            } else {
                false
            }
        });
        if safe {
            RebuildKind::RenderOnly
        } else {
            RebuildKind::Reload
        }
    }
}

/// Whether `path` still exists and still has the header `page` was loaded
/// with. Title, language and output path all come from the header.
fn header_unchanged(page: &Page, path: &Path) -> bool {
    let Ok(text) = fs::read_to_string(path) else {
        return false;
    };
    frontmatter::parse(&text, path).is_ok_and(|document| document.header == page.header)
}

/// A running recursive watch on a project directory.
pub struct Watcher {
    debouncer: Debouncer<RecommendedWatcher>,
    root: PathBuf,
}

impl Watcher {
    /// Watch `root`, calling `on_change` with each debounced batch of
    /// relevant paths (sorted, deduplicated, never empty).
    pub fn start<F>(root: &Path, interval: Duration, on_change: F) -> Result<Self, notify::Error>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let filter_root = root.to_path_buf();
        let mut debouncer = new_debouncer(interval, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths: BTreeSet<PathBuf> = events
                        .into_iter()
                        .map(|event| event.path)
                        .filter(|path| is_watched(&filter_root, path))
                        .collect();
                    if paths.is_empty() {
                        return;
                    }
                    debug!(count = paths.len(), "project files changed");
                    on_change(paths.into_iter().collect());
                }
                Err(e) => warn!(error = %e, "file watcher error"),
            }
        })?;
        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
        Ok(Self {
            debouncer,
            root: root.to_path_buf(),
        })
    }

    /// Stop watching. The watcher is released even if unwatching fails.
    pub fn stop(mut self) -> Result<(), notify::Error> {
        self.debouncer.watcher().unwatch(&self.root)
    }
}
