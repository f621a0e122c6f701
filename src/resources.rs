//! Files bundled into the binary.
//!
//! The default theme, the search and redirect pages and the starter project
//! are compiled in with `include_str!`, so a bare `quire` binary can create,
//! build and serve a project without anything else installed.

use crate::config::PROJECT_FILE;
use crate::project::THEME_DIR;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// A bundled file and where it goes, relative to the materialization root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub path: &'static str,
    pub contents: &'static str,
}

macro_rules! resource {
    ($path:literal) => {
        Resource {
            path: $path,
            contents: include_str!(concat!("../resources/theme/", $path)),
        }
    };
}

/// The default theme, materialized into `theme/` when a project has none.
pub const DEFAULT_THEME: &[Resource] = &[
    resource!("page.html"),
    resource!("assets/css/page.css"),
    resource!("assets/js/page.js"),
];

/// The starter project written by `quire new`. The theme is added under `theme/`.
pub const NEW_PROJECT: &[Resource] = &[
    Resource {
        path: "project.yml",
        contents: include_str!("../resources/new_project/project.yml"),
    },
    Resource {
        path: "menu.yml",
        contents: include_str!("../resources/new_project/menu.yml"),
    },
    Resource {
        path: "content/index.md",
        contents: include_str!("../resources/new_project/content/index.md"),
    },
    Resource {
        path: "content/writing-pages.md",
        contents: include_str!("../resources/new_project/content/writing-pages.md"),
    },
];

/// Source of the generated search page. Rendered like a content page, with
/// the index in `lunr_data`.
pub const SEARCH_PAGE: &str = include_str!("../resources/search.html");

/// Template of the language redirect written to `build/index.html`.
pub const REDIRECT_PAGE: &str = include_str!("../resources/redirect.html");

/// Write `resources` under `dir`. Files that already exist are left alone.
/// Returns the paths written.
pub fn materialize(resources: &[Resource], dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for resource in resources {
        let path = dir.join(resource.path);
        if path.exists() {
            debug!(path = %path.display(), "keeping existing file");
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, resource.contents)?;
        written.push(path);
    }
    Ok(written)
}

/// Write the default theme into `dir`.
pub fn materialize_theme(dir: &Path) -> io::Result<Vec<PathBuf>> {
    materialize(DEFAULT_THEME, dir)
}

#[derive(Error, Debug)]
pub enum NewProjectError {
    #[error("{} already contains a project", .0.display())]
    AlreadyExists(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Create a starter project in `dir`, creating the directory if needed.
pub fn create_project(dir: &Path) -> Result<Vec<PathBuf>, NewProjectError> {
    if dir.join(PROJECT_FILE).exists() {
        return Err(NewProjectError::AlreadyExists(dir.to_path_buf()));
    }
    fs::create_dir_all(dir)?;
    let mut written = materialize(NEW_PROJECT, dir)?;
    written.extend(materialize_theme(&dir.join(THEME_DIR))?);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use tempfile::TempDir;

    #[test]
    fn theme_materializes_every_file() {
        let tmp = TempDir::new().unwrap();
        let written = materialize_theme(tmp.path()).unwrap();
        assert_eq!(written.len(), DEFAULT_THEME.len());
        assert!(tmp.path().join("assets/js/page.js").is_file());
    }

    #[test]
    fn materialize_keeps_existing_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("page.html"), "mine").unwrap();
        let written = materialize_theme(tmp.path()).unwrap();
        assert_eq!(written.len(), DEFAULT_THEME.len() - 1);
        assert_eq!(fs::read_to_string(tmp.path().join("page.html")).unwrap(), "mine");
    }

    #[test]
    fn new_project_loads() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");
        create_project(&dir).unwrap();
        let project = Project::load(&dir).unwrap();
        assert_eq!(project.config.name, "My Documentation");
        assert!(project.page_by_url("index.html").is_some());
        assert!(project.page_by_url("writing-pages.html").is_some());
        assert_eq!(project.menus["en"].entries()[0].title, "Home");
    }

    #[test]
    fn new_project_refuses_existing_project() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PROJECT_FILE), "name: Mine\n").unwrap();
        let err = create_project(tmp.path()).unwrap_err();
        assert!(matches!(err, NewProjectError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(tmp.path().join(PROJECT_FILE)).unwrap(), "name: Mine\n");
    }

    #[test]
    fn bundled_pages_have_front_matter() {
        assert!(SEARCH_PAGE.starts_with("---\n"));
        assert!(SEARCH_PAGE.contains("{{ lunr_data }}"));
        assert!(REDIRECT_PAGE.contains("redirection_url"));
    }
}
