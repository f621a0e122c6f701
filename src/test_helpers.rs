//! Shared test utilities for the quire test suite.
//!
//! [`ProjectFixture`] builds a throwaway project directory file by file and
//! loads it. The loaded project keeps the directory alive, so paths stay valid
//! for as long as the test holds on to it.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let project = ProjectFixture::new()
//!     .menu("menu.yml", "- {title: Home, link: index.html, weight: 0}\n")
//!     .page("index.md", "---\ntitle: Welcome\n---\nHello")
//!     .load();
//!
//! let page = find_page(&project, "index.html");
//! assert_eq!(page.title, "Welcome");
//! ```

use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use crate::page::Page;
use crate::project::{LoadError, Project};

// =========================================================================
// Fixture setup
// =========================================================================

/// Skeleton of the fixture theme: just enough to see every render variable.
pub const FIXTURE_SKELETON: &str = "<!DOCTYPE html>
<html lang=\"{{ page.language }}\">
<head>
    <title>{{ page.title }}</title>
</head>
<body>
    <nav>{{ menu }}</nav>
    <main>{{ page.content }}</main>
</body>
</html>
";

pub struct ProjectFixture {
    dir: Arc<TempDir>,
}

impl ProjectFixture {
    /// A project with a `project.yml` naming it "Test Docs" and a minimal theme.
    pub fn new() -> Self {
        let fixture = Self {
            dir: Arc::new(TempDir::new().unwrap()),
        };
        fixture
            .file("project.yml", "name: Test Docs\n")
            .file("theme/page.html", FIXTURE_SKELETON)
            .file("theme/assets/css/style.css", "body {\n    margin: 0;\n}\n")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative` under the project root.
    pub fn file(self, relative: &str, contents: &str) -> Self {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    /// Write a content page, `relative` to `content/`.
    pub fn page(self, relative: &str, contents: &str) -> Self {
        self.file(&format!("content/{relative}"), contents)
    }

    /// Write a menu file at the project root.
    pub fn menu(self, name: &str, contents: &str) -> Self {
        self.file(name, contents)
    }

    /// Replace `project.yml`.
    pub fn config(self, contents: &str) -> Self {
        self.file("project.yml", contents)
    }

    pub fn without_theme(self) -> Self {
        fs::remove_dir_all(self.root().join("theme")).unwrap();
        self
    }

    pub fn try_load(&self) -> Result<Project, LoadError> {
        Project::load(self.root())
    }

    /// Load the project, panicking on a load error.
    pub fn load(&self) -> LoadedProject {
        let project = self
            .try_load()
            .unwrap_or_else(|e| panic!("fixture project failed to load: {e}"));
        LoadedProject {
            project,
            _dir: Arc::clone(&self.dir),
        }
    }
}

/// A loaded fixture project. Dereferences to [`Project`].
pub struct LoadedProject {
    project: Project,
    _dir: Arc<TempDir>,
}

impl Deref for LoadedProject {
    type Target = Project;

    fn deref(&self) -> &Project {
        &self.project
    }
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a page by output URL, panicking with the available URLs on a miss.
pub fn find_page<'a>(project: &'a Project, url: &str) -> &'a Page {
    project.page_by_url(url).unwrap_or_else(|| {
        let urls: Vec<&str> = project.pages.iter().map(|p| p.url()).collect();
        panic!("no page with URL {url:?}; pages: {urls:?}")
    })
}

/// Read a file of the build output, panicking with a clear message on a miss.
pub fn read_output(project: &Project, relative: &str) -> String {
    let path = project.build_dir().join(relative);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read build output {}: {e}", path.display()))
}
