//! Project loading.
//!
//! [`Project::load`] turns a project directory into an in-memory model. It
//! either succeeds completely or fails with a [`LoadError`]. The only writes
//! are the bundled default theme when a project has none, and an empty
//! `content/` directory when it is missing.
//!
//! ## Load order
//!
//! ```text
//! 1. Directory checks      root exists and is a directory
//! 2. project.yml           stock defaults + user overlay
//! 3. theme/                materialized from the bundled theme if missing
//! 4. menu*.yml             one menu per language, file-name order
//! 5. content/**/*.md       pages, path order; first page wins an output path
//!                          (content/ is created when missing)
//! 6. Ordering              alphabetical previous/next, if enabled
//! 7. Menu coverage         every page language gets a menu
//! ```
//!
//! Files are visited in sorted order, so the same directory always loads to
//! the same project.

use crate::config::{self, ProjectConfig};
use crate::menu::{self, Menu};
use crate::page::{MARKDOWN_EXTENSION, Page};
use crate::resources;
use crate::template::Template;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const CONTENT_DIR: &str = "content";
pub const THEME_DIR: &str = "theme";
pub const BUILD_DIR: &str = "build";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("project directory not found: {0}")]
    MissingDirectory(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("no project configuration at {0}; run `quire new` to create a project")]
    MissingProjectConfig(PathBuf),
    #[error("malformed YAML in {path}: {reason}")]
    MalformedYaml { path: PathBuf, reason: String },
    #[error("malformed menu entry in {path}: {reason}")]
    MalformedMenuEntry { path: PathBuf, reason: String },
    #[error("invalid project configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
    #[error("invalid template {path}: {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn malformed_yaml(path: &Path, error: serde_yaml::Error) -> Self {
        Self::MalformedYaml {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }
}

/// A page that lost its output path to an earlier page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConflict {
    pub source: PathBuf,
    pub winner: PathBuf,
    pub url: String,
}

/// A loaded documentation project.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    pub config: ProjectConfig,
    pub template: Template,
    pub menus: BTreeMap<String, Menu>,
    pub pages: Vec<Page>,
    pub conflicts: Vec<PageConflict>,
}

impl Project {
    pub fn load(root: &Path) -> Result<Self, LoadError> {
        if !root.exists() {
            return Err(LoadError::MissingDirectory(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(LoadError::NotADirectory(root.to_path_buf()));
        }

        let config = config::load_config(root)?;

        let theme_dir = root.join(THEME_DIR);
        if !theme_dir.exists() {
            info!(path = %theme_dir.display(), "no theme found, writing the default theme");
            resources::materialize_theme(&theme_dir)?;
        }
        let template = Template::load(&theme_dir)?;

        let menus = load_menus(root, &config.default_language)?;
        let content_dir = root.join(CONTENT_DIR);
        fs::create_dir_all(&content_dir)?;
        let (mut pages, conflicts) = load_pages(&content_dir, &config.default_language)?;

        if config.default_order_alphabetical {
            link_alphabetically(&mut pages);
        }

        let mut project = Self {
            root: root.to_path_buf(),
            config,
            template,
            menus,
            pages,
            conflicts,
        };
        project.ensure_menus();
        debug!(
            pages = project.pages.len(),
            menus = project.menus.len(),
            "project loaded"
        );
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join(CONTENT_DIR)
    }

    pub fn theme_dir(&self) -> PathBuf {
        self.root.join(THEME_DIR)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_DIR)
    }

    pub fn default_language(&self) -> &str {
        &self.config.default_language
    }

    /// Languages with at least one page, default language first.
    pub fn languages(&self) -> Vec<String> {
        let mut others: BTreeSet<&str> = self.pages.iter().map(|p| p.language.as_str()).collect();
        let mut languages = vec![self.config.default_language.clone()];
        others.remove(self.config.default_language.as_str());
        languages.extend(others.into_iter().map(str::to_string));
        languages
    }

    /// The menu for `language`, falling back to the default language's menu.
    pub fn menu_for(&self, language: &str) -> Option<&Menu> {
        self.menus
            .get(language)
            .or_else(|| self.menus.get(&self.config.default_language))
    }

    pub fn page_by_url(&self, url: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.url() == url)
    }

    /// Give every language in use a menu.
    ///
    /// - No menu at all: a placeholder menu for the default language.
    /// - No default-language menu: a copy of the first menu's entries.
    /// - A page language without a menu: a copy of the default menu.
    fn ensure_menus(&mut self) {
        let default = self.config.default_language.clone();
        if self.menus.is_empty() {
            warn!("no menu file found, using a placeholder menu");
            self.menus.insert(default.clone(), Menu::placeholder(default.clone()));
        }
        if !self.menus.contains_key(&default) {
            if let Some(first) = self.menus.values().next() {
                let copy = first.copy_for(default.clone());
                self.menus.insert(default.clone(), copy);
            }
        }
        let missing: Vec<String> = self
            .pages
            .iter()
            .map(|p| p.language.clone())
            .filter(|l| !self.menus.contains_key(l))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for language in missing {
            if let Some(copy) = self.menus.get(&default).map(|m| m.copy_for(language.clone())) {
                self.menus.insert(language, copy);
            }
        }
    }
}

/// Read `menu*.yml` files from the project root, in file-name order. A later
/// file declaring an already-seen language is ignored.
fn load_menus(root: &Path, default_language: &str) -> Result<BTreeMap<String, Menu>, LoadError> {
    let mut files: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(menu::is_menu_file)
        })
        .collect();
    files.sort();

    let mut menus = BTreeMap::new();
    for file in files {
        let menu = Menu::load(&file, default_language)?;
        if menus.contains_key(&menu.language) {
            warn!(
                path = %file.display(),
                language = %menu.language,
                "a menu for this language was already loaded, ignoring"
            );
            continue;
        }
        menus.insert(menu.language.clone(), menu);
    }
    Ok(menus)
}

/// Read every Markdown page under `content_dir`. A page whose output path was
/// already claimed is dropped and reported as a conflict.
fn load_pages(
    content_dir: &Path,
    default_language: &str,
) -> Result<(Vec<Page>, Vec<PageConflict>), LoadError> {
    let mut pages: Vec<Page> = Vec::new();
    let mut conflicts = Vec::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| LoadError::Io(e.into()))?;
        let path = entry.path();
        let is_markdown = entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
        if !is_markdown {
            continue;
        }

        let page = Page::load(content_dir, path, default_language)?;
        if !claimed.insert(page.url().to_string()) {
            let winner = pages
                .iter()
                .find(|p| p.url() == page.url())
                .map(|p| p.source.clone())
                .unwrap_or_default();
            warn!(
                source = %page.source.display(),
                winner = %winner.display(),
                url = page.url(),
                "output path already taken, skipping page"
            );
            conflicts.push(PageConflict {
                source: page.source.clone(),
                winner,
                url: page.url().to_string(),
            });
            continue;
        }
        pages.push(page);
    }
    Ok((pages, conflicts))
}

/// Link pages of the same language in title order, leaving explicit
/// `previous`/`next` headers alone.
pub fn link_alphabetically(pages: &mut [Page]) {
    pages.sort_by(|a, b| {
        (a.language.as_str(), a.title.to_lowercase(), a.url())
            .cmp(&(b.language.as_str(), b.title.to_lowercase(), b.url()))
    });
    for i in 0..pages.len() {
        if i > 0 && pages[i - 1].language == pages[i].language && pages[i].previous.is_none() {
            pages[i].previous = Some(pages[i - 1].url().to_string());
        }
        if i + 1 < pages.len()
            && pages[i + 1].language == pages[i].language
            && pages[i].next.is_none()
        {
            pages[i].next = Some(pages[i + 1].url().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    // =========================================================================
    // Directory checks
    // =========================================================================

    #[test]
    fn missing_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Project::load(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoadError::MissingDirectory(_)));
    }

    #[test]
    fn not_a_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(Project::load(&file).unwrap_err(), LoadError::NotADirectory(_)));
    }

    #[test]
    fn missing_project_config() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            Project::load(tmp.path()).unwrap_err(),
            LoadError::MissingProjectConfig(_)
        ));
    }

    // =========================================================================
    // Pages and menus
    // =========================================================================

    #[test]
    fn loads_pages_in_path_order() {
        let fixture = ProjectFixture::new()
            .page("b.md", "---\ntitle: B\n---\nb")
            .page("a.md", "a")
            .page("guide/c.md", "c");
        let project = fixture.load();
        let urls: Vec<&str> = project.pages.iter().map(|p| p.url()).collect();
        assert_eq!(urls, vec!["a.html", "b.html", "guide/c.html"]);
    }

    #[test]
    fn non_markdown_files_are_not_pages() {
        let project = ProjectFixture::new()
            .page("index.md", "hi")
            .file("content/logo.png", "png")
            .file("content/raw.html", "<p>raw</p>")
            .load();
        assert_eq!(project.pages.len(), 1);
    }

    #[test]
    fn duplicate_output_path_keeps_first_page() {
        let project = ProjectFixture::new()
            .page("fr/intro.md", "---\nlanguage: fr\n---\nA")
            .page("intro.md", "---\nlanguage: fr\n---\nB")
            .load();
        assert_eq!(project.pages.len(), 1);
        assert!(project.pages[0].source.ends_with("fr/intro.md"));
        assert_eq!(project.conflicts.len(), 1);
        assert_eq!(project.conflicts[0].url, "fr/intro.html");
        assert!(project.conflicts[0].source.ends_with("content/intro.md"));
    }

    #[test]
    fn malformed_page_header_fails_load() {
        let err = ProjectFixture::new()
            .page("bad.md", "---\ntitle: [oops\n---\n")
            .try_load()
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { .. }));
    }

    #[test]
    fn malformed_menu_fails_load() {
        let err = ProjectFixture::new()
            .menu("menu.yml", "- {title: A}\n")
            .try_load()
            .unwrap_err();
        assert!(matches!(err, LoadError::MalformedMenuEntry { .. }));
    }

    #[test]
    fn menus_are_keyed_by_language() {
        let project = ProjectFixture::new()
            .menu("menu.yml", "- {title: Home, link: index.html, weight: 0}\n")
            .menu("menu_fr.yml", "---\nlanguage: fr\n---\n- {title: Accueil, link: fr/index.html, weight: 0}\n")
            .load();
        assert_eq!(project.menus.keys().collect::<Vec<_>>(), vec!["en", "fr"]);
        assert_eq!(project.menu_for("fr").unwrap().entries()[0].title, "Accueil");
        assert_eq!(project.menu_for("de").unwrap().language, "en");
    }

    #[test]
    fn placeholder_menu_when_none_exist() {
        let project = ProjectFixture::new().page("index.md", "x").load();
        let menu = project.menu_for("en").unwrap();
        assert_eq!(menu.entries().len(), 1);
        assert_eq!(menu.entries()[0].link, "#");
    }

    #[test]
    fn default_menu_copied_from_first_menu() {
        let project = ProjectFixture::new()
            .menu("menu_fr.yml", "---\nlanguage: fr\n---\n- {title: Accueil, link: fr/index.html, weight: 0}\n")
            .load();
        let default = project.menus.get("en").unwrap();
        assert_eq!(default.entries()[0].title, "Accueil");
        assert_eq!(default.language, "en");
    }

    #[test]
    fn every_page_language_gets_a_menu() {
        let project = ProjectFixture::new()
            .menu("menu.yml", "- {title: Home, link: index.html, weight: 0}\n")
            .page("de/start.md", "---\nlanguage: de\n---\nHallo")
            .load();
        assert_eq!(project.menus.get("de").unwrap().entries()[0].title, "Home");
    }

    #[test]
    fn missing_theme_is_materialized() {
        let fixture = ProjectFixture::new().without_theme();
        let project = fixture.load();
        assert!(project.theme_dir().join("page.html").is_file());
        assert!(project.theme_dir().join("assets/css/page.css").is_file());
    }

    #[test]
    fn missing_content_dir_is_created() {
        let project = ProjectFixture::new().load();
        assert!(project.pages.is_empty());
        assert!(project.content_dir().is_dir());
    }

    #[test]
    fn languages_list_default_first() {
        let project = ProjectFixture::new()
            .page("z.md", "---\nlanguage: zh\n---\n")
            .page("fr/a.md", "---\nlanguage: fr\n---\n")
            .load();
        assert_eq!(project.languages(), vec!["en", "fr", "zh"]);
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn alphabetical_linking_within_language() {
        let project = ProjectFixture::new()
            .config("default_order_alphabetical: true\n")
            .page("c.md", "---\ntitle: Charlie\n---\n")
            .page("a.md", "---\ntitle: Alpha\n---\n")
            .page("b.md", "---\ntitle: Bravo\nprevious: custom.html\n---\n")
            .page("fr/z.md", "---\nlanguage: fr\ntitle: Zulu\n---\n")
            .load();

        let alpha = find_page(&project, "a.html");
        assert_eq!(alpha.previous, None);
        assert_eq!(alpha.next.as_deref(), Some("b.html"));

        let bravo = find_page(&project, "b.html");
        assert_eq!(bravo.previous.as_deref(), Some("custom.html"));
        assert_eq!(bravo.next.as_deref(), Some("c.html"));

        let charlie = find_page(&project, "c.html");
        assert_eq!(charlie.next, None);

        let zulu = find_page(&project, "fr/z.html");
        assert_eq!(zulu.previous, None);
        assert_eq!(zulu.next, None);
    }

    #[test]
    fn no_linking_by_default() {
        let project = ProjectFixture::new().page("a.md", "").page("b.md", "").load();
        assert!(project.pages.iter().all(|p| p.previous.is_none() && p.next.is_none()));
    }

    #[test]
    fn load_is_deterministic() {
        let fixture = ProjectFixture::new()
            .page("b.md", "b")
            .page("a/x.md", "x")
            .page("fr/y.md", "---\nlanguage: fr\n---\n");
        let first: Vec<String> = fixture.load().pages.iter().map(|p| p.url().to_string()).collect();
        let second: Vec<String> = fixture.load().pages.iter().map(|p| p.url().to_string()).collect();
        assert_eq!(first, second);
    }
}
