//! Navigation menus.
//!
//! Each `menu*.yml` file at the project root describes the menu of one
//! language. The optional header names the language (the project default
//! otherwise); the body is a YAML list of entries:
//!
//! ```yaml
//! ---
//! language: fr
//! ---
//! - title: Accueil
//!   link: fr/index.html
//!   weight: 0
//! - title: Guide
//!   link: fr/guide/intro.html
//!   weight: 10
//!   children:
//!     - title: Installation
//!       link: fr/guide/install.html
//!       weight: 0
//! - title: Source
//!   link: https://example.com/repo
//!   weight: 20
//!   new_tab: true
//! ```
//!
//! `title`, `link` and `weight` are required. Entries are kept sorted by
//! ascending weight at every level; the sort is stable, so entries of equal
//! weight keep their file order. Adding or removing an entry re-sorts.

use crate::frontmatter;
use crate::project::LoadError;
use maud::{Markup, html};
use serde::Serialize;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Menu files are named `menu*.yml` at the project root.
pub const MENU_PREFIX: &str = "menu";
pub const MENU_EXTENSION: &str = "yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub title: String,
    pub link: String,
    pub weight: i64,
    pub new_tab: bool,
    children: Vec<MenuEntry>,
}

impl MenuEntry {
    pub fn new(title: impl Into<String>, link: impl Into<String>, weight: i64) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            weight,
            new_tab: false,
            children: Vec::new(),
        }
    }

    pub fn opening_in_new_tab(mut self) -> Self {
        self.new_tab = true;
        self
    }

    /// Children, sorted by weight.
    pub fn children(&self) -> &[MenuEntry] {
        &self.children
    }

    pub fn add_child(&mut self, child: MenuEntry) {
        self.children.push(child);
        sort_by_weight(&mut self.children);
    }

    /// Remove the first direct child titled `title`.
    pub fn remove_child(&mut self, title: &str) -> Option<MenuEntry> {
        let index = self.children.iter().position(|c| c.title == title)?;
        Some(self.children.remove(index))
    }

    /// This entry or the first descendant pointing at `link`.
    pub fn find_by_link(&self, link: &str) -> Option<&MenuEntry> {
        if self.link == link {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_link(link))
    }

    /// Parse one entry of a menu file. `position` is the 1-based index used
    /// in error messages.
    fn from_yaml(value: &Value, path: &Path, position: &str) -> Result<Self, LoadError> {
        let malformed = |reason: String| LoadError::MalformedMenuEntry {
            path: path.to_path_buf(),
            reason,
        };
        let Value::Mapping(map) = value else {
            return Err(malformed(format!(
                "entry {position} must be a mapping, found {}",
                frontmatter::kind_of(value)
            )));
        };

        let required = |key: &str| {
            frontmatter::header_text(map, key)
                .ok_or_else(|| malformed(format!("entry {position} is missing `{key}`")))
        };
        let title = required("title")?;
        let link = required("link")?;
        let weight = required("weight")?;
        let weight: i64 = weight.trim().parse().map_err(|_| {
            malformed(format!(
                "entry {position} has a non-integer weight `{weight}`"
            ))
        })?;

        let new_tab = match map.get("new_tab") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
            Some(other) => {
                return Err(malformed(format!(
                    "entry {position} has an invalid `new_tab` ({})",
                    frontmatter::kind_of(other)
                )));
            }
        };

        let mut children = match map.get("children") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_yaml(item, path, &format!("{position}.{}", i + 1)))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(malformed(format!(
                    "entry {position} has `children` that is {} instead of a list",
                    frontmatter::kind_of(other)
                )));
            }
        };
        sort_by_weight(&mut children);

        Ok(Self {
            title,
            link,
            weight,
            new_tab,
            children,
        })
    }
}

fn sort_by_weight(entries: &mut [MenuEntry]) {
    entries.sort_by_key(|e| e.weight);
}

/// The menu of one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub language: String,
    /// File the menu was read from; `None` for synthesized menus.
    #[serde(skip)]
    pub source: Option<PathBuf>,
    entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new(language: impl Into<String>, entries: Vec<MenuEntry>) -> Self {
        let mut entries = entries;
        sort_by_weight(&mut entries);
        Self {
            language: language.into(),
            source: None,
            entries,
        }
    }

    /// The menu used when a project has no menu file at all.
    pub fn placeholder(language: impl Into<String>) -> Self {
        Self::new(
            language,
            vec![MenuEntry::new(
                format!("No \"{MENU_PREFIX}.{MENU_EXTENSION}\" found"),
                "#",
                0,
            )],
        )
    }

    /// A copy of this menu's entries under another language.
    pub fn copy_for(&self, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source: None,
            entries: self.entries.clone(),
        }
    }

    /// Top-level entries, sorted by weight.
    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn add_entry(&mut self, entry: MenuEntry) {
        self.entries.push(entry);
        sort_by_weight(&mut self.entries);
    }

    /// Remove the first top-level entry titled `title`.
    pub fn remove_entry(&mut self, title: &str) -> Option<MenuEntry> {
        let index = self.entries.iter().position(|e| e.title == title)?;
        Some(self.entries.remove(index))
    }

    pub fn find_by_link(&self, link: &str) -> Option<&MenuEntry> {
        self.entries.iter().find_map(|e| e.find_by_link(link))
    }

    /// Parse a menu file's text. `path` attributes errors.
    pub fn parse(text: &str, path: &Path, default_language: &str) -> Result<Self, LoadError> {
        let document = frontmatter::parse(text, path)?;
        let language = frontmatter::header_text(&document.header, "language")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| default_language.to_string());

        let body: Value = if document.body.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(document.body).map_err(|e| LoadError::malformed_yaml(path, e))?
        };
        let entries = match body {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| MenuEntry::from_yaml(item, path, &(i + 1).to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(LoadError::MalformedMenuEntry {
                    path: path.to_path_buf(),
                    reason: format!(
                        "a menu must be a list of entries, found {}",
                        frontmatter::kind_of(&other)
                    ),
                });
            }
        };

        let mut menu = Self::new(language, entries);
        menu.source = Some(path.to_path_buf());
        Ok(menu)
    }

    pub fn load(path: &Path, default_language: &str) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path, default_language)
    }

    /// Render the menu as nested lists. Relative links are prefixed with
    /// `root` so they resolve from pages at any depth.
    pub fn render(&self, root: &str) -> Markup {
        html! {
            ul.menu {
                @for entry in &self.entries {
                    (render_entry(entry, root))
                }
            }
        }
    }
}

fn render_entry(entry: &MenuEntry, root: &str) -> Markup {
    html! {
        li {
            a href=(resolve_link(&entry.link, root))
                target=[entry.new_tab.then_some("_blank")]
                rel=[entry.new_tab.then_some("noopener")] {
                (entry.title)
            }
            @if !entry.children.is_empty() {
                ul {
                    @for child in &entry.children {
                        (render_entry(child, root))
                    }
                }
            }
        }
    }
}

/// Prefix a site-relative link with `root`. Absolute paths, fragments and
/// links with a scheme are returned unchanged.
pub fn resolve_link(link: &str, root: &str) -> String {
    let absolute = link.is_empty()
        || link.starts_with('/')
        || link.starts_with('#')
        || link.starts_with("mailto:")
        || link.contains("://");
    if absolute {
        link.to_string()
    } else {
        format!("{root}{link}")
    }
}

/// Whether `file_name` names a menu file (`menu.yml`, `menu_fr.yml`, ...).
pub fn is_menu_file(file_name: &str) -> bool {
    file_name.starts_with(MENU_PREFIX)
        && Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == MENU_EXTENSION)
}
