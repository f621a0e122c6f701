//! Content pages.
//!
//! A page is one `.md` (or `.html`) file under `content/`. Loading reads only
//! its header: the body is read again at render time, so a render always sees
//! the current file.
//!
//! ## Output paths
//!
//! The output path is derived from the path relative to `content/`:
//!
//! 1. A leading directory equal to the page's language is dropped.
//! 2. The language is prepended unless it is the project default.
//! 3. The extension becomes `.html`.
//!
//! ```text
//! content/intro.md           en (default)  → build/intro.html
//! content/fr/intro.md        fr            → build/fr/intro.html
//! content/fr/guide/intro.md  fr            → build/fr/guide/intro.html
//! content/fr/guide/intro.md  fr (default)  → build/guide/intro.html
//! content/guide/intro.md     fr            → build/fr/guide/intro.html
//! ```
//!
//! ## Header keys
//!
//! | Key | Effect |
//! |-----|--------|
//! | `title` | Page title; defaults to the capitalized file stem |
//! | `language` | Page language; defaults to the project's `default_language` |
//! | `previous` / `next` | Site-relative links to neighbouring pages |
//!
//! Every header key, known or not, is available to templates as
//! `page.header.<key>`.

use crate::frontmatter;
use crate::project::LoadError;
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

pub const MARKDOWN_EXTENSION: &str = "md";

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// File the page is read from.
    pub source: PathBuf,
    /// Path relative to the content directory.
    pub relative_path: PathBuf,
    pub title: String,
    pub language: String,
    /// Front-matter, in file order.
    pub header: Mapping,
    pub previous: Option<String>,
    pub next: Option<String>,
    /// Source modification time, seconds since the Unix epoch.
    pub last_modified: u64,
    url: String,
}

impl Page {
    /// Build a page from its relative path and parsed header.
    pub fn new(
        source: PathBuf,
        relative_path: PathBuf,
        header: Mapping,
        default_language: &str,
    ) -> Self {
        let title = frontmatter::header_text(&header, "title")
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_path(&relative_path));
        let language = frontmatter::header_text(&header, "language")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| default_language.to_string());
        let previous = frontmatter::header_text(&header, "previous");
        let next = frontmatter::header_text(&header, "next");
        let url = output_url(&relative_path, &language, default_language);

        Self {
            source,
            relative_path,
            title,
            language,
            header,
            previous,
            next,
            last_modified: 0,
            url,
        }
    }

    /// Read the header of `source`, a file below `content_dir`.
    pub fn load(content_dir: &Path, source: &Path, default_language: &str) -> Result<Self, LoadError> {
        let text = fs::read_to_string(source)?;
        let header = frontmatter::parse(&text, source)?.header;
        let relative = source
            .strip_prefix(content_dir)
            .unwrap_or(source)
            .to_path_buf();
        let mut page = Self::new(source.to_path_buf(), relative, header, default_language);
        page.last_modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(page)
    }

    /// Output location relative to the build directory, `/`-separated.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output_path(&self, build_dir: &Path) -> PathBuf {
        build_dir.join(&self.url)
    }

    /// Relative prefix from this page back to the site root (`""`, `"../"`, ...).
    pub fn root(&self) -> String {
        "../".repeat(self.url.matches('/').count())
    }

    /// Whether the body is Markdown (otherwise it is used as HTML).
    pub fn is_markdown(&self) -> bool {
        self.relative_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
    }

    /// Source path relative to the content directory, `/`-separated.
    pub fn path(&self) -> String {
        path_segments(&self.relative_path).join("/")
    }

    /// The page as a render-model object (`page.*` in templates).
    pub fn to_json(&self, content: Option<&str>) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("title".into(), self.title.clone().into());
        map.insert("language".into(), self.language.clone().into());
        map.insert("path".into(), self.path().into());
        map.insert("url".into(), self.url.clone().into());
        map.insert("root".into(), self.root().into());
        map.insert("previous".into(), self.previous.clone().into());
        map.insert("next".into(), self.next.clone().into());
        map.insert("last_modified".into(), self.last_modified.into());
        map.insert(
            "header".into(),
            serde_json::Value::Object(frontmatter::mapping_to_json(&self.header)),
        );
        map.insert(
            "content".into(),
            content.map(|c| c.to_string()).unwrap_or_default().into(),
        );
        map
    }
}

fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// Compute a page's output location relative to the build directory.
pub fn output_url(relative_path: &Path, language: &str, default_language: &str) -> String {
    let mut segments = path_segments(relative_path);
    let Some(file) = segments.pop() else {
        return String::new();
    };
    if segments.first().is_some_and(|first| first == language) {
        segments.remove(0);
    }
    if language != default_language {
        segments.insert(0, language.to_string());
    }
    let stem = Path::new(&file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(file);
    segments.push(format!("{stem}.html"));
    segments.join("/")
}

/// Default title: the file stem with its first letter capitalized.
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => stem,
    }
}
