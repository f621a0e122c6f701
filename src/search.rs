//! Client-side search index.
//!
//! Every rendered page contributes one record to a lunr.js index embedded in
//! `search.html` as a script:
//!
//! ```text
//! const PAGES = {"guide/intro.html": {"title": "Intro", "content": "First words...", "url": "guide/intro.html"}};
//! ```
//!
//! The record id is the page URL, unique per build. Content is the
//! page body with tags stripped, cut to [`EXCERPT_LENGTH`] characters.

use crate::page::Page;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Maximum length of a record's content, ellipsis included.
pub const EXCERPT_LENGTH: usize = 140;
const ELLIPSIS: &str = "...";

/// URL of the generated search page, relative to the build directory.
pub const SEARCH_PAGE: &str = "search.html";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("tag pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRecord {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
}

impl SearchRecord {
    /// Record for `page`, given its rendered body HTML.
    pub fn new(page: &Page, body_html: &str) -> Self {
        let url = page.url().to_string();
        Self {
            id: url.clone(),
            title: page.title.clone(),
            content: excerpt(&strip_html(body_html)),
            url,
        }
    }
}

/// Plain text of an HTML fragment, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Cut `text` to at most [`EXCERPT_LENGTH`] characters, ending in `...`
/// when shortened.
pub fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LENGTH {
        return text.to_string();
    }
    let keep = EXCERPT_LENGTH - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Records collected during a build, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    records: Vec<SearchRecord>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: SearchRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SearchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The index as a JavaScript statement defining `PAGES`, safe to embed
    /// inside a `<script>` element.
    pub fn to_script(&self) -> String {
        let pages: serde_json::Map<String, serde_json::Value> = self
            .records
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    serde_json::json!({"title": r.title, "content": r.content, "url": r.url}),
                )
            })
            .collect();
        let json = serde_json::Value::Object(pages).to_string();
        format!("const PAGES = {};", json.replace("</", "<\\/"))
    }
}
