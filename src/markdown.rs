//! Markdown to HTML.
//!
//! Built on `pulldown-cmark` with tables and strikethrough enabled, plus two
//! passes over the event stream:
//!
//! - **Heading anchors**: every heading gets an `id` derived from its text
//!   (`## Getting Started` → `id="getting-started"`). Repeated headings get
//!   `-1`, `-2`, ... suffixes so every anchor in a page is unique.
//! - **Autolinks**: bare `http://`, `https://` and `www.` URLs in text become
//!   links. Text already inside a link, an image or a code block is left
//!   alone.

use pulldown_cmark::{CowStr, Event, LinkType, Options, Parser, Tag, TagEnd, html};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|www\.)[^\s<>]+").expect("bare URL pattern is valid")
});

/// Characters trimmed off the end of a detected URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', '"', '\'', ')', ']', '*', '_'];

/// Converts markup to HTML.
pub trait MarkupRenderer: Send + Sync {
    fn render(&self, source: &str) -> String;
}

/// The stock Markdown renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommonMark;

impl MarkupRenderer for CommonMark {
    fn render(&self, source: &str) -> String {
        to_html(source)
    }
}

pub fn options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Render Markdown to HTML with anchors and autolinks.
pub fn to_html(markdown: &str) -> String {
    let mut events = merge_text(Parser::new_ext(markdown, options()));
    add_heading_anchors(&mut events);
    let events = autolink(events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Join adjacent text events so URLs and headings are seen whole.
fn merge_text<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut merged: Vec<Event<'a>> = Vec::new();
    for event in events {
        if let Event::Text(text) = &event {
            if let Some(Event::Text(previous)) = merged.last_mut() {
                *previous = CowStr::from(format!("{previous}{text}"));
                continue;
            }
        }
        merged.push(event);
    }
    merged
}

/// Anchor id for a heading's text.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.extend(c.to_lowercase());
        } else if (c == '-' || c.is_whitespace()) && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_slug(base: String, used: &mut HashMap<String, usize>) -> String {
    let Some(&seen) = used.get(&base) else {
        used.insert(base.clone(), 0);
        return base;
    };
    let mut suffix = seen;
    loop {
        suffix += 1;
        let candidate = format!("{base}-{suffix}");
        if !used.contains_key(&candidate) {
            used.insert(candidate.clone(), 0);
            used.insert(base, suffix);
            return candidate;
        }
    }
}

fn add_heading_anchors(events: &mut [Event<'_>]) {
    let mut used = HashMap::new();
    let mut i = 0;
    while i < events.len() {
        if matches!(events[i], Event::Start(Tag::Heading { id: None, .. })) {
            let mut text = String::new();
            let mut end = i + 1;
            while end < events.len() && !matches!(events[end], Event::End(TagEnd::Heading(_))) {
                if let Event::Text(t) | Event::Code(t) = &events[end] {
                    text.push_str(t);
                }
                end += 1;
            }
            let slug = unique_slug(slugify(&text), &mut used);
            if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
                *id = Some(CowStr::from(slug));
            }
            i = end;
        }
        i += 1;
    }
}

fn autolink(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut link_depth = 0usize;
    let mut code_depth = 0usize;

    for event in events {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. }) => link_depth += 1,
            Event::End(TagEnd::Link | TagEnd::Image) => link_depth = link_depth.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => code_depth += 1,
            Event::End(TagEnd::CodeBlock) => code_depth = code_depth.saturating_sub(1),
            Event::InlineHtml(tag) => {
                let tag = tag.to_ascii_lowercase();
                if tag.starts_with("<a ") || tag.starts_with("<a>") {
                    link_depth += 1;
                } else if tag.starts_with("</a") {
                    link_depth = link_depth.saturating_sub(1);
                }
            }
            Event::Text(text) if link_depth == 0 && code_depth == 0 => {
                if BARE_URL.is_match(text) {
                    link_urls(text, &mut out);
                    continue;
                }
            }
            _ => {}
        }
        out.push(event);
    }
    out
}

fn link_urls<'a>(text: &str, out: &mut Vec<Event<'a>>) {
    let mut cursor = 0;
    for found in BARE_URL.find_iter(text) {
        let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if url.len() <= "www.".len() {
            continue;
        }
        let start = found.start();
        if start > cursor {
            out.push(Event::Text(CowStr::from(text[cursor..start].to_string())));
        }
        let destination = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(destination),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        cursor = start + url.len();
    }
    if cursor < text.len() {
        out.push(Event::Text(CowStr::from(text[cursor..].to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Extensions
    // =========================================================================

    #[test]
    fn renders_tables() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn renders_strikethrough() {
        assert!(to_html("~~gone~~").contains("<del>gone</del>"));
    }

    #[test]
    fn raw_html_passes_through() {
        let html = to_html("<div class=\"note\">hi</div>\n");
        assert!(html.contains("<div class=\"note\">hi</div>"));
    }

    // =========================================================================
    // Heading anchors
    // =========================================================================

    #[test]
    fn headings_get_ids() {
        let html = to_html("# Getting Started\n\n## Step 1: Install `quire`\n");
        assert!(html.contains(r#"<h1 id="getting-started">Getting Started</h1>"#));
        assert!(html.contains(r#"<h2 id="step-1-install-quire">"#));
    }

    #[test]
    fn duplicate_headings_get_suffixes() {
        let html = to_html("## Usage\n\n## Usage\n\n## Usage\n");
        assert!(html.contains(r#"id="usage""#));
        assert!(html.contains(r#"id="usage-1""#));
        assert!(html.contains(r#"id="usage-2""#));
    }

    #[test]
    fn slugify_keeps_unicode_letters() {
        assert_eq!(slugify("Présentation générale"), "présentation-générale");
        assert_eq!(slugify("C++ & Rust!"), "c-rust");
        assert_eq!(slugify("???"), "section");
    }

    // =========================================================================
    // Autolinks
    // =========================================================================

    #[test]
    fn bare_urls_become_links() {
        let html = to_html("See https://example.com/docs for more.");
        assert_eq!(
            html,
            "<p>See <a href=\"https://example.com/docs\">https://example.com/docs</a> for more.</p>\n"
        );
    }

    #[test]
    fn www_urls_get_a_scheme() {
        let html = to_html("Visit www.example.org.");
        assert!(html.contains(r#"<a href="http://www.example.org">www.example.org</a>."#));
    }

    #[test]
    fn urls_with_underscores_stay_whole() {
        let html = to_html("Go to https://example.com/a_b_c now");
        assert!(html.contains(r#"href="https://example.com/a_b_c""#));
    }

    #[test]
    fn existing_links_are_not_relinked() {
        let html = to_html("[https://example.com](https://example.com)");
        assert_eq!(html.matches("<a ").count(), 1);
    }

    #[test]
    fn code_is_not_linked() {
        let html = to_html("`https://example.com`\n\n```\nhttps://example.com\n```\n");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn inline_html_links_are_not_relinked() {
        let html = to_html(r#"<a href="https://example.com">https://example.com</a>"#);
        assert_eq!(html.matches("<a ").count(), 1);
    }
}
