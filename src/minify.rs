//! Output minification.
//!
//! All three minifiers are conservative: they only remove what cannot change
//! how a browser reads the file.
//!
//! - **HTML** ([`HtmlCompressor`]): drops comments (conditional comments are
//!   kept), trims every line and collapses runs of spaces. Line breaks are
//!   preserved, and so is everything inside `<pre>`, `<textarea>`, `<script>`
//!   and `<style>`.
//! - **CSS** ([`minify_css`]): drops comments and whitespace around
//!   punctuation. String literals are copied untouched.
//! - **JavaScript** ([`minify_js`]): line-level only. Indentation, blank
//!   lines and whole-line `//` comments go; nothing is joined.

/// Minifies rendered HTML pages.
pub trait Minifier: Send + Sync {
    fn minify(&self, html: &str) -> String;
}

/// Tags whose content is copied verbatim.
const RAW_TAGS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// HTML minifier that keeps explicit line breaks.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlCompressor;

impl Minifier for HtmlCompressor {
    fn minify(&self, html: &str) -> String {
        // ASCII lowercasing keeps byte offsets aligned with `html`.
        let lower = html.to_ascii_lowercase();
        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        while let Some((start, end)) = next_raw_block(&lower, cursor) {
            push_compressed(&mut out, &html[cursor..start]);
            out.push_str(&html[start..end]);
            cursor = end;
        }
        push_compressed(&mut out, &html[cursor..]);
        out
    }
}

/// Find the next raw block at or after `from`: `(start of open tag, end of close tag)`.
fn next_raw_block(lower: &str, from: usize) -> Option<(usize, usize)> {
    let (start, tag) = RAW_TAGS
        .iter()
        .filter_map(|tag| find_open_tag(lower, from, tag).map(|pos| (pos, *tag)))
        .min_by_key(|(pos, _)| *pos)?;
    let close = format!("</{tag}");
    let end = match lower[start..].find(&close) {
        Some(offset) => {
            let close_start = start + offset;
            lower[close_start..]
                .find('>')
                .map(|gt| close_start + gt + 1)
                .unwrap_or(lower.len())
        }
        None => lower.len(),
    };
    Some((start, end))
}

fn find_open_tag(lower: &str, from: usize, tag: &str) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut search = from;
    while let Some(offset) = lower[search..].find(&needle) {
        let pos = search + offset;
        let after = lower[pos + needle.len()..].chars().next();
        if matches!(after, Some('>' | '/') | Some(' ' | '\t' | '\n' | '\r')) {
            return Some(pos);
        }
        search = pos + needle.len();
    }
    None
}

fn push_compressed(out: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    let text = strip_comments(segment);
    let starts_with_break = leading_whitespace(&text).contains('\n');
    let ends_with_break = trailing_whitespace(&text).contains('\n');

    let lines: Vec<String> = text
        .lines()
        .map(collapse_spaces)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        if (starts_with_break || ends_with_break) && !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        return;
    }
    if starts_with_break && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&lines.join("\n"));
    if ends_with_break {
        out.push('\n');
    }
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

fn trailing_whitespace(text: &str) -> &str {
    &text[text.trim_end().len()..]
}

/// Remove `<!-- -->` comments, keeping conditional comments.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<!--") {
        let Some(length) = rest[start..].find("-->") else {
            break;
        };
        let end = start + length + "-->".len();
        out.push_str(&rest[..start]);
        if rest[start..].starts_with("<!--[if") || rest[start..].starts_with("<!--<![endif") {
            out.push_str(&rest[start..end]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Trim a line and collapse internal runs of spaces and tabs.
fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for word in line.split([' ', '\t']).filter(|w| !w.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word.trim_end_matches('\r'));
    }
    out
}

/// Minify a stylesheet.
pub fn minify_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
                pending_space = true;
            }
            '"' | '\'' => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
                let mut escaped = false;
                for inner in chars.by_ref() {
                    out.push(inner);
                    if escaped {
                        escaped = false;
                    } else if inner == '\\' {
                        escaped = true;
                    } else if inner == c {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            // `div :first-child` selects descendants; `div:first-child` does not.
            ':' if pending_space && in_selector(&chars) => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
            }
            '{' | '}' | ';' | ':' | ',' | '>' => {
                pending_space = false;
                if c == '}' && out.ends_with(';') {
                    out.pop();
                }
                out.push(c);
                skip_whitespace(&mut chars);
            }
            c => {
                flush_space(&mut out, &mut pending_space);
                out.push(c);
            }
        }
    }
    out
}

fn flush_space(out: &mut String, pending: &mut bool) {
    if *pending {
        let glued = out.is_empty() || out.ends_with(['{', '}', ';', ':', ',', '>']);
        if !glued {
            out.push(' ');
        }
        *pending = false;
    }
}

/// Whether the text ahead reaches a `{` before the end of a declaration,
/// i.e. the current position is inside a selector or an at-rule prelude.
fn in_selector(chars: &std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    chars.clone().find(|c| matches!(c, '{' | '}' | ';')) == Some('{')
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Minify a script: strip indentation, blank lines and whole-line comments.
pub fn minify_js(js: &str) -> String {
    let mut out = String::with_capacity(js.len());
    for line in js.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // HTML
    // =========================================================================

    #[test]
    fn html_trims_lines_and_keeps_breaks() {
        let html = "<ul>\n    <li>One</li>\n\n    <li>Two   words</li>\n</ul>\n";
        assert_eq!(
            HtmlCompressor.minify(html),
            "<ul>\n<li>One</li>\n<li>Two words</li>\n</ul>\n"
        );
    }

    #[test]
    fn html_removes_comments_but_not_conditionals() {
        let html = "<p>a</p><!-- note --><!--[if IE]><p>ie</p><![endif]-->";
        assert_eq!(
            HtmlCompressor.minify(html),
            "<p>a</p><!--[if IE]><p>ie</p><![endif]-->"
        );
    }

    #[test]
    fn html_preserves_raw_blocks() {
        let html = "<div>\n  <pre>  keep\n    this  </pre>\n  <script>\n  var  x = 1;\n  </script>\n</div>";
        let out = HtmlCompressor.minify(html);
        assert!(out.contains("<pre>  keep\n    this  </pre>"));
        assert!(out.contains("<script>\n  var  x = 1;\n  </script>"));
        assert!(out.starts_with("<div>\n<pre>"));
    }

    #[test]
    fn html_does_not_mistake_prefix_tags() {
        let html = "<preview>  a   b </preview>";
        assert_eq!(HtmlCompressor.minify(html), "<preview> a b </preview>");
    }

    #[test]
    fn html_minify_is_idempotent() {
        let html = "<html>\n  <body>\n    <p>Hi   there</p>\n    <pre> x </pre>\n  </body>\n</html>\n";
        let once = HtmlCompressor.minify(html);
        assert_eq!(HtmlCompressor.minify(&once), once);
    }

    // =========================================================================
    // CSS
    // =========================================================================

    #[test]
    fn css_collapses_whitespace_and_comments() {
        let css = "/* header */\nbody {\n    margin: 0;\n    color: #111;\n}\n\na:hover, a:focus {\n  color: red;\n}\n";
        assert_eq!(minify_css(css), "body{margin:0;color:#111}a:hover,a:focus{color:red}");
    }

    #[test]
    fn css_keeps_descendant_spaces_and_strings() {
        let css = ".nav  ul li { content: \"a  ;  b\"; }";
        assert_eq!(minify_css(css), ".nav ul li{content:\"a  ;  b\"}");
    }

    #[test]
    fn css_keeps_space_before_pseudo_class_in_selectors() {
        assert_eq!(minify_css("div :first-child { color: red; }"), "div :first-child{color:red}");
        assert_eq!(
            minify_css("@media screen {\n  ul :hover { margin : 0; }\n}"),
            "@media screen{ul :hover{margin:0}}"
        );
        assert_eq!(minify_css("a:hover { color : red }"), "a:hover{color:red}");
    }

    #[test]
    fn css_keeps_space_in_values() {
        let css = "p { margin: 0 auto; font: 12px / 1.5 serif; }";
        assert_eq!(minify_css(css), "p{margin:0 auto;font:12px / 1.5 serif}");
    }

    // =========================================================================
    // JavaScript
    // =========================================================================

    #[test]
    fn js_drops_indentation_blank_lines_and_comments() {
        let js = "// header\n(function () {\n\n    var a = 1; // trailing stays\n    return a;\n})();\n";
        assert_eq!(
            minify_js(js),
            "(function () {\nvar a = 1; // trailing stays\nreturn a;\n})();\n"
        );
    }
}
