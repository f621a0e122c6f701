//! Front-matter handling.
//!
//! Content pages and menu files may start with a YAML header fenced by two
//! lines made solely of `---`:
//!
//! ```text
//! ---
//! title: Getting started
//! language: fr
//! ---
//! # The body starts here
//! ```
//!
//! Splitting is purely textual: [`split`] never parses YAML, so a file whose
//! header would not parse still splits cleanly and the error surfaces later
//! from [`parse_header`] with the offending path attached. A file without an
//! opening delimiter, or with an opening delimiter that is never closed, is
//! all body.

use crate::project::LoadError;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// The line that opens and closes a header.
pub const DELIMITER: &str = "---";

/// A file split into its raw header text and its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub header: Option<&'a str>,
    pub body: &'a str,
}

/// Split `text` into header and body.
///
/// For `"---\nH\n---\nB"` this yields header `H` and body `B` exactly.
pub fn split(text: &str) -> Split<'_> {
    let whole = Split {
        header: None,
        body: text,
    };
    let Some((first, rest)) = next_line(text) else {
        return whole;
    };
    if !is_delimiter(first) {
        return whole;
    }

    let mut consumed = 0;
    let mut remaining = rest;
    while let Some((line, after)) = next_line(remaining) {
        if is_delimiter(line) {
            let header = &rest[..consumed];
            let header = header
                .strip_suffix('\n')
                .map(|h| h.strip_suffix('\r').unwrap_or(h))
                .unwrap_or(header);
            return Split {
                header: Some(header),
                body: after,
            };
        }
        consumed += remaining.len() - after.len();
        remaining = after;
    }
    whole
}

/// First line of `text` without its terminator, and the text after it.
fn next_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    Some(match text.find('\n') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    })
}

fn is_delimiter(line: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == DELIMITER
}

/// Parse a raw header into an ordered key/value map.
///
/// A missing or blank header is an empty map. Anything that is not a YAML
/// mapping is reported as malformed YAML against `path`.
pub fn parse_header(header: Option<&str>, path: &Path) -> Result<Mapping, LoadError> {
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return Ok(Mapping::new());
    };
    let value: Value =
        serde_yaml::from_str(header).map_err(|e| LoadError::malformed_yaml(path, e))?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        other => Err(LoadError::MalformedYaml {
            path: path.to_path_buf(),
            reason: format!("header must be a mapping, found {}", kind_of(&other)),
        }),
    }
}

/// A split file with its header parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    pub header: Mapping,
    pub body: &'a str,
}

pub fn parse<'a>(text: &'a str, path: &Path) -> Result<Document<'a>, LoadError> {
    let split = split(text);
    Ok(Document {
        header: parse_header(split.header, path)?,
        body: split.body,
    })
}

/// Look up `key` as text. Numbers and booleans are rendered to strings;
/// nested values and nulls are treated as absent.
pub fn header_text(header: &Mapping, key: &str) -> Option<String> {
    match header.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Convert a YAML value into JSON for the render model. Non-string keys are
/// stringified; tagged values keep their inner value.
pub fn yaml_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(yaml_to_json).collect()),
        Value::Mapping(map) => serde_json::Value::Object(mapping_to_json(map)),
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

pub fn mapping_to_json(map: &Mapping) -> serde_json::Map<String, serde_json::Value> {
    map.iter()
        .map(|(k, v)| {
            let key = match k {
                Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default(),
            };
            (key, yaml_to_json(v))
        })
        .collect()
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // =========================================================================
    // split
    // =========================================================================

    #[test]
    fn split_round_trips_header_and_body() {
        let cases = [
            ("title: Intro", "Body text"),
            ("", "Body"),
            ("a: 1\nb: two", "# Heading\n\nParagraph\n"),
            ("title: x", ""),
            ("title: x", "---not a delimiter"),
        ];
        for (header, body) in cases {
            let text = format!("---\n{header}\n---\n{body}");
            let split = split(&text);
            assert_eq!(split.header, Some(header), "header of {text:?}");
            assert_eq!(split.body, body, "body of {text:?}");
        }
    }

    #[test]
    fn split_without_header_returns_whole_text() {
        let text = "# Just a page\n\nNo header here.";
        assert_eq!(
            split(text),
            Split {
                header: None,
                body: text
            }
        );
    }

    #[test]
    fn split_unterminated_header_is_all_body() {
        let text = "---\ntitle: Oops\nno closing line";
        assert_eq!(split(text).header, None);
        assert_eq!(split(text).body, text);
    }

    #[test]
    fn split_empty_header_between_adjacent_delimiters() {
        let split = split("---\n---\nbody");
        assert_eq!(split.header, Some(""));
        assert_eq!(split.body, "body");
    }

    #[test]
    fn split_accepts_crlf_line_endings() {
        let split = split("---\r\ntitle: Win\r\n---\r\nBody\r\n");
        assert_eq!(split.header, Some("title: Win"));
        assert_eq!(split.body, "Body\r\n");
    }

    #[test]
    fn split_requires_delimiter_on_first_line() {
        let text = "intro\n---\ntitle: x\n---\n";
        assert_eq!(split(text).header, None);
    }

    #[test]
    fn split_empty_text() {
        assert_eq!(split("").header, None);
        assert_eq!(split("").body, "");
    }

    // =========================================================================
    // parse_header
    // =========================================================================

    #[test]
    fn parse_header_preserves_key_order() {
        let map = parse_header(Some("zeta: 1\nalpha: 2\nmid: 3"), Path::new("x.md")).unwrap();
        let keys: Vec<&str> = map.keys().filter_map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn parse_header_missing_or_blank_is_empty() {
        assert!(parse_header(None, Path::new("x.md")).unwrap().is_empty());
        assert!(parse_header(Some("  \n"), Path::new("x.md")).unwrap().is_empty());
    }

    #[test]
    fn parse_header_rejects_invalid_yaml() {
        let err = parse_header(Some("title: [unclosed"), Path::new("bad.md")).unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { ref path, .. } if path == &PathBuf::from("bad.md")));
    }

    #[test]
    fn parse_header_rejects_non_mapping() {
        let err = parse_header(Some("- a\n- b"), Path::new("list.md")).unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { .. }));
        assert!(err.to_string().contains("a list"));
    }

    #[test]
    fn header_text_stringifies_scalars() {
        let map = parse_header(Some("title: Hi\nweight: 3\ndraft: true\nnested: {a: 1}"), Path::new("x")).unwrap();
        assert_eq!(header_text(&map, "title").as_deref(), Some("Hi"));
        assert_eq!(header_text(&map, "weight").as_deref(), Some("3"));
        assert_eq!(header_text(&map, "draft").as_deref(), Some("true"));
        assert_eq!(header_text(&map, "nested"), None);
        assert_eq!(header_text(&map, "missing"), None);
    }

    #[test]
    fn yaml_to_json_converts_nested_structures() {
        let map = parse_header(Some("tags: [a, b]\nmeta:\n  count: 2\n  ratio: 0.5\n1: numeric key"), Path::new("x")).unwrap();
        let json = mapping_to_json(&map);
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(json["meta"]["count"], serde_json::json!(2));
        assert_eq!(json["meta"]["ratio"], serde_json::json!(0.5));
        assert_eq!(json["1"], serde_json::json!("numeric key"));
    }

    #[test]
    fn parse_returns_body_slice() {
        let doc = parse("---\ntitle: T\n---\nhello", Path::new("p.md")).unwrap();
        assert_eq!(header_text(&doc.header, "title").as_deref(), Some("T"));
        assert_eq!(doc.body, "hello");
    }
}
