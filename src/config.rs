//! Project configuration.
//!
//! Loads `project.yml` from the project root. Stock defaults are overridden by
//! whatever keys the file sets; every key is optional.
//!
//! ## Configuration Options
//!
//! ```yaml
//! # All options are optional - defaults shown below
//! name: My Documentation
//! description: Documentation built with quire.
//! url: https://crates.io/crates/quire
//! default_language: en
//! default_order_alphabetical: false   # link same-language pages A→Z
//! enable_lunr: true                   # build search.html
//! enable_minification: true           # minify output on `quire build`
//! enable_less: true                   # run `.less` assets through a compiler
//! ```
//!
//! Older projects may use `project_name`, `project_description`,
//! `project_url` and `lunr_search`; these are accepted as aliases of the keys
//! above. When both spellings are present the current one wins.
//!
//! Keys quire does not know about are kept in [`ProjectConfig::extra`] and
//! exposed to templates under `project.*`, so themes can define their own
//! settings.
//!
//! Boolean flags accept YAML booleans as well as the strings `"true"` and
//! `"false"`.

use crate::project::LoadError;
use crate::{GENERATOR_WEBSITE, frontmatter};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// File name of the project configuration, relative to the project root.
pub const PROJECT_FILE: &str = "project.yml";

/// `(alias, key)` pairs accepted in `project.yml`.
const ALIASES: &[(&str, &str)] = &[
    ("project_name", "name"),
    ("project_description", "description"),
    ("project_url", "url"),
    ("lunr_search", "enable_lunr"),
];

/// Settings loaded from `project.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, shown in page titles and the site header.
    pub name: String,
    pub description: String,
    /// Project website.
    pub url: String,
    /// Language of pages and menus that do not declare one. Pages in this
    /// language are written at the root of the build directory.
    pub default_language: String,
    /// Link pages of each language in alphabetical order (`previous`/`next`).
    #[serde(deserialize_with = "flag")]
    pub default_order_alphabetical: bool,
    /// Build the client-side search page.
    #[serde(deserialize_with = "flag")]
    pub enable_lunr: bool,
    /// Minify HTML, CSS and JavaScript in production builds.
    #[serde(deserialize_with = "flag")]
    pub enable_minification: bool,
    /// Route `.less` assets through the registered stylesheet compiler.
    #[serde(deserialize_with = "flag")]
    pub enable_less: bool,
    /// Unrecognized keys, passed through to templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "My Documentation".to_string(),
            description: "Documentation built with quire.".to_string(),
            url: GENERATOR_WEBSITE.to_string(),
            default_language: "en".to_string(),
            default_order_alphabetical: false,
            enable_lunr: true,
            enable_minification: true,
            enable_less: true,
            extra: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), String> {
        let language = self.default_language.trim();
        if language.is_empty() {
            return Err("default_language must not be empty".into());
        }
        if language.contains(['/', '\\']) || language == "." || language == ".." {
            return Err(format!(
                "default_language must be a plain language code, got `{language}`"
            ));
        }
        Ok(())
    }

    /// Configuration as a render-model object (`project.*` in templates).
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.extra {
            map.insert(key.clone(), frontmatter::yaml_to_json(value));
        }
        map.insert("name".into(), self.name.clone().into());
        map.insert("description".into(), self.description.clone().into());
        map.insert("url".into(), self.url.clone().into());
        map.insert("default_language".into(), self.default_language.clone().into());
        map.insert(
            "default_order_alphabetical".into(),
            self.default_order_alphabetical.into(),
        );
        map.insert("enable_lunr".into(), self.enable_lunr.into());
        map.insert("enable_minification".into(), self.enable_minification.into());
        map.insert("enable_less".into(), self.enable_less.into());
        map
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(de::Error::custom(format!(
                "expected true or false, found `{other}`"
            ))),
        },
    }
}

/// Stock defaults as a YAML mapping, the base every `project.yml` overlays.
pub fn stock_defaults_value() -> Value {
    serde_yaml::to_value(ProjectConfig::default()).unwrap_or(Value::Mapping(Mapping::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_yaml(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_yaml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Rewrite alias keys to their current spelling. An alias is dropped when
/// the current key is also present.
fn normalize_aliases(map: &mut Mapping) {
    for (alias, key) in ALIASES {
        let Some(value) = map.remove(*alias) else {
            continue;
        };
        if *alias == "lunr_search" {
            warn!("`lunr_search` is deprecated, use `enable_lunr` instead");
        }
        if !map.contains_key(*key) {
            map.insert(Value::String((*key).to_string()), value);
        }
    }
}

/// Parse `project.yml` text, merge it over stock defaults and validate.
///
/// `path` is only used to attribute errors.
pub fn parse_config(text: &str, path: &Path) -> Result<ProjectConfig, LoadError> {
    let value: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|e| LoadError::malformed_yaml(path, e))?
    };
    let mut overlay = match value {
        Value::Mapping(map) => map,
        Value::Null => Mapping::new(),
        other => {
            return Err(LoadError::MalformedYaml {
                path: path.to_path_buf(),
                reason: format!(
                    "project settings must be a mapping, found {}",
                    frontmatter::kind_of(&other)
                ),
            });
        }
    };
    normalize_aliases(&mut overlay);

    let merged = merge_yaml(stock_defaults_value(), Value::Mapping(overlay));
    let config: ProjectConfig =
        serde_yaml::from_value(merged).map_err(|e| LoadError::malformed_yaml(path, e))?;
    config.validate().map_err(|reason| LoadError::InvalidConfig {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

/// Load `project.yml` from the project root.
pub fn load_config(root: &Path) -> Result<ProjectConfig, LoadError> {
    let path = root.join(PROJECT_FILE);
    if !path.is_file() {
        return Err(LoadError::MissingProjectConfig(path));
    }
    let text = fs::read_to_string(&path)?;
    parse_config(&text, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<ProjectConfig, LoadError> {
        parse_config(text, Path::new("project.yml"))
    }

    // =========================================================================
    // Defaults and overlay
    // =========================================================================

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(parse("").unwrap(), ProjectConfig::default());
        assert_eq!(parse("# only a comment\n").unwrap(), ProjectConfig::default());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ProjectConfig::default();
        assert_eq!(config.name, "My Documentation");
        assert_eq!(config.default_language, "en");
        assert!(!config.default_order_alphabetical);
        assert!(config.enable_lunr);
        assert!(config.enable_minification);
        assert!(config.enable_less);
    }

    #[test]
    fn overlay_replaces_only_given_keys() {
        let config = parse("name: Handbook\ndefault_language: fr\n").unwrap();
        assert_eq!(config.name, "Handbook");
        assert_eq!(config.default_language, "fr");
        assert_eq!(config.description, ProjectConfig::default().description);
        assert!(config.enable_lunr);
    }

    #[test]
    fn flags_accept_strings() {
        let config = parse("enable_lunr: \"false\"\nenable_minification: 'TRUE'\n").unwrap();
        assert!(!config.enable_lunr);
        assert!(config.enable_minification);
    }

    #[test]
    fn flags_reject_other_strings() {
        let err = parse("enable_lunr: sometimes\n").unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { .. }));
    }

    #[test]
    fn unknown_keys_are_kept_as_extra() {
        let config = parse("accent_color: teal\nsocial:\n  github: someone\n").unwrap();
        assert_eq!(config.extra.get("accent_color"), Some(&Value::from("teal")));
        let json = config.to_json();
        assert_eq!(json["social"]["github"], serde_json::json!("someone"));
        assert_eq!(json["name"], serde_json::json!("My Documentation"));
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    #[test]
    fn legacy_keys_are_aliases() {
        let config = parse(
            "project_name: Legacy\nproject_description: Old\nproject_url: https://example.com\nlunr_search: false\n",
        )
        .unwrap();
        assert_eq!(config.name, "Legacy");
        assert_eq!(config.description, "Old");
        assert_eq!(config.url, "https://example.com");
        assert!(!config.enable_lunr);
        assert!(config.extra.is_empty());
    }

    #[test]
    fn current_key_wins_over_alias() {
        let config = parse("lunr_search: false\nenable_lunr: true\n").unwrap();
        assert!(config.enable_lunr);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn malformed_yaml_is_reported() {
        let err = parse("name: [broken\n").unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { .. }));
    }

    #[test]
    fn non_mapping_is_malformed() {
        let err = parse("- just\n- a list\n").unwrap_err();
        assert!(matches!(err, LoadError::MalformedYaml { .. }));
    }

    #[test]
    fn invalid_language_fails_validation() {
        assert!(matches!(
            parse("default_language: ''\n").unwrap_err(),
            LoadError::InvalidConfig { .. }
        ));
        assert!(matches!(
            parse("default_language: en/us\n").unwrap_err(),
            LoadError::InvalidConfig { .. }
        ));
    }

    #[test]
    fn load_config_requires_project_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingProjectConfig(_)));
    }

    #[test]
    fn load_config_reads_project_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(PROJECT_FILE), "name: From Disk\n").unwrap();
        assert_eq!(load_config(tmp.path()).unwrap().name, "From Disk");
    }

    #[test]
    fn merge_yaml_is_recursive() {
        let base: Value = serde_yaml::from_str("a: 1\nnested: {x: 1, y: 2}").unwrap();
        let overlay: Value = serde_yaml::from_str("nested: {y: 3}\nb: 2").unwrap();
        let merged = merge_yaml(base, overlay);
        let expected: Value = serde_yaml::from_str("a: 1\nnested: {x: 1, y: 3}\nb: 2").unwrap();
        assert_eq!(merged, expected);
    }
}
