//! Localized message bundle.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Bundled English messages.
const DEFAULT_BUNDLE: &str = include_str!("../lang/en.toml");

/// Keys every bundle must define.
pub const REQUIRED_KEYS: [&str; 4] = [
    "error.page_permissions",
    "error.page_metadata",
    "error.unknown",
    "error.xpath_dom_mismatch",
];

/// Message templates grouped by table (`[basic]`, `[error]`).
#[derive(Debug, Clone, Deserialize)]
pub struct Messages {
    #[serde(default)]
    basic: BTreeMap<String, String>,
    #[serde(default)]
    error: BTreeMap<String, String>,
}

impl Messages {
    /// The embedded English bundle.
    pub fn english() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_BUNDLE)
    }

    /// Parse a bundle and check that all required keys are present.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let messages: Self = toml::from_str(content)?;
        messages.validate()?;
        Ok(messages)
    }

    /// Load a bundle from `path`, or the embedded English one when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_toml(&std::fs::read_to_string(path)?)
            }
            None => Self::english(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for key in REQUIRED_KEYS {
            self.require(key)?;
        }
        Ok(())
    }

    /// Template for a dotted key such as `error.unknown`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let (table, name) = key.split_once('.')?;
        let table = match table {
            "basic" => &self.basic,
            "error" => &self.error,
            _ => return None,
        };
        table.get(name).map(String::as_str)
    }

    /// Like [`get`](Self::get), failing with [`ConfigError::MissingMessage`].
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingMessage(key.to_owned()))
    }

    /// Render the template at `key`, or the key itself when it is missing.
    pub fn render(&self, key: &str, params: &[(&str, &str)]) -> String {
        self.get(key)
            .map_or_else(|| key.to_owned(), |template| Self::format(template, params))
    }

    /// Replace `{name}` placeholders in `template`.
    ///
    /// Placeholders without a matching parameter are left as written.
    pub fn format(template: &str, params: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &after[..close];
            match params.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => out.push_str(value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_english_bundle_has_required_keys() {
        let messages = Messages::english().unwrap();
        for key in REQUIRED_KEYS {
            assert!(messages.get(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_missing_required_key() {
        let err = Messages::from_toml(
            r#"
[basic]
title = "x"
[error]
page_permissions = "a"
page_metadata = "b"
unknown = "c"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingMessage(ref key) if key == "error.xpath_dom_mismatch"));
    }

    #[test]
    fn test_missing_tables_are_missing_keys() {
        let err = Messages::from_toml("").unwrap_err();
        assert!(matches!(err, ConfigError::MissingMessage(ref key) if key == "error.page_permissions"));
    }

    #[test]
    fn test_format_substitutes_named_params() {
        assert_eq!(
            Messages::format(
                "{node_count} in source, {element_count} on page",
                &[("node_count", "2"), ("element_count", "1")]
            ),
            "2 in source, 1 on page"
        );
    }

    #[test]
    fn test_format_keeps_unknown_and_unterminated_placeholders() {
        assert_eq!(Messages::format("{a} {b} {c", &[("a", "x")]), "x {b} {c");
    }

    #[test]
    fn test_render_falls_back_to_key() {
        let messages = Messages::english().unwrap();
        assert_eq!(messages.render("error.nope", &[]), "error.nope");
        assert_eq!(messages.render("nope", &[]), "nope");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("de.toml");
        std::fs::write(
            &path,
            r#"
[error]
page_permissions = "Keine Berechtigung"
page_metadata = "Metadaten fehlen"
unknown = "Unbekannter Fehler"
xpath_dom_mismatch = "{node_count} gegen {element_count}"
"#,
        )
        .unwrap();

        let messages = Messages::load(Some(path.as_path())).unwrap();
        assert_eq!(
            messages.render("error.xpath_dom_mismatch", &[("node_count", "3"), ("element_count", "0")]),
            "3 gegen 0"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Messages::load(Some(Path::new("/nonexistent/lang.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
