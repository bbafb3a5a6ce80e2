//! Configuration management for wv.
//!
//! Parses `wv.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `site.base_url`
//! - `dng.prefix`
//! - `confluence.base_url`
//! - `confluence.token`

mod expand;
mod messages;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use messages::{Messages, REQUIRED_KEYS};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override site base URL.
    pub base_url: Option<String>,
    /// Override space key.
    pub space_key: Option<String>,
    /// Override source write-back flag.
    pub writeback: Option<bool>,
    /// Override localization bundle path.
    pub lang_path: Option<PathBuf>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "wv.toml";

/// Page title of the built-in query table directive.
pub const QUERY_TABLE_TITLE: &str = "CAE CED Table Element";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site the pages belong to.
    pub site: SiteConfig,
    /// Live page layout.
    pub live: LiveConfig,
    /// Directive registry.
    pub directives: DirectivesConfig,
    /// DOORS Next artifact links (optional section).
    pub dng: Option<DngConfig>,
    /// Confluence REST access.
    pub confluence: Option<ConfluenceConfig>,
    /// Localization bundle.
    lang: LangConfigRaw,
    /// Static values exposed under the `hardcoded#` object store scope.
    pub hardcoded: toml::Table,

    /// Resolved localization bundle path (set after loading).
    #[serde(skip)]
    pub lang_path: Option<PathBuf>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Site metadata used to build named-reference queries.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute base URL of the wiki, without trailing slash.
    pub base_url: Option<String>,
    /// Space the page lives in.
    pub space_key: Option<String>,
}

/// Selectors locating parts of the rendered page.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Root of the rendered page body. Live queries are scoped to it.
    pub content_selector: String,
    /// Header the status bar is mounted in.
    pub header_selector: String,
    /// Element inside the header the status bar goes before.
    pub navigation_selector: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            content_selector: "#main-content".to_owned(),
            header_selector: "#main-header".to_owned(),
            navigation_selector: "#navigation".to_owned(),
        }
    }
}

/// Widget a directive renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    QueryTable,
    DngArtifact,
}

/// Named-reference directive: links to the page called `title`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageDirectiveConfig {
    pub title: String,
    pub widget: WidgetKind,
}

/// Pattern directive: a storage XPath and live selector pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatternDirectiveConfig {
    pub name: String,
    pub widget: WidgetKind,
    pub storage: String,
    pub live: String,
}

/// Directive registry configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DirectivesConfig {
    /// Prefix of the `id` parameter on activated span macros.
    pub view_prefix: String,
    /// Wrap rendered storage nodes in span macros.
    pub writeback: bool,
    /// Named-reference directives.
    pub page: Vec<PageDirectiveConfig>,
    /// Pattern directives.
    pub pattern: Vec<PatternDirectiveConfig>,
}

impl Default for DirectivesConfig {
    fn default() -> Self {
        Self {
            view_prefix: "ve4".to_owned(),
            writeback: false,
            page: vec![PageDirectiveConfig {
                title: QUERY_TABLE_TITLE.to_owned(),
                widget: WidgetKind::QueryTable,
            }],
            pattern: Vec::new(),
        }
    }
}

/// DOORS Next configuration.
#[derive(Debug, Deserialize)]
pub struct DngConfig {
    /// Web URL prefix of artifact links.
    pub prefix: String,
}

/// Confluence configuration.
#[derive(Debug, Deserialize)]
pub struct ConfluenceConfig {
    /// Confluence server base URL.
    pub base_url: String,
    /// Personal access token.
    pub token: String,
}

impl ConfluenceConfig {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is empty or has invalid format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.base_url, "confluence.base_url")?;
        require_http_url(&self.base_url, "confluence.base_url")?;
        require_non_empty(&self.token, "confluence.token")?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LangConfigRaw {
    path: Option<String>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`confluence.token`").
        field: String,
        /// Error message (e.g., "${`CONFLUENCE_TOKEN`} not set").
        message: String,
    },
    /// Localization bundle lacks a required message.
    #[error("No message defined for `{0}` in the localization bundle")]
    MissingMessage(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `wv.toml` in current directory and parents.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails
    /// or the result does not validate.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(base_url) = &settings.base_url {
            self.site.base_url = Some(base_url.clone());
        }
        if let Some(space_key) = &settings.space_key {
            self.site.space_key = Some(space_key.clone());
        }
        if let Some(writeback) = settings.writeback {
            self.directives.writeback = writeback;
        }
        if let Some(lang_path) = &settings.lang_path {
            self.lang_path = Some(lang_path.clone());
        }
    }

    /// Get validated Confluence configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_confluence(&self) -> Result<&ConfluenceConfig, ConfigError> {
        let conf = self.confluence.as_ref().ok_or_else(|| {
            ConfigError::Validation("[confluence] section required in config".into())
        })?;
        conf.validate()?;
        Ok(conf)
    }

    /// Load the localization bundle, from `[lang] path` if set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingMessage` when a required key is absent.
    pub fn messages(&self) -> Result<Messages, ConfigError> {
        Messages::load(self.lang_path.as_deref())
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.lang_path = config.lang.path.as_deref().map(|p| config_dir.join(p));
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_site()?;
        self.validate_live()?;
        self.validate_directives()?;
        if let Some(dng) = &self.dng {
            require_non_empty(&dng.prefix, "dng.prefix")?;
            require_http_url(&dng.prefix, "dng.prefix")?;
        }
        Ok(())
    }

    fn validate_site(&self) -> Result<(), ConfigError> {
        if let Some(base_url) = &self.site.base_url {
            require_http_url(base_url, "site.base_url")?;
        }
        if let Some(space_key) = &self.site.space_key {
            require_non_empty(space_key, "site.space_key")?;
        }
        Ok(())
    }

    fn validate_live(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.live.content_selector, "live.content_selector")?;
        require_non_empty(&self.live.header_selector, "live.header_selector")?;
        require_non_empty(&self.live.navigation_selector, "live.navigation_selector")?;
        Ok(())
    }

    fn validate_directives(&self) -> Result<(), ConfigError> {
        let directives = &self.directives;
        require_non_empty(&directives.view_prefix, "directives.view_prefix")?;
        if !directives
            .view_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation(
                "directives.view_prefix may only contain ASCII letters, digits and underscores"
                    .to_owned(),
            ));
        }

        let mut titles = HashSet::new();
        for page in &directives.page {
            require_non_empty(&page.title, "directives.page.title")?;
            if !titles.insert(page.title.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate page directive \"{}\"",
                    page.title
                )));
            }
        }

        let mut names = HashSet::new();
        for pattern in &directives.pattern {
            require_non_empty(&pattern.name, "directives.pattern.name")?;
            require_non_empty(&pattern.storage, "directives.pattern.storage")?;
            require_non_empty(&pattern.live, "directives.pattern.live")?;
            if !names.insert(pattern.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate pattern directive \"{}\"",
                    pattern.name
                )));
            }
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        expand::expand_opt(&mut self.site.base_url, "site.base_url")?;

        if let Some(ref mut dng) = self.dng {
            dng.prefix = expand::expand_env(&dng.prefix, "dng.prefix")?;
        }

        if let Some(ref mut confluence) = self.confluence {
            confluence.base_url = expand::expand_env(&confluence.base_url, "confluence.base_url")?;
            confluence.token = expand::expand_env(&confluence.token, "confluence.token")?;
        }

        Ok(())
    }
}
