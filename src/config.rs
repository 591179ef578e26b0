//! Forge configuration.
//!
//! Settings come from an optional TOML file, then `GITCODE_*` environment
//! variables override individual keys:
//!
//! ```toml
//! url = "https://gitcode.com"
//! api_url = "https://api.gitcode.com/api/v5"
//! client_id = "..."
//! client_secret = "..."
//! oauth_host = "https://ci.example.com"
//! skip_verify = false
//! page_size = 50
//! ```

use std::path::Path;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://gitcode.com";
pub const DEFAULT_API_URL: &str = "https://api.gitcode.com/api/v5";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Settings for one GitCode forge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForgeConfig {
    /// Web URL of the forge.
    pub url: String,
    /// Base URL of the REST API.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Public URL of the CI host. OAuth redirects go to `{oauth_host}/authorize`.
    pub oauth_host: String,
    /// Disable TLS certificate verification.
    pub skip_verify: bool,
    /// Items requested per page when listing.
    pub page_size: u32,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            oauth_host: String::new(),
            skip_verify: false,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    #[diagnostic(help("see `gitcode-forge auth setup` for the supported keys"))]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

impl ForgeConfig {
    /// Load the configuration.
    ///
    /// Reads `path` when given (it must exist), otherwise the default config
    /// file if present, then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "reading config file");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Override settings from `GITCODE_*` variables. Empty values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        for (key, field) in [
            ("GITCODE_URL", &mut self.url),
            ("GITCODE_API_URL", &mut self.api_url),
            ("GITCODE_CLIENT_ID", &mut self.client_id),
            ("GITCODE_CLIENT_SECRET", &mut self.client_secret),
            ("GITCODE_OAUTH_HOST", &mut self.oauth_host),
        ] {
            if let Some(value) = get(key) {
                *field = value;
            }
        }

        if let Some(value) = get("GITCODE_SKIP_VERIFY") {
            self.skip_verify = parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: "GITCODE_SKIP_VERIFY",
                value,
            })?;
        }
        if let Some(value) = get("GITCODE_PAGE_SIZE") {
            self.page_size = match value.parse() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "GITCODE_PAGE_SIZE",
                        value,
                    });
                }
            };
        }
        Ok(())
    }
}

/// `config.toml` in the platform config directory.
pub fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gitcode-forge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ForgeConfig::default();
        assert_eq!(config.url, "https://gitcode.com");
        assert_eq!(config.api_url, "https://api.gitcode.com/api/v5");
        assert_eq!(config.page_size, 50);
        assert!(!config.skip_verify);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ForgeConfig::from_toml_str(
            r#"
            client_id = "abc"
            page_size = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.client_id, "abc");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.url, DEFAULT_URL);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ForgeConfig::from_toml_str("client = \"typo\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = ForgeConfig::from_toml_str("url = \"https://file.example.com\"").unwrap();
        config
            .apply_env(env(&[
                ("GITCODE_URL", "https://env.example.com"),
                ("GITCODE_CLIENT_SECRET", "s3cret"),
                ("GITCODE_SKIP_VERIFY", "TRUE"),
                ("GITCODE_PAGE_SIZE", "10"),
                ("GITCODE_OAUTH_HOST", ""),
            ]))
            .unwrap();

        assert_eq!(config.url, "https://env.example.com");
        assert_eq!(config.client_secret, "s3cret");
        assert!(config.skip_verify);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.oauth_host, "");
    }

    #[test]
    fn invalid_env_values() {
        let mut config = ForgeConfig::default();
        let err = config
            .apply_env(env(&[("GITCODE_PAGE_SIZE", "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "GITCODE_PAGE_SIZE",
                ..
            }
        ));

        let err = config
            .apply_env(env(&[("GITCODE_SKIP_VERIFY", "maybe")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for GITCODE_SKIP_VERIFY: 'maybe'");
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let err = ForgeConfig::load(Some(Path::new("/nonexistent/gitcode-forge.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
