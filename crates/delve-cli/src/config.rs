//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Server used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Environment variable overriding the server URL from the config file
pub const BASE_URL_ENV: &str = "DELVE_BASE_URL";

const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Configuration for delve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the chat server
    pub base_url: Option<String>,
    /// Whether to request streamed replies
    pub stream: Option<bool>,
    /// Maximum number of search results
    pub search_limit: Option<usize>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Color theme ("dark" or "light")
    pub theme: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

/// Effective settings after merging CLI flags, environment and config file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: String,
    pub stream: bool,
    pub search_limit: usize,
    pub tui: bool,
    pub theme: String,
    pub connect_timeout: Option<Duration>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub no_stream: bool,
    pub no_tui: bool,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("delve")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DELVE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Directory for the log file
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("delve")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Parse config file content
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            stream: Some(true),
            search_limit: Some(DEFAULT_SEARCH_LIMIT),
            tui: Some(true),
            theme: Some("dark".to_string()),
            connect_timeout_secs: None,
        };

        default_config.save()?;
        Ok(path)
    }

    /// Merge with command line flags and the environment.
    ///
    /// The server URL comes from the flag, then `DELVE_BASE_URL`, then the
    /// file, then [`DEFAULT_BASE_URL`].
    pub fn resolve(&self, overrides: &Overrides, env_base_url: Option<String>) -> Settings {
        let base_url = overrides
            .base_url
            .clone()
            .or(env_base_url.filter(|url| !url.trim().is_empty()))
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Settings {
            base_url,
            stream: !overrides.no_stream && self.stream.unwrap_or(true),
            search_limit: self
                .search_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(DEFAULT_SEARCH_LIMIT),
            tui: !overrides.no_tui && self.tui.unwrap_or(true),
            theme: self.theme.clone().unwrap_or_else(|| "dark".to_string()),
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# delve configuration file
# Place at ~/.config/delve/config.toml (Linux/Mac) or %APPDATA%\delve\config.toml (Windows)

# Chat server to talk to (DELVE_BASE_URL overrides this)
base_url = "http://127.0.0.1:5000"

# Stream replies as they are generated (disable with --no-stream)
stream = true

# Maximum number of search results
search_limit = 20

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

# Color theme (dark, light)
theme = "dark"

# Give up connecting after this many seconds (optional)
# connect_timeout_secs = 10
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Config::default().resolve(&Overrides::default(), None);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert!(settings.stream);
        assert!(settings.tui);
        assert_eq!(settings.search_limit, 20);
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.connect_timeout, None);
    }

    #[test]
    fn test_base_url_precedence() {
        let config = Config {
            base_url: Some("http://file:1".into()),
            ..Default::default()
        };

        let settings = config.resolve(&Overrides::default(), None);
        assert_eq!(settings.base_url, "http://file:1");

        let settings = config.resolve(&Overrides::default(), Some("http://env:2".into()));
        assert_eq!(settings.base_url, "http://env:2");

        let overrides = Overrides {
            base_url: Some("http://flag:3".into()),
            ..Default::default()
        };
        let settings = config.resolve(&overrides, Some("http://env:2".into()));
        assert_eq!(settings.base_url, "http://flag:3");
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let settings = Config::default().resolve(&Overrides::default(), Some("  ".into()));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_flags_disable_stream_and_tui() {
        let config = Config {
            stream: Some(true),
            tui: Some(true),
            ..Default::default()
        };
        let overrides = Overrides {
            no_stream: true,
            no_tui: true,
            ..Default::default()
        };
        let settings = config.resolve(&overrides, None);
        assert!(!settings.stream);
        assert!(!settings.tui);
    }

    #[test]
    fn test_zero_search_limit_falls_back() {
        let config = Config {
            search_limit: Some(0),
            ..Default::default()
        };
        assert_eq!(config.resolve(&Overrides::default(), None).search_limit, 20);
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(example_config()).unwrap();
        assert_eq!(config.base_url.as_deref(), Some(DEFAULT_BASE_URL));
        assert_eq!(config.stream, Some(true));
        assert_eq!(config.search_limit, Some(20));
        assert_eq!(config.theme.as_deref(), Some("dark"));
        assert_eq!(config.connect_timeout_secs, None);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse("stream = false\nconnect_timeout_secs = 5\n").unwrap();
        let settings = config.resolve(&Overrides::default(), None);
        assert!(!settings.stream);
        assert_eq!(settings.connect_timeout, Some(Duration::from_secs(5)));
    }
}
