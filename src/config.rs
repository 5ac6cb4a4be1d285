use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "HPN_API_URL";
/// Environment variable holding the admin password.
pub const PASSWORD_ENV: &str = "HPN_ADMIN_PASSWORD";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend base URL including the `/api` prefix
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Overrides the `hpn-admin/<version>` user agent
  pub user_agent: Option<String>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      user_agent: None,
    }
  }
}

fn default_base_url() -> String {
  "http://localhost:4000/api".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds a successful read is served from cache without a new request
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
    }
  }
}

fn default_stale_time_secs() -> u64 {
  60
}

impl CacheConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_time_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
  /// Admin email used by `login` when none is given
  pub email: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hpn-admin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hpn-admin/config.yaml
  ///
  /// The base URL is taken from `api_url` (`--api-url`), then `HPN_API_URL`,
  /// then the file. When one of the first two is set a missing file means
  /// defaults; a file that exists but cannot be read or parsed is an error.
  pub fn load(explicit_path: Option<&Path>, api_url: Option<&str>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let url_override = api_url
      .map(str::to_string)
      .or_else(|| std::env::var(API_URL_ENV).ok())
      .filter(|v| !v.trim().is_empty());

    Self::from_sources(path.as_deref(), url_override)
  }

  fn from_sources(path: Option<&Path>, url_override: Option<String>) -> Result<Self> {
    let mut config = match (path, &url_override) {
      (Some(p), _) => Self::load_from_path(p)?,
      (None, Some(_)) => Config::default(),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/hpn-admin/config.yaml\n\
                 or set {} / --api-url.",
          API_URL_ENV
        ))
      }
    };

    if let Some(url) = url_override {
      config.api.base_url = url;
    }
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("hpn-admin.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hpn-admin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Check that the base URL is an absolute http(s) URL.
  pub fn validate(&self) -> Result<()> {
    let url = url::Url::parse(self.api.base_url.trim())
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", self.api.base_url, e))?;
    match url.scheme() {
      "http" | "https" => Ok(()),
      other => Err(eyre!(
        "Invalid API base URL '{}': unsupported scheme '{}'",
        self.api.base_url,
        other
      )),
    }
  }

  /// Get the admin password from the environment.
  pub fn get_password() -> Result<String> {
    std::env::var(PASSWORD_ENV)
      .map_err(|_| eyre!("Admin password not found. Set {} environment variable.", PASSWORD_ENV))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_full_config() {
    let config = Config::from_yaml(
      r#"
api:
  base_url: https://hpn.example.org/api/
  user_agent: ops-console
cache:
  stale_time_secs: 5
session:
  email: admin@example.org
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://hpn.example.org/api/");
    assert_eq!(config.api.user_agent.as_deref(), Some("ops-console"));
    assert_eq!(config.cache.stale_time(), Duration::from_secs(5));
    assert_eq!(config.session.email.as_deref(), Some("admin@example.org"));
    config.validate().unwrap();
  }

  #[test]
  fn test_sections_default() {
    let config = Config::from_yaml("api:\n  base_url: http://127.0.0.1:4000/api\n").unwrap();
    assert_eq!(config.cache.stale_time_secs, 60);
    assert!(config.session.email.is_none());
    assert!(config.api.user_agent.is_none());
  }

  #[test]
  fn test_invalid_base_url() {
    let mut config = Config::default();
    config.api.base_url = "not a url".into();
    assert!(config.validate().is_err());

    config.api.base_url = "ftp://example.org/api".into();
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("unsupported scheme"));
  }

  #[test]
  fn test_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/hpn-admin.yaml")), None).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_url_override_without_file_uses_defaults() {
    let config = Config::from_sources(None, Some("https://hpn.example.org/api".into())).unwrap();
    assert_eq!(config.api.base_url, "https://hpn.example.org/api");
    assert_eq!(config.cache.stale_time_secs, 60);
  }

  #[test]
  fn test_malformed_file_is_reported_despite_url_override() {
    let path = std::env::temp_dir().join(format!("hpn-admin-bad-{}.yaml", std::process::id()));
    std::fs::write(&path, "cache:\n  stale_time_secs: [not, a, number]\n").unwrap();

    let result = Config::load(Some(&path), Some("https://hpn.example.org/api"));
    std::fs::remove_file(&path).unwrap();

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Failed to parse config file"));
  }

  #[test]
  fn test_url_override_replaces_file_value() {
    let path = std::env::temp_dir().join(format!("hpn-admin-ok-{}.yaml", std::process::id()));
    std::fs::write(
      &path,
      "api:\n  base_url: http://127.0.0.1:4000/api\nsession:\n  email: admin@example.org\n",
    )
    .unwrap();

    let result = Config::load(Some(&path), Some("https://hpn.example.org/api"));
    std::fs::remove_file(&path).unwrap();

    let config = result.unwrap();
    assert_eq!(config.api.base_url, "https://hpn.example.org/api");
    assert_eq!(config.session.email.as_deref(), Some("admin@example.org"));
  }
}
