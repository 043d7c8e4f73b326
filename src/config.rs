use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "onemin-proxy.toml";
const APP_DIR_NAME: &str = "onemin-proxy";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Environment variable holding the fallback upstream API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_asset_base_url")]
    pub asset_base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stream_idle_timeout")]
    pub stream_idle_timeout_secs: u64,
}

fn default_port() -> u16 {
    3456
}

fn default_api_key_env() -> String {
    "ONEMIN_API_KEY".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_body_limit() -> usize {
    50 * 1024 * 1024
}

fn default_base_url() -> String {
    "https://api.1min.ai".to_string()
}

fn default_asset_base_url() -> String {
    "https://asset.1min.ai".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

fn default_stream_idle_timeout() -> u64 {
    300
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            asset_base_url: default_asset_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            stream_idle_timeout_secs: default_stream_idle_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_key_env: default_api_key_env(),
            cors_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Load config from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > platform config dir > home dir > built-in defaults.
    ///
    /// An explicit path must exist; the search locations are optional.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `PORT`, `ONEMIN_BASE_URL` and `CORS_ORIGINS` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with a custom
    /// variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ProxyError::config(format!("PORT is not a valid port: '{port}'")))?;
        }
        if let Some(url) = lookup("ONEMIN_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.upstream.base_url = url.trim().to_string();
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.cors_origins = parsed;
            }
        }
        Ok(())
    }

    /// Fallback upstream key from the configured environment variable.
    /// Requests without their own bearer token use it; `None` means such
    /// requests are rejected.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from(CONFIG_FILE_NAME));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join(APP_DIR_NAME)
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join(APP_DIR_NAME).join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join(APP_DIR_NAME).join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(format!(".{CONFIG_FILE_NAME}")));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
api_key_env = "MY_ONEMIN_KEY"
cors_origins = ["https://app.example"]

[upstream]
base_url = "http://localhost:9999"
stream_idle_timeout_secs = 30
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.api_key_env, "MY_ONEMIN_KEY");
        assert_eq!(config.cors_origins, ["https://app.example"]);
        assert_eq!(config.upstream.base_url, "http://localhost:9999");
        assert_eq!(config.upstream.stream_idle_timeout(), Duration::from_secs(30));
        // Untouched fields keep their defaults.
        assert_eq!(config.upstream.asset_base_url, "https://asset.1min.ai");
        assert_eq!(config.upstream.request_timeout_secs, 120);
        assert_eq!(config.body_limit_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let f = NamedTempFile::new().unwrap();
        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 3456);
        assert_eq!(config.api_key_env, "ONEMIN_API_KEY");
        assert!(config.allows_any_origin());
        assert_eq!(config.upstream.base_url, "https://api.1min.ai");
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let err = ProxyConfig::find_and_load(Some(Path::new("/nonexistent/onemin.toml"))).unwrap_err();
        assert!(matches!(err, ProxyError::Config { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "port = \"not a number\"").unwrap();
        let err = ProxyConfig::load(f.path()).unwrap_err();
        assert!(matches!(err, ProxyError::Toml(_)));
    }

    #[test]
    fn test_overrides() {
        let mut config = ProxyConfig::default();
        config
            .apply_overrides(lookup(&[
                ("PORT", "8080"),
                ("ONEMIN_BASE_URL", "http://127.0.0.1:1234"),
                ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ]))
            .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:1234");
        assert_eq!(config.cors_origins, ["https://a.example", "https://b.example"]);
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut config = ProxyConfig::default();
        config
            .apply_overrides(lookup(&[("PORT", " "), ("CORS_ORIGINS", ",")]))
            .unwrap();
        assert_eq!(config.port, 3456);
        assert_eq!(config.cors_origins, ["*"]);

        let err = config.apply_overrides(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_resolve_api_key_from_configured_variable() {
        let config = ProxyConfig {
            api_key_env: "ONEMIN_PROXY_TEST_KEY_UNSET".to_string(),
            ..ProxyConfig::default()
        };
        assert_eq!(config.resolve_api_key(), None);
    }

    #[test]
    fn test_search_paths_start_in_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("onemin-proxy.toml"));
    }
}
