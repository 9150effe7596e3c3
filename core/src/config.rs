use dirs::home_dir;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHAT_API_URL: &str = "http://127.0.0.1:8001/chat";

/// The agent's per-request timeout is ten seconds; streamed answers get twelve times that.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Hides status messages that leak backend errors.
pub const DEFAULT_SUPPRESS_STATUS_PATTERN: &str = r"(?i)error|exception|\d{3}\s+(Client|Server)";

const API_KEY_ENV_VAR: &str = "WANGR_API_KEY";
const CONFIG_TOML_FILE: &str = "config.toml";

/// Application configuration loaded from disk and merged with overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Endpoint for new chat requests; `/continue` is resolved relative to it.
    pub chat_api_url: String,

    /// Sent as a bearer token when present.
    pub api_key: Option<String>,

    pub request_timeout: Duration,
    pub connect_timeout: Duration,

    /// Workspace root. Every file operation proposed by the agent is confined to it.
    pub cwd: PathBuf,

    pub suppress_status_pattern: String,

    /// Directory where config, logs and other state live (`~/.wangr`).
    pub wangr_home: PathBuf,
}

/// Base config deserialized from `~/.wangr/config.toml`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ConfigToml {
    #[serde(default)]
    pub chat_api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub suppress_status_pattern: Option<String>,
}

/// Optional overrides for user configuration (e.g., from CLI flags).
#[derive(Default, Debug, Clone)]
pub struct ConfigOverrides {
    pub chat_api_url: Option<String>,
    pub api_key: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl Config {
    /// Load configuration, optionally applying overrides (CLI flags). Merges
    /// `~/.wangr/config.toml`, the `WANGR_API_KEY` environment variable, and
    /// any values provided in `overrides` (highest precedence).
    pub fn load_with_overrides(overrides: ConfigOverrides) -> std::io::Result<Self> {
        let wangr_home = wangr_home()?;
        let mut cfg = load_config_toml(&wangr_home)?;
        if cfg.api_key.is_none() {
            cfg.api_key = std::env::var(API_KEY_ENV_VAR)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
        Self::load_from_base_config_with_overrides(cfg, overrides, wangr_home)
    }

    /// Meant to be used directly by tests; everything else goes through
    /// [`Config::load_with_overrides`].
    pub fn load_from_base_config_with_overrides(
        cfg: ConfigToml,
        overrides: ConfigOverrides,
        wangr_home: PathBuf,
    ) -> std::io::Result<Self> {
        // Destructure ConfigOverrides fully to ensure all overrides are applied.
        let ConfigOverrides {
            chat_api_url,
            api_key,
            cwd,
        } = overrides;

        let cwd = match cwd {
            Some(cwd) if cwd.is_absolute() => cwd,
            Some(cwd) => std::env::current_dir()?.join(cwd),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            chat_api_url: chat_api_url
                .or(cfg.chat_api_url)
                .unwrap_or_else(|| DEFAULT_CHAT_API_URL.to_string()),
            api_key: api_key.or(cfg.api_key),
            request_timeout: Duration::from_secs(
                cfg.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            connect_timeout: Duration::from_secs(
                cfg.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
            cwd,
            suppress_status_pattern: cfg
                .suppress_status_pattern
                .unwrap_or_else(|| DEFAULT_SUPPRESS_STATUS_PATTERN.to_string()),
            wangr_home,
        })
    }

    /// `POST` target for resuming a pending batch.
    pub fn continue_url(&self) -> String {
        format!("{}/continue", self.chat_api_url.trim_end_matches('/'))
    }
}

/// Attempt to parse `config.toml` under `wangr_home`. A missing file yields defaults.
fn load_config_toml(wangr_home: &Path) -> std::io::Result<ConfigToml> {
    let config_toml_path = wangr_home.join(CONFIG_TOML_FILE);
    match std::fs::read_to_string(&config_toml_path) {
        Ok(contents) => toml::from_str::<ConfigToml>(&contents).map_err(|e| {
            tracing::error!("Failed to parse config.toml: {e}");
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("config.toml not found, using defaults");
            Ok(ConfigToml::default())
        }
        Err(e) => {
            tracing::error!("Failed to read config.toml: {e}");
            Err(e)
        }
    }
}

/// Returns the path to the wangr configuration directory, which is `~/.wangr`.
/// Does not verify that the directory exists.
pub fn wangr_home() -> std::io::Result<PathBuf> {
    let mut p = home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    p.push(".wangr");
    Ok(p)
}

/// Returns the path to the folder where logs are stored. Does not verify
/// that the directory exists.
pub fn log_dir(cfg: &Config) -> PathBuf {
    cfg.wangr_home.join("log")
}
