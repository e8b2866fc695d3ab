use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;
use super::protocol::Provider;

/// Environment variable that selects the API base path (`development` or `deployed`).
pub const ENV_VAR: &str = "MRGA_ENV";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub list: ListConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Deployed,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "deployed" | "production" | "prod" => Some(Self::Deployed),
            _ => None,
        }
    }
}

/// Where the catalog and chat services live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_dev_base_url")]
    pub dev_base_url: String,
    /// Deployed builds are served under a path prefix.
    #[serde(default = "default_deployed_base_url")]
    pub deployed_base_url: String,
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        let url = match self.environment {
            Environment::Development => &self.dev_base_url,
            Environment::Deployed => &self.deployed_base_url,
        };
        url.trim_end_matches('/')
    }
}

/// Local control API for the front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Initial volume, 0..=100.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub default_provider: Provider,
    /// Characters revealed per pacing step.
    #[serde(default = "default_reveal_step_chars")]
    pub reveal_step_chars: usize,
    #[serde(default = "default_reveal_interval_ms")]
    pub reveal_interval_ms: u64,
}

impl ChatConfig {
    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Artificial latency before a page is appended.
    #[serde(default)]
    pub load_delay_ms: u64,
}

impl ListConfig {
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MpvConfig {
    /// Explicit mpv binary; searched beside the exe and on PATH when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            dev_base_url: default_dev_base_url(),
            deployed_base_url: default_deployed_base_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_provider: Provider::default(),
            reveal_step_chars: default_reveal_step_chars(),
            reveal_interval_ms: default_reveal_interval_ms(),
        }
    }
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            load_delay_ms: 0,
        }
    }
}

fn default_dev_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_deployed_base_url() -> String {
    "http://localhost:8000/mrga".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_volume() -> u8 {
    70
}

fn default_reveal_step_chars() -> usize {
    4
}

fn default_reveal_interval_ms() -> u64 {
    15
}

fn default_page_size() -> usize {
    20
}

impl Config {
    /// Load `config.toml` from the config dir, falling back to defaults when
    /// it does not exist.  The file is never written.  `MRGA_ENV` overrides
    /// `api.environment`.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(value) = std::env::var(ENV_VAR) {
            match Environment::parse(&value) {
                Some(env) => config.api.environment = env,
                None => tracing::warn!("ignoring unknown {}={:?}", ENV_VAR, value),
            }
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.normalize();
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    fn normalize(&mut self) {
        self.playback.default_volume = self.playback.default_volume.min(100);
        self.chat.reveal_step_chars = self.chat.reveal_step_chars.max(1);
        self.list.page_size = self.list.page_size.max(1);
    }
}
