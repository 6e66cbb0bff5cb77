use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Settings for talking to the hub and laying out the cache.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HubConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub cache_dir: PathBuf,
    pub offline: bool,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub show_progress: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            cache_dir: hf_home(None).join("hub"),
            offline: false,
            max_retries: 3,
            retry_base_delay_ms: 500,
            connect_timeout_secs: 10,
            user_agent: format!("qwen-fetch/{}", env!("CARGO_PKG_VERSION")),
            show_progress: true,
        }
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("cache_dir", &self.cache_dir)
            .field("offline", &self.offline)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("show_progress", &self.show_progress)
            .finish()
    }
}

impl HubConfig {
    /// Reads the variables the Hugging Face tooling honours.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();
        let home = hf_home(var("HF_HOME"));

        if let Some(endpoint) = var("HF_ENDPOINT") {
            config.endpoint = endpoint.trim_end_matches('/').to_string();
        }

        config.cache_dir = var("HF_HUB_CACHE")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("hub"));

        config.token = var("HF_TOKEN")
            .or_else(|| var("HUGGING_FACE_HUB_TOKEN"))
            .map(|t| t.trim().to_string())
            .or_else(|| {
                let token_path = var("HF_TOKEN_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| home.join("token"));
                read_token(&token_path)
            });

        config.offline = var("HF_HUB_OFFLINE").is_some_and(|v| is_truthy(&v));
        if var("HF_HUB_DISABLE_PROGRESS_BARS").is_some_and(|v| is_truthy(&v)) {
            config.show_progress = false;
        }

        config
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn hf_home(explicit: Option<String>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cache")
            .join("huggingface")
    })
}

fn read_token(path: &Path) -> Option<String> {
    let token = std::fs::read_to_string(path).ok()?;
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
