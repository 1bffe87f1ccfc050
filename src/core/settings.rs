use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::constants::AppConstants;

pub const CONFIG_ENV: &str = "COMPANION_CONFIG";
pub const DATA_DIR_ENV: &str = "COMPANION_DATA_DIR";
pub const CONSTANTS_ENV: &str = "COMPANION_CONSTANTS_PATH";

/// Root data directory: `$COMPANION_DATA_DIR` or `~/.companion`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".companion")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Extra attempts after the first when the model output fails to parse.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_poll_limit")]
    pub poll_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub constants_path: Option<PathBuf>,
}

fn default_timeout_seconds() -> u64 {
    30
}
fn default_max_retries() -> usize {
    crate::core::router::DEFAULT_MAX_RETRIES
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8787
}
fn default_poll_interval() -> u64 {
    30
}
fn default_poll_limit() -> usize {
    200
}
fn default_level() -> String {
    "info".to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            poll_limit: default_poll_limit(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Complete provider triple, present only when every field is set.
#[derive(Debug, Clone)]
pub struct LlmEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl LlmSettings {
    pub fn endpoint(&self) -> Option<LlmEndpoint> {
        let pick = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(LlmEndpoint {
            base_url: pick(&self.base_url)?.trim_end_matches('/').to_string(),
            api_key: pick(&self.api_key)?,
            model: pick(&self.model)?,
            timeout_seconds: self.timeout_seconds,
        })
    }
}

impl AppSettings {
    /// Path from `$COMPANION_CONFIG`, else `<data_dir>/config.toml`.
    pub fn default_path() -> PathBuf {
        match std::env::var(CONFIG_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => data_dir().join("config.toml"),
        }
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults.", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: AppSettings =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        if settings.llm.endpoint().is_none() {
            warn!("[llm] incomplete in {}; router will run in fallback mode", path.display());
        }
        Ok(settings)
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| data_dir().join("companion.db"))
    }

    fn constants_path(&self) -> Option<PathBuf> {
        match std::env::var(CONSTANTS_ENV) {
            Ok(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
            _ => self.constants_path.clone(),
        }
    }

    /// Constants from the configured JSON file, or the built-in table.
    pub fn load_constants(&self) -> Result<Arc<AppConstants>> {
        let constants = match self.constants_path() {
            Some(path) => {
                info!("Loading constants from {}", path.display());
                AppConstants::load(&path)?
            }
            None => AppConstants::default(),
        };
        Ok(Arc::new(constants))
    }
}
