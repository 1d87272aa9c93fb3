use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const DEFAULT_DATABASE_PATH: &str = "data/chat.db";

/// Comma separated administrator ids, replacing the file value when set.
pub const ENV_ADMIN_IDS: &str = "CHAT_ADMIN_IDS";
pub const ENV_DATABASE: &str = "CHAT_DATABASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Identities treated as administrators. The first one receives visitor
    /// messages.
    #[serde(default)]
    pub admin_ids: Vec<String>,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    DEFAULT_DATABASE_PATH.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            database_path: default_database_path(),
        }
    }
}

impl AppConfig {
    pub fn primary_admin(&self) -> Option<&str> {
        self.admin_ids.first().map(String::as_str)
    }

    /// Apply overrides looked up through `var` (normally `std::env::var`).
    pub fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(ids) = var(ENV_ADMIN_IDS) {
            self.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = var(ENV_DATABASE).filter(|p| !p.trim().is_empty()) {
            self.database_path = path;
        }
        self
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

/// File config with environment overrides applied.
pub fn load_config_with_env(path: &str) -> AppConfig {
    let config = load_config(path).apply_overrides(|key| std::env::var(key).ok());
    if config.admin_ids.is_empty() {
        log::warn!("No administrators configured; visitors cannot start a conversation");
    }
    config
}

pub fn save_config(path: &str, config: &AppConfig) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)
}
