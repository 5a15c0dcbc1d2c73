use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use basechat_api_client::ApiClient;
use basechat_core::{ChatOverrides, ChatSettings};

const CONFIG_FILE_NAME: &str = "basechat.toml";
const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// App-level chat defaults; command-line tuning flags override these
    /// per invocation.
    #[serde(default)]
    pub chat: ChatOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            api_key: String::new(),
        }
    }
}

/// Get the config directory path (~/.config/basechat/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("basechat"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load config from disk, returning defaults if not found.
pub fn load_config() -> Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config at {}", path.display()))
}

pub fn save_config(config: &CliConfig) -> Result<()> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let path = config_path()?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// App-level defaults: the built-in settings with the config file's
/// overrides resolved on top.
pub fn app_settings(config: &CliConfig) -> ChatSettings {
    ChatSettings::resolve(&ChatSettings::default(), &config.chat)
}

/// Build an API client for the configured (or overridden) server.
pub fn make_client(config: &CliConfig, server_override: Option<String>) -> Result<ApiClient> {
    let url = server_override.unwrap_or_else(|| config.server.url.clone());
    let mut client = ApiClient::new(&url, REQUEST_TIMEOUT)?;
    if !config.server.api_key.is_empty() {
        client.set_auth(config.server.api_key.clone());
    }
    Ok(client)
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let config = load_config()?;
    let path = config_path()?;
    println!("Config file: {}", path.display());
    println!();
    println!("[server]");
    println!("  url     = {}", config.server.url);
    println!(
        "  api_key = {}",
        if config.server.api_key.is_empty() {
            "(not set)".to_string()
        } else {
            format!(
                "{}...",
                &config.server.api_key[..8.min(config.server.api_key.len())]
            )
        }
    );
    Ok(())
}

/// Update config with provided values.
pub fn set_config(server_url: Option<String>, api_key: Option<String>) -> Result<()> {
    let mut config = load_config()?;

    if let Some(url) = server_url {
        config.server.url = url;
    }
    if let Some(key) = api_key {
        config.server.api_key = key;
    }

    save_config(&config)?;
    println!("Configuration updated.");
    show_config()?;
    Ok(())
}
