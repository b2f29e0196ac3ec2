//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.wagate/config.json`). Credentials
//! and endpoints can also come from the environment (VERIFY_TOKEN, WHATSAPP_TOKEN,
//! PHONE_NUMBER_ID, VSM_*), which overrides the file. Everything is resolved once
//! at startup and passed into the gateway; nothing reads the environment per request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API settings (outbound sends).
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Monitoring platform settings (login + metric endpoints).
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Gateway bind, port, and webhook handshake secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port for the webhook (default 3030).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; Meta must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Secret Meta echoes back in the GET handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
}

fn default_gateway_port() -> u16 {
    3030
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            verify_token: None,
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API. Overridden by WHATSAPP_TOKEN env.
    pub token: Option<String>,

    /// Sender identity for outbound messages. Overridden by PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,

    /// Graph API base URL override (for tests or API version bumps).
    pub api_base: Option<String>,
}

/// Monitoring platform settings. The metric endpoint typically sits behind a
/// self-signed certificate; the client is built accordingly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    /// Login endpoint. Overridden by VSM_LOGIN_URL env.
    pub login_url: Option<String>,

    /// CPU metric endpoint. Overridden by VSM_CPU_URL env.
    pub cpu_url: Option<String>,

    /// Overridden by VSM_USERNAME env.
    pub username: Option<String>,

    /// Overridden by VSM_PASSWORD env.
    pub password: Option<String>,
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the webhook handshake secret: env VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_value("VERIFY_TOKEN").or_else(|| non_empty(config.gateway.verify_token.as_ref()))
}

/// Resolve the WhatsApp bearer token: env WHATSAPP_TOKEN overrides config.
pub fn resolve_whatsapp_token(config: &Config) -> Option<String> {
    env_value("WHATSAPP_TOKEN").or_else(|| non_empty(config.whatsapp.token.as_ref()))
}

/// Resolve the sender phone number id: env PHONE_NUMBER_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    env_value("PHONE_NUMBER_ID").or_else(|| non_empty(config.whatsapp.phone_number_id.as_ref()))
}

/// Resolve monitoring settings with VSM_* env overrides applied.
pub fn resolve_monitoring(config: &Config) -> MonitoringConfig {
    MonitoringConfig {
        login_url: env_value("VSM_LOGIN_URL")
            .or_else(|| non_empty(config.monitoring.login_url.as_ref())),
        cpu_url: env_value("VSM_CPU_URL")
            .or_else(|| non_empty(config.monitoring.cpu_url.as_ref())),
        username: env_value("VSM_USERNAME")
            .or_else(|| non_empty(config.monitoring.username.as_ref())),
        password: env_value("VSM_PASSWORD")
            .or_else(|| non_empty(config.monitoring.password.as_ref())),
    }
}

/// Resolve config path from env or default (~/.wagate/config.json).
pub fn default_config_path() -> PathBuf {
    std::env::var("WAGATE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".wagate").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the default path (or WAGATE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Create the config directory and a default config file if they do not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
