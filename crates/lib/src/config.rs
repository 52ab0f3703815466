//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.teams-bridge/config.json`) and environment.
//! Every section has defaults, so a missing file yields a bridge listening on 127.0.0.1:3978
//! that broadcasts to the built-in team.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the Bot Framework application id.
pub const APP_ID_ENV: &str = "MicrosoftAppId";
/// Environment variable holding the Bot Framework application password.
pub const APP_PASSWORD_ENV: &str = "MicrosoftAppPassword";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Bot registration (app id / password).
    #[serde(default)]
    pub bot: BotConfig,

    /// Team broadcast target and message content.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Listener bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the HTTP endpoint (default 3978, the Bot Framework convention).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3978
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Bot registration. Overridden by the MicrosoftAppId / MicrosoftAppPassword env vars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfig {
    pub app_id: Option<String>,
    pub app_password: Option<String>,
}

/// What to do with the remaining channels when one send fails during a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Attempt every channel and report each outcome.
    #[default]
    Continue,

    /// Stop at the first failed send; the rest are reported as skipped.
    Abort,
}

/// Broadcast target (service URL + team) and the two canned messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    /// Channel service base URL for the tenant's region.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Team whose channels receive the broadcast.
    #[serde(default = "default_team_id")]
    pub team_id: String,

    /// Image sent by POST /api/messages/send.
    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_image_content_type")]
    pub image_content_type: String,

    /// Adaptive card sent by POST /api/messages/send-execsum.
    #[serde(default)]
    pub execsum: ExecSumConfig,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_service_url() -> String {
    "https://smba.trafficmanager.net/fr/".to_string()
}

fn default_team_id() -> String {
    "19:96de6561548648858071872e920a028e@thread.tacv2".to_string()
}

fn default_image_url() -> String {
    "https://picsum.photos/200/300".to_string()
}

fn default_image_content_type() -> String {
    "image/png".to_string()
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            team_id: default_team_id(),
            image_url: default_image_url(),
            image_content_type: default_image_content_type(),
            execsum: ExecSumConfig::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Exec summary card: one text block and one "open URL" button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecSumConfig {
    #[serde(default = "default_execsum_text")]
    pub text: String,
    #[serde(default = "default_execsum_action_title")]
    pub action_title: String,
    #[serde(default = "default_execsum_action_url")]
    pub action_url: String,
}

fn default_execsum_text() -> String {
    "william.gorge@toucantoco.com sent an execsum".to_string()
}

fn default_execsum_action_title() -> String {
    "View execsum".to_string()
}

fn default_execsum_action_url() -> String {
    "https://www.w3.org/WAI/ER/tests/xhtml/testfiles/resources/pdf/dummy.pdf".to_string()
}

impl Default for ExecSumConfig {
    fn default() -> Self {
        Self {
            text: default_execsum_text(),
            action_title: default_execsum_action_title(),
            action_url: default_execsum_action_url(),
        }
    }
}

/// Bot Framework app credentials, resolved once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_password: String,
}

impl AppCredentials {
    pub fn new(app_id: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_password: app_password.into(),
        }
    }

    /// No app id means the bot runs unauthenticated (local emulator).
    pub fn auth_disabled(&self) -> bool {
        self.app_id.trim().is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve app credentials: env MicrosoftAppId / MicrosoftAppPassword override config. Missing => empty strings.
pub fn resolve_app_credentials(config: &Config) -> AppCredentials {
    resolve_app_credentials_from(
        config,
        std::env::var(APP_ID_ENV).ok(),
        std::env::var(APP_PASSWORD_ENV).ok(),
    )
}

fn resolve_app_credentials_from(
    config: &Config,
    env_app_id: Option<String>,
    env_app_password: Option<String>,
) -> AppCredentials {
    let app_id = non_empty(env_app_id.as_deref())
        .or_else(|| non_empty(config.bot.app_id.as_deref()))
        .unwrap_or_default();
    let app_password = non_empty(env_app_password.as_deref())
        .or_else(|| non_empty(config.bot.app_password.as_deref()))
        .unwrap_or_default();
    AppCredentials {
        app_id,
        app_password,
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("TEAMS_BRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".teams-bridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, TEAMS_BRIDGE_CONFIG_PATH, or the default. Missing file => default config.
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
