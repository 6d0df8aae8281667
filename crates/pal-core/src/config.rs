//! ProductivityPal configuration system.
//!
//! Resolution order: built-in defaults → optional TOML file → environment
//! variables. `validate()` is called once at startup; it is the only place
//! where a configuration problem stops the process.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{PalError, Result};
use crate::types::ChannelId;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "productivitypal.toml";

/// Root configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PalConfig {
    #[serde(default)]
    pub discord_token: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

fn default_data_dir() -> PathBuf { PathBuf::from("./data") }

impl Default for PalConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            gemini_api_key: String::new(),
            channels: ChannelsConfig::default(),
            schedule: ScheduleConfig::default(),
            data_dir: default_data_dir(),
            gemini: GeminiConfig::default(),
            discord: DiscordConfig::default(),
            health: HealthConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.trim().is_empty() { "<unset>" } else { "<redacted>" }
}

// Secrets never reach logs through `{:?}`.
impl std::fmt::Debug for PalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PalConfig")
            .field("discord_token", &redact(&self.discord_token))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("channels", &self.channels)
            .field("schedule", &self.schedule)
            .field("data_dir", &self.data_dir)
            .field("gemini", &self.gemini)
            .field("discord", &self.discord)
            .field("health", &self.health)
            .field("retention", &self.retention)
            .finish()
    }
}

impl PalConfig {
    /// Load config from `path` (or `productivitypal.toml` if present), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load_from(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PalError::Config(format!("Failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| PalError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DISCORD_TOKEN") {
            self.discord_token = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = v;
        }
        if let Some(v) = get("REMINDER_CHANNEL_ID") {
            self.channels.reminder = parse_env("REMINDER_CHANNEL_ID", &v)?;
        }
        if let Some(v) = get("STATUS_CHANNEL_ID") {
            self.channels.status = parse_env("STATUS_CHANNEL_ID", &v)?;
        }
        if let Some(v) = get("JOB_CHANNEL_ID") {
            self.channels.jobs = parse_env("JOB_CHANNEL_ID", &v)?;
        }
        if let Some(v) = get("REMINDER_INTERVAL_HOURS") {
            self.schedule.reminder_interval_hours = parse_env("REMINDER_INTERVAL_HOURS", &v)?;
        }
        if let Some(v) = get("STATUS_INTERVAL_HOURS") {
            self.schedule.status_interval_hours = Some(parse_env("STATUS_INTERVAL_HOURS", &v)?);
        }
        if let Some(v) = get("JOB_CHECK_TIME") {
            self.schedule.job_check_time = v;
        }
        if let Some(v) = get("REPLY_TIMEOUT_MINUTES") {
            self.schedule.reply_timeout_minutes = parse_env("REPLY_TIMEOUT_MINUTES", &v)?;
        }
        if let Some(v) = get("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("PORT") {
            self.health.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("PUBLIC_URL") {
            self.health.public_url = v;
        }
        Ok(())
    }

    /// Startup validation. A missing Discord token is the one fatal condition.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            return Err(PalError::Config("DISCORD_TOKEN is not set".into()));
        }
        check_interval("reminder_interval_hours", self.schedule.reminder_interval_hours)?;
        check_interval("status_interval_hours", self.schedule.status_interval_hours())?;
        self.schedule.job_check_time()?;
        if self.schedule.reply_timeout_minutes == 0 {
            return Err(PalError::Config("reply_timeout_minutes must be at least 1".into()));
        }
        if self.gemini_api_key.trim().is_empty() {
            tracing::warn!("⚠️ GEMINI_API_KEY is not set, AI replies will use fallback text");
        }
        for (label, id) in self.channels.labelled() {
            if id == 0 {
                tracing::warn!("⚠️ {label} channel is not configured (id 0)");
            }
        }
        Ok(())
    }

    /// Presence of secrets and channel ids, never their values.
    pub fn secret_presence(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("DISCORD_TOKEN", !self.discord_token.trim().is_empty()),
            ("GEMINI_API_KEY", !self.gemini_api_key.trim().is_empty()),
            ("REMINDER_CHANNEL_ID", self.channels.reminder != 0),
            ("STATUS_CHANNEL_ID", self.channels.status != 0),
            ("JOB_CHANNEL_ID", self.channels.jobs != 0),
        ]
    }
}

fn parse_env<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| PalError::Config(format!("{key}={raw:?} is invalid: {e}")))
}

fn check_interval(name: &str, hours: u32) -> Result<()> {
    if (1..=24).contains(&hours) {
        Ok(())
    } else {
        Err(PalError::Config(format!("{name} must be between 1 and 24, got {hours}")))
    }
}

/// Channel ids per workflow. `0` = unconfigured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub reminder: ChannelId,
    #[serde(default)]
    pub status: ChannelId,
    #[serde(default)]
    pub jobs: ChannelId,
}

impl ChannelsConfig {
    /// `(label, id)` pairs in display order.
    pub fn labelled(&self) -> Vec<(&'static str, ChannelId)> {
        vec![
            ("Reminder", self.reminder),
            ("Status", self.status),
            ("Job Tracker", self.jobs),
        ]
    }
}

/// Timing for the three workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_hours")]
    pub reminder_interval_hours: u32,
    /// Window width for status checks; falls back to the reminder interval.
    #[serde(default)]
    pub status_interval_hours: Option<u32>,
    /// Local `HH:MM` of the daily job-application check.
    #[serde(default = "default_job_check_time")]
    pub job_check_time: String,
    #[serde(default = "default_reply_timeout_minutes")]
    pub reply_timeout_minutes: u64,
}

fn default_interval_hours() -> u32 { 3 }
fn default_job_check_time() -> String { "20:00".into() }
fn default_reply_timeout_minutes() -> u64 { 30 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reminder_interval_hours: default_interval_hours(),
            status_interval_hours: None,
            job_check_time: default_job_check_time(),
            reply_timeout_minutes: default_reply_timeout_minutes(),
        }
    }
}

impl ScheduleConfig {
    pub fn status_interval_hours(&self) -> u32 {
        self.status_interval_hours.unwrap_or(self.reminder_interval_hours)
    }

    pub fn job_check_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.job_check_time.trim(), "%H:%M").map_err(|e| {
            PalError::Config(format!("job_check_time {:?} is not HH:MM: {e}", self.job_check_time))
        })
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_minutes * 60)
    }
}

/// Gemini responder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

fn default_gemini_model() -> String { "gemini-1.5-flash".into() }
fn default_gemini_endpoint() -> String { "https://generativelanguage.googleapis.com".into() }
fn default_gemini_timeout() -> u64 { 60 }

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            endpoint: default_gemini_endpoint(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

/// Discord REST transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_discord_api")]
    pub api_base: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_discord_api() -> String { "https://discord.com/api/v10".into() }
fn default_poll_interval() -> u64 { 2 }

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_discord_api(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Liveness endpoint and keep-alive pinger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL pinged to keep a free-tier host awake. Empty = no pinger.
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_minutes: u64,
}

fn bool_true() -> bool { true }
fn default_port() -> u16 { 10000 }
fn default_ping_interval() -> u64 { 14 }

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            public_url: String::new(),
            ping_interval_minutes: default_ping_interval(),
        }
    }
}

impl HealthConfig {
    /// Local URL of the health endpoint, if it is served.
    pub fn local_url(&self) -> Option<String> {
        self.enabled.then(|| format!("http://127.0.0.1:{}/", self.port))
    }
}

/// History caps. `0` keeps everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub max_conversations: usize,
    #[serde(default)]
    pub max_applications: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PalConfig {
            discord_token: "MTA-discord-secret".into(),
            ..PalConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("MTA-discord-secret"));
        assert!(printed.contains("discord_token: \"<redacted>\""));
        assert!(printed.contains("gemini_api_key: \"<unset>\""));
        assert!(printed.contains("data_dir"));
    }

    #[test]
    fn test_defaults() {
        let config = PalConfig::default();
        assert_eq!(config.schedule.reminder_interval_hours, 3);
        assert_eq!(config.schedule.status_interval_hours(), 3);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.schedule.reply_timeout(), Duration::from_secs(1800));
        assert_eq!(
            config.schedule.job_check_time().unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap()
        );
        assert_eq!(config.health.port, 10000);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = PalConfig::default();
        config
            .apply_env(env(&[
                ("DISCORD_TOKEN", "tok"),
                ("REMINDER_CHANNEL_ID", "123"),
                ("JOB_CHANNEL_ID", "456"),
                ("REMINDER_INTERVAL_HOURS", "4"),
                ("DATA_DIR", "/tmp/pal"),
                ("JOB_CHECK_TIME", "21:30"),
            ]))
            .unwrap();

        assert_eq!(config.discord_token, "tok");
        assert_eq!(config.channels.reminder, 123);
        assert_eq!(config.channels.status, 0);
        assert_eq!(config.channels.jobs, 456);
        assert_eq!(config.schedule.status_interval_hours(), 4);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pal"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_number_is_config_error() {
        let mut config = PalConfig::default();
        let err = config
            .apply_env(env(&[("STATUS_CHANNEL_ID", "general")]))
            .unwrap_err();
        assert!(matches!(err, PalError::Config(_)));
    }

    #[test]
    fn test_validate_requires_token_and_sane_interval() {
        let mut config = PalConfig::default();
        assert!(config.validate().is_err());

        config.discord_token = "tok".into();
        config.schedule.reminder_interval_hours = 0;
        assert!(config.validate().is_err());

        config.schedule.reminder_interval_hours = 3;
        config.schedule.job_check_time = "8pm".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_presence_never_leaks_values() {
        let mut config = PalConfig::default();
        config.discord_token = "super-secret".into();
        let presence = config.secret_presence();
        assert!(presence.contains(&("DISCORD_TOKEN", true)));
        assert!(presence.contains(&("GEMINI_API_KEY", false)));
        assert!(!format!("{presence:?}").contains("super-secret"));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pal.toml");
        std::fs::write(
            &path,
            "discord_token = \"t\"\n[channels]\nstatus = 42\n[schedule]\nreminder_interval_hours = 6\n",
        )
        .unwrap();

        let config = PalConfig::load_from(&path).unwrap();
        assert_eq!(config.channels.status, 42);
        assert_eq!(config.schedule.reminder_interval_hours, 6);
        assert_eq!(config.schedule.job_check_time, "20:00");
    }
}
