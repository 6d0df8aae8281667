//! `!diagnose`: channel reachability, configured secrets, persisted state
//! and the health endpoint, rendered as one post.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use pal_core::config::PalConfig;
use pal_core::traits::ChannelGateway;
use pal_core::types::{ChannelId, Post};
use pal_scheduler::StateStore;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Up(u16),
    Down(String),
    NotConfigured,
}

/// GET the health endpoint. Any HTTP answer counts as up.
pub async fn probe_health(url: Option<&str>) -> HealthStatus {
    let Some(url) = url else {
        return HealthStatus::NotConfigured;
    };
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return HealthStatus::Down(e.to_string()),
    };
    match client.get(url).send().await {
        Ok(resp) => HealthStatus::Up(resp.status().as_u16()),
        Err(e) => {
            tracing::debug!("[diagnose] health probe {url} failed: {e}");
            HealthStatus::Down(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCheck {
    pub label: &'static str,
    pub channel_id: ChannelId,
    pub reachable: bool,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    pub channels: Vec<ChannelCheck>,
    pub secrets: Vec<(&'static str, bool)>,
    pub data_dir: PathBuf,
    /// `None` when the data directory does not exist.
    pub data_files: Option<usize>,
    pub health: HealthStatus,
    /// Ping interval when a keep-alive target is configured.
    pub keep_alive_minutes: Option<u64>,
}

impl DiagnosticsReport {
    pub fn all_channels_reachable(&self) -> bool {
        self.channels.iter().all(|c| c.reachable)
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &ChannelCheck> {
        self.channels.iter().filter(|c| !c.reachable)
    }

    pub fn to_post(&self, now: NaiveDateTime) -> Post {
        let channel_access = if self.all_channels_reachable() {
            "✅ All channels accessible".to_string()
        } else {
            let missing: Vec<String> = self
                .unreachable()
                .map(|c| format!("{} ({})", c.label, c.channel_id))
                .collect();
            format!("❌ Some channels inaccessible: {}", missing.join(", "))
        };

        let secrets = self
            .secrets
            .iter()
            .map(|(name, present)| format!("{} {name}", if *present { "✅" } else { "❌" }))
            .collect::<Vec<_>>()
            .join("\n");

        let data_files = match self.data_files {
            Some(n) => format!("Found {n} data files in {}", self.data_dir.display()),
            None => "❌ Data directory not found".to_string(),
        };

        let health = match &self.health {
            HealthStatus::Up(code) => format!("✅ HTTP server running (Status: {code})"),
            HealthStatus::Down(_) => "❌ HTTP server not responding".to_string(),
            HealthStatus::NotConfigured => "➖ HTTP server disabled".to_string(),
        };

        let keep_alive = match self.keep_alive_minutes {
            Some(minutes) => format!("✅ Running (pinging every {minutes} minutes)"),
            None => "➖ Disabled (no PUBLIC_URL configured)".to_string(),
        };

        Post::new("🔍 Bot Diagnostics", "Checking bot systems and channel access...")
            .color(0xf1c40f)
            .timestamp(now)
            .field("Channel Access", channel_access)
            .field("Environment Variables", secrets)
            .field("Data Files", data_files)
            .field("HTTP Health Check", health)
            .field("Keep-Alive Service", keep_alive)
            .footer("Run !help for available commands")
    }
}

/// Probe every configured channel and gather the rest of the report.
pub async fn run_diagnostics(
    gateway: &dyn ChannelGateway,
    config: &PalConfig,
    store: &StateStore,
) -> DiagnosticsReport {
    let mut channels = Vec::new();
    for (label, channel_id) in config.channels.labelled() {
        let reachable = gateway.is_reachable(channel_id).await;
        if !reachable {
            tracing::warn!("⚠️ [diagnose] {label} channel {channel_id} is not accessible");
        }
        channels.push(ChannelCheck {
            label,
            channel_id,
            reachable,
        });
    }

    let health = probe_health(config.health.local_url().as_deref()).await;
    let keep_alive_minutes = (!config.health.public_url.trim().is_empty())
        .then_some(config.health.ping_interval_minutes);

    DiagnosticsReport {
        channels,
        secrets: config.secret_presence(),
        data_dir: store.dir().to_path_buf(),
        data_files: store.count_state_files(),
        health,
        keep_alive_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &std::path::Path) -> PalConfig {
        let mut config = PalConfig::default();
        config.discord_token = "token".into();
        config.channels.reminder = REMINDER_CHANNEL;
        config.channels.status = STATUS_CHANNEL;
        config.channels.jobs = 99;
        config.data_dir = dir.to_path_buf();
        config.health.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_report_flags_missing_channel_and_secret() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.save("reminder_state", &serde_json::json!({})).unwrap();

        let config = config(dir.path());
        let gateway = gateway();
        let report = run_diagnostics(gateway.as_ref(), &config, &store).await;

        assert!(!report.all_channels_reachable());
        let missing: Vec<&str> = report.unreachable().map(|c| c.label).collect();
        assert_eq!(missing, vec!["Job Tracker"]);
        assert_eq!(report.data_files, Some(1));
        assert_eq!(report.health, HealthStatus::NotConfigured);
        assert_eq!(report.keep_alive_minutes, None);

        let post = report.to_post(at(17, 12, 0));
        assert_eq!(post.title.as_deref(), Some("🔍 Bot Diagnostics"));
        let env = post.field_value("Environment Variables").unwrap();
        assert!(env.contains("✅ DISCORD_TOKEN"));
        assert!(env.contains("❌ GEMINI_API_KEY"));
        assert!(env.contains("✅ JOB_CHANNEL_ID"));
        assert!(post.field_value("Channel Access").unwrap().contains("Job Tracker (99)"));
        assert!(post.field_value("Data Files").unwrap().starts_with("Found 1 data files"));
        // Secret values never leak into the report.
        assert!(!post.fields.iter().any(|f| f.value.contains("token\n")));
    }

    #[tokio::test]
    async fn test_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nope"));
        let report = run_diagnostics(gateway().as_ref(), &config(dir.path()), &store).await;
        assert_eq!(report.data_files, None);
        assert_eq!(
            report.to_post(at(17, 12, 0)).field_value("Data Files"),
            Some("❌ Data directory not found")
        );
    }

    #[tokio::test]
    async fn test_health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        assert_eq!(probe_health(Some(&server.uri())).await, HealthStatus::Up(200));
        assert_eq!(probe_health(None).await, HealthStatus::NotConfigured);

        // Nothing listens on port 1.
        assert!(matches!(
            probe_health(Some("http://127.0.0.1:1/")).await,
            HealthStatus::Down(_)
        ));
    }

    #[tokio::test]
    async fn test_keep_alive_reported_when_public_url_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.health.public_url = "https://pal.example.com".into();
        let store = StateStore::new(dir.path());
        let report = run_diagnostics(gateway().as_ref(), &config, &store).await;
        assert_eq!(report.keep_alive_minutes, Some(14));
        assert_eq!(
            report.to_post(at(17, 12, 0)).field_value("Keep-Alive Service"),
            Some("✅ Running (pinging every 14 minutes)")
        );
    }
}
