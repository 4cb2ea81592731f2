use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::messenger::ChatTarget;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Chat receiving a copy of every accepted request: `@channel` or a numeric id.
    pub audit_chat: String,
}

impl TelegramConfig {
    pub fn audit_target(&self) -> ChatTarget {
        ChatTarget::parse(&self.audit_chat)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: default_resolver_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            service_name: default_service_name(),
        }
    }
}

impl HealthConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid health bind address: {}", self.bind))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Six-field cron expression for evicting stale cooldown entries.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self) -> Result<chrono::Duration> {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| {
                format!(
                    "rate_limit.cooldown_secs is out of range: {}",
                    self.cooldown_secs
                )
            })
    }
}

fn default_resolver_base_url() -> String {
    "https://socialdown.itz-ashlynn.workers.dev".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bind() -> String {
    "0.0.0.0:10000".to_string()
}

fn default_service_name() -> String {
    "telegram-downloader-bot".to_string()
}

fn default_cooldown_secs() -> u64 {
    5
}

fn default_sweep_cron() -> String {
    "0 * * * * *".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }
        if self.telegram.audit_chat.trim().is_empty() {
            anyhow::bail!("telegram.audit_chat must not be empty");
        }

        let base_url = self.resolver.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .with_context(|| format!("Invalid resolver.base_url: {base_url}"))?;
        self.resolver.base_url = base_url;

        if self.resolver.timeout_secs == 0 {
            anyhow::bail!("resolver.timeout_secs must be greater than zero");
        }
        if self.rate_limit.cooldown_secs == 0 {
            anyhow::bail!("rate_limit.cooldown_secs must be greater than zero");
        }
        self.rate_limit.cooldown()?;
        self.health.bind_addr()?;
        Ok(())
    }
}
