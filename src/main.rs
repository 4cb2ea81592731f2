mod audit;
mod callback;
mod config;
mod conversation;
mod error;
mod health;
mod messenger;
mod platform;
mod rate_limit;
mod resolver;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::conversation::Conversation;
use crate::messenger::telegram::{self, TelegramMessenger};
use crate::rate_limit::RateLimiter;
use crate::resolver::ResolverClient;
use crate::scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,downbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Resolver: {}", config.resolver.base_url);
    info!("  Audit chat: {}", config.telegram.audit_target());
    info!("  Cooldown: {}s", config.rate_limit.cooldown_secs);

    // Liveness runs on its own task and never touches bot state
    health::spawn(config.health.bind_addr()?, &config.health.service_name).await?;

    let limiter = RateLimiter::in_memory(config.rate_limit.cooldown()?);

    let mut scheduler = Scheduler::new().await?;
    scheduler::tasks::register_builtin_tasks(
        &scheduler,
        limiter.clone(),
        &config.rate_limit.sweep_cron,
    )
    .await?;
    scheduler.start().await?;

    let bot = Bot::new(&config.telegram.bot_token);
    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let resolver = Arc::new(ResolverClient::new(&config.resolver)?);
    let audit = AuditLogger::new(messenger.clone(), config.telegram.audit_target());
    let username = telegram::bot_username(&bot)
        .await
        .context("Failed to fetch bot identity")?;
    info!("  Bot username: {}", username.as_deref().unwrap_or("<none>"));
    let conversation = Arc::new(
        Conversation::new(messenger, resolver, limiter, audit).with_bot_username(username),
    );

    info!("Bot is starting...");
    telegram::run(bot, conversation).await?;

    scheduler.shutdown().await?;
    Ok(())
}
