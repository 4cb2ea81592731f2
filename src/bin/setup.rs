//! Downbot setup helper.
//!
//! Prompts for the bot token and audit chat in the terminal and writes a
//! starter `config.toml`. The target directory comes from `DOWNBOT_ROOT`,
//! falling back to the current directory.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

struct ConfigParams<'a> {
    bot_token: &'a str,
    audit_chat: &'a str,
    resolver_url: &'a str,
    bind: &'a str,
    cooldown_secs: u64,
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let bot_token = p.bot_token;
    let audit_chat = p.audit_chat;
    let resolver_url = p.resolver_url.trim_end_matches('/');
    let bind = p.bind;
    let cooldown_secs = p.cooldown_secs;

    format!(
        r#"[telegram]
bot_token = "{bot_token}"
audit_chat = "{audit_chat}"

[resolver]
base_url = "{resolver_url}"
timeout_secs = 30

[health]
bind = "{bind}"
service_name = "telegram-downloader-bot"

[rate_limit]
cooldown_secs = {cooldown_secs}
sweep_cron = "0 * * * * *"
"#
    )
}

fn main() -> Result<()> {
    let project_root =
        PathBuf::from(std::env::var("DOWNBOT_ROOT").unwrap_or_else(|_| ".".to_string()));

    println!("=== Downbot Setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let bot_token = read_line("Telegram bot token: ")?;
    let audit_chat = read_line("Audit chat (@channel or numeric id): ")?;
    let resolver_url = or_default(
        read_line("Resolver base URL [https://socialdown.itz-ashlynn.workers.dev]: ")?,
        "https://socialdown.itz-ashlynn.workers.dev",
    );
    let bind = or_default(
        read_line("Health endpoint bind [0.0.0.0:10000]: ")?,
        "0.0.0.0:10000",
    );
    let cooldown_secs = match read_line("Cooldown seconds [5]: ")? {
        s if s.is_empty() => 5,
        s => s
            .parse()
            .with_context(|| format!("Not a number of seconds: {s}"))?,
    };

    let config = format_config(&ConfigParams {
        bot_token: &bot_token,
        audit_chat: &audit_chat,
        resolver_url: &resolver_url,
        bind: &bind,
        cooldown_secs,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run --bin downbot");
    Ok(())
}
