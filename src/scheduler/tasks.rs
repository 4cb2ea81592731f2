use chrono::Utc;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use crate::scheduler::Scheduler;

const HEARTBEAT_CRON: &str = "0 0 * * * *";

/// Register built-in background jobs
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    limiter: RateLimiter,
    sweep_cron: &str,
) -> anyhow::Result<()> {
    scheduler
        .add_cron_job(HEARTBEAT_CRON, "heartbeat", || {
            Box::pin(async {
                info!("Heartbeat: bot is alive");
            })
        })
        .await?;

    scheduler
        .add_cron_job(sweep_cron, "cooldown-sweep", move || {
            let limiter = limiter.clone();
            Box::pin(async move {
                let evicted = limiter.sweep(Utc::now()).await;
                let remaining = limiter.tracked_users().await;
                debug!(evicted, remaining, "Swept stale cooldown entries");
            })
        })
        .await?;

    Ok(())
}
