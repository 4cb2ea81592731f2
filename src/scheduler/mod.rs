pub mod tasks;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, warn};

/// Boxed future produced by a job on every tick.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Named maintenance jobs on cron schedules.
///
/// Names are unique. A tick that fires while the previous run of the same
/// job is still going is skipped, so a slow sweep never piles up behind
/// itself.
pub struct Scheduler {
    inner: JobScheduler,
    names: Mutex<Vec<String>>,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self {
            inner,
            names: Mutex::new(Vec::new()),
        })
    }

    /// Add a recurring job. `cron_expr` uses six fields, seconds first.
    pub async fn add_cron_job<F>(&self, cron_expr: &str, name: &str, task: F) -> Result<()>
    where
        F: Fn() -> JobFuture + Send + Sync + 'static,
    {
        let mut names = self.names.lock().await;
        if names.iter().any(|existing| existing == name) {
            anyhow::bail!("Job '{}' is already scheduled", name);
        }

        let job_name = name.to_string();
        let running = Arc::new(AtomicBool::new(false));
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            guarded(job_name.clone(), running.clone(), &task)
        })
        .with_context(|| format!("Invalid cron expression for job '{}': {}", name, cron_expr))?;

        self.inner
            .add(job)
            .await
            .with_context(|| format!("Failed to add job: {}", name))?;
        names.push(name.to_string());

        info!("Scheduled job '{}' with cron: {}", name, cron_expr);
        Ok(())
    }

    /// Names of every registered job, in registration order.
    pub async fn job_names(&self) -> Vec<String> {
        self.names.lock().await.clone()
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start scheduler")?;
        info!("Scheduler started with {} job(s)", self.names.lock().await.len());
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to shutdown scheduler")?;
        info!("Scheduler stopped");
        Ok(())
    }
}

/// One tick of a job. Runs `task` only if no earlier tick is still running.
fn guarded<F>(name: String, running: Arc<AtomicBool>, task: &F) -> JobFuture
where
    F: Fn() -> JobFuture,
{
    if running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        warn!("Skipping tick of '{}': previous run still in progress", name);
        return Box::pin(async {});
    }

    let fut = task();
    Box::pin(async move {
        let _running = RunningFlag(running);
        debug!("Running scheduled job: {}", name);
        fut.await;
    })
}

/// Clears the in-progress flag even if the job panics.
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
