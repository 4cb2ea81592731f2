use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// Storage for the last accepted request time of each user.
///
/// `try_admit` must be a single atomic check-then-set: updates from
/// different users are dispatched concurrently.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Record `now` for `user_id` and return true, unless the previous
    /// accepted request is less than `cooldown` old.
    async fn try_admit(&self, user_id: u64, now: DateTime<Utc>, cooldown: Duration) -> bool;

    /// Drop entries last accepted before `cutoff`. Returns how many were removed.
    async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCooldownStore {
    last_accepted: Mutex<HashMap<u64, DateTime<Utc>>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn try_admit(&self, user_id: u64, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let mut last_accepted = self.last_accepted.lock().await;
        if let Some(last) = last_accepted.get(&user_id) {
            if now.signed_duration_since(*last) < cooldown {
                return false;
            }
        }
        last_accepted.insert(user_id, now);
        true
    }

    async fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut last_accepted = self.last_accepted.lock().await;
        let before = last_accepted.len();
        last_accepted.retain(|_, last| *last >= cutoff);
        before - last_accepted.len()
    }

    async fn len(&self) -> usize {
        self.last_accepted.lock().await.len()
    }
}

/// Enforces a minimum interval between accepted requests per user.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CooldownStore>,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CooldownStore>, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    pub fn in_memory(cooldown: Duration) -> Self {
        Self::new(Arc::new(MemoryCooldownStore::new()), cooldown)
    }

    pub async fn admit(&self, user_id: u64, now: DateTime<Utc>) -> bool {
        let admitted = self.store.try_admit(user_id, now, self.cooldown).await;
        debug!(user_id, admitted, "Cooldown check");
        admitted
    }

    /// Forget users whose cooldown has long expired. An evicted user is
    /// admitted next time exactly as if the entry were still there.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        match now.checked_sub_signed(self.cooldown) {
            Some(cutoff) => self.store.evict_before(cutoff).await,
            // Window reaches past the earliest representable time
            None => 0,
        }
    }

    pub async fn tracked_users(&self) -> usize {
        self.store.len().await
    }
}
