use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AuditError;
use crate::messenger::{ChatTarget, Messenger, Sender};
use crate::platform::Platform;

/// Mirrors accepted requests into a separate chat.
#[derive(Clone)]
pub struct AuditLogger {
    messenger: Arc<dyn Messenger>,
    target: ChatTarget,
}

/// Handle to an in-flight audit send. Dropping it detaches the task; the
/// outcome is only ever visible in the logs.
#[derive(Debug)]
pub struct AuditTask(JoinHandle<()>);

impl AuditTask {
    /// Wait for the send to settle. Never reports the send's own failure.
    pub async fn finished(self) {
        if let Err(e) = self.0.await {
            warn!("Audit task aborted: {}", e);
        }
    }
}

impl AuditLogger {
    pub fn new(messenger: Arc<dyn Messenger>, target: ChatTarget) -> Self {
        Self { messenger, target }
    }

    /// Fire-and-forget: spawns the send and returns immediately.
    pub fn record(&self, sender: &Sender, platform: Platform, url: &str) -> AuditTask {
        let text = format_entry(sender, platform, url);
        let logger = self.clone();

        AuditTask(tokio::spawn(async move {
            match logger.send(&text).await {
                Ok(()) => debug!("Audit entry sent to {}", logger.target),
                Err(e) => warn!("{}", e),
            }
        }))
    }

    async fn send(&self, text: &str) -> Result<(), AuditError> {
        self.messenger
            .send_plain(&self.target, text)
            .await
            .map_err(|e| AuditError::Send {
                target: self.target.to_string(),
                source: e.into(),
            })
    }
}

fn format_entry(sender: &Sender, platform: Platform, url: &str) -> String {
    let name: &str = if sender.first_name.is_empty() {
        "User"
    } else {
        &sender.first_name
    };
    let handle = match &sender.username {
        Some(username) => format!("@{username}"),
        None => "no username".to_string(),
    };

    format!(
        "📥 New Download Request\n\n\
         👤 User: {name} ({handle})\n\
         🔗 Profile: tg://user?id={}\n\n\
         📦 Platform: {platform}\n\
         🔍 Link:\n{url}",
        sender.id
    )
}
