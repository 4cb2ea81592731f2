use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::audit::{AuditLogger, AuditTask};
use crate::callback::{CallbackToken, MediaFormat};
use crate::error::{TokenError, UpstreamError};
use crate::messenger::{
    Button, IncomingCallback, IncomingMessage, Keyboard, Messenger, SentMessage,
};
use crate::platform::Platform;
use crate::rate_limit::RateLimiter;
use crate::resolver::{MediaItem, MediaResolver};

pub const WELCOME_TEXT: &str = "Hi 👋\n\n\
    Send me a link from YouTube, Instagram, X (Twitter), or Pinterest.\n\n\
    I'll fetch the best available download for you.";
pub const COOLDOWN_TEXT: &str =
    "You're doing that a bit too fast.\nPlease try again in a few seconds.";
pub const PLACEHOLDER_TEXT: &str = "Fetching media…";
pub const FORMAT_PROMPT_TEXT: &str = "🎬 YouTube content found\n\nChoose format:";
pub const FETCH_FAILED_TEXT: &str = "Sorry, I couldn't fetch that. Please try again later.";
pub const LINK_TOO_LONG_TEXT: &str = "That link is too long for me to handle.";

const FORMAT_BUTTONS: [(MediaFormat, &str); 2] =
    [(MediaFormat::Mp3, "🎵 MP3"), (MediaFormat::Mp4, "🎬 MP4")];

/// How an inbound text message was handled.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Not a link we support, or a command we don't know. Nothing was sent.
    Ignored,
    Welcomed,
    RateLimited,
    /// Format buttons are showing; the rest happens on the button press.
    Choosing { audit: AuditTask },
    /// The link could not be packed into a button payload.
    Rejected { audit: AuditTask },
    /// No resolver route for this platform; the placeholder stays as is.
    Unresolved { platform: Platform, audit: AuditTask },
}

/// How a button press was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceOutcome {
    Ignored,
    Delivered,
    Failed,
}

/// Drives one conversation turn from inbound update to final message.
pub struct Conversation {
    messenger: Arc<dyn Messenger>,
    resolver: Arc<dyn MediaResolver>,
    limiter: RateLimiter,
    audit: AuditLogger,
    /// Our own username, without `@`. Commands addressed to other bots are ignored.
    bot_username: Option<String>,
}

impl Conversation {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        resolver: Arc<dyn MediaResolver>,
        limiter: RateLimiter,
        audit: AuditLogger,
    ) -> Self {
        Self {
            messenger,
            resolver,
            limiter,
            audit,
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    pub async fn handle_message(&self, msg: &IncomingMessage) -> Result<TurnOutcome> {
        self.handle_message_at(msg, Utc::now()).await
    }

    pub async fn handle_message_at(
        &self,
        msg: &IncomingMessage,
        now: DateTime<Utc>,
    ) -> Result<TurnOutcome> {
        let text = msg.text.trim();

        if let Some(command) = text.strip_prefix('/') {
            if is_start_command(command, self.bot_username.as_deref()) {
                self.messenger.send_text(msg.chat_id, WELCOME_TEXT).await?;
                return Ok(TurnOutcome::Welcomed);
            }
            return Ok(TurnOutcome::Ignored);
        }

        let Some((platform, link)) = Platform::extract_link(text) else {
            return Ok(TurnOutcome::Ignored);
        };

        let user = &msg.sender;
        if !self.limiter.admit(user.id, now).await {
            info!("User {} ({}) hit the cooldown", user.first_name, user.id);
            self.messenger.send_text(msg.chat_id, COOLDOWN_TEXT).await?;
            return Ok(TurnOutcome::RateLimited);
        }

        info!(
            "Accepted {} link from {} ({}): {}",
            platform.tag(),
            user.first_name,
            user.id,
            link
        );

        let audit = self.audit.record(user, platform, link);
        let placeholder = self.messenger.send_text(msg.chat_id, PLACEHOLDER_TEXT).await?;

        if platform.resolver_route().is_none() {
            info!("No resolver route for {}, leaving placeholder", platform.tag());
            return Ok(TurnOutcome::Unresolved { platform, audit });
        }

        match format_keyboard(link) {
            Ok(keyboard) => {
                self.messenger
                    .edit_text(placeholder, FORMAT_PROMPT_TEXT, Some(keyboard))
                    .await?;
                Ok(TurnOutcome::Choosing { audit })
            }
            Err(e) => {
                warn!("Cannot offer formats for {}: {}", link, e);
                self.messenger
                    .edit_text(placeholder, LINK_TOO_LONG_TEXT, None)
                    .await?;
                Ok(TurnOutcome::Rejected { audit })
            }
        }
    }

    pub async fn handle_callback(&self, callback: &IncomingCallback) -> Result<ChoiceOutcome> {
        let Some(data) = callback.data.as_deref() else {
            return Ok(ChoiceOutcome::Ignored);
        };

        let token = match CallbackToken::decode(data) {
            Ok(token) => token,
            Err(e) => {
                warn!(
                    "Ignoring malformed callback {:?} from {}: {}",
                    data, callback.sender.id, e
                );
                return Ok(ChoiceOutcome::Ignored);
            }
        };

        let Some(message) = callback.message else {
            warn!("Callback from {} has no message to edit", callback.sender.id);
            return Ok(ChoiceOutcome::Ignored);
        };
        let Some(route) = token.action.platform().resolver_route() else {
            return Ok(ChoiceOutcome::Ignored);
        };

        info!(
            "User {} chose {} for {}",
            callback.sender.id, token.format, token.url
        );

        let result = self
            .resolver
            .resolve(route, &token.url, token.format)
            .await
            .and_then(|item| ready_reply(&item));

        let (text, keyboard) = match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Resolver failed for {}: {}", token.url, e);
                self.report_failure(message).await?;
                return Ok(ChoiceOutcome::Failed);
            }
        };

        // Telegram can still refuse the download button; the user must not
        // be left looking at the format choice.
        if let Err(e) = self
            .messenger
            .edit_text(message, &text, Some(keyboard))
            .await
        {
            warn!("Failed to deliver download for {}: {:#}", token.url, e);
            self.report_failure(message).await?;
            return Ok(ChoiceOutcome::Failed);
        }
        Ok(ChoiceOutcome::Delivered)
    }

    async fn report_failure(&self, message: SentMessage) -> Result<()> {
        self.messenger
            .edit_text(message, FETCH_FAILED_TEXT, None)
            .await
    }
}

/// Accepts `start`, `start <payload>` and `start@botname` when `botname` is
/// us. Without a known username any `@` suffix is accepted.
fn is_start_command(command: &str, bot_username: Option<&str>) -> bool {
    let word = command.split_whitespace().next().unwrap_or_default();
    let (name, addressee) = match word.split_once('@') {
        Some((name, addressee)) => (name, Some(addressee)),
        None => (word, None),
    };

    if let (Some(addressee), Some(own)) = (addressee, bot_username) {
        if !addressee.eq_ignore_ascii_case(own.trim_start_matches('@')) {
            return false;
        }
    }
    name.eq_ignore_ascii_case("start")
}

fn format_keyboard(link: &str) -> Result<Keyboard, TokenError> {
    let row = FORMAT_BUTTONS
        .iter()
        .map(|(format, label)| {
            CallbackToken::youtube(*format, link)
                .encode()
                .map(|payload| Button::Callback {
                    label: label.to_string(),
                    payload,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(vec![row])
}

fn ready_reply(item: &MediaItem) -> Result<(String, Keyboard), UpstreamError> {
    let url = reqwest::Url::parse(&item.download_url)
        .map_err(|_| UpstreamError::InvalidDownloadUrl(item.download_url.clone()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UpstreamError::InvalidDownloadUrl(item.download_url.clone()));
    }

    let text = format!(
        "Your download is ready\n\nFormat: {}\nSize: {}",
        item.format.to_uppercase(),
        item.file_size
    );
    let keyboard = vec![vec![Button::Link {
        label: "⬇️ Download".to_string(),
        url,
    }]];
    Ok((text, keyboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::testing::{RecordingMessenger, Sent};
    use crate::messenger::{ChatTarget, Sender};
    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::Mutex;

    enum Stub {
        Item(MediaItem),
        Timeout,
        Empty,
    }

    struct StubResolver {
        reply: Stub,
        calls: Mutex<Vec<(String, String, MediaFormat)>>,
    }

    #[async_trait]
    impl MediaResolver for StubResolver {
        async fn resolve(
            &self,
            route: &str,
            url: &str,
            format: MediaFormat,
        ) -> Result<MediaItem, UpstreamError> {
            self.calls
                .lock()
                .await
                .push((route.to_string(), url.to_string(), format));
            match &self.reply {
                Stub::Item(item) => Ok(item.clone()),
                Stub::Timeout => Err(UpstreamError::Timeout),
                Stub::Empty => Err(UpstreamError::Empty),
            }
        }
    }

    struct Harness {
        conversation: Conversation,
        messenger: Arc<RecordingMessenger>,
        resolver: Arc<StubResolver>,
    }

    fn harness_with(messenger: RecordingMessenger, reply: Stub) -> Harness {
        let messenger = Arc::new(messenger);
        let resolver = Arc::new(StubResolver {
            reply,
            calls: Mutex::new(Vec::new()),
        });
        let audit = AuditLogger::new(messenger.clone(), ChatTarget::Username("@audit".into()));
        let conversation = Conversation::new(
            messenger.clone(),
            resolver.clone(),
            RateLimiter::in_memory(Duration::seconds(5)),
            audit,
        )
        .with_bot_username(Some("downbot".to_string()));
        Harness {
            conversation,
            messenger,
            resolver,
        }
    }

    fn harness(reply: Stub) -> Harness {
        harness_with(RecordingMessenger::default(), reply)
    }

    fn mp4_item() -> MediaItem {
        MediaItem {
            format: "mp4".to_string(),
            file_size: "12MB".to_string(),
            download_url: "https://x/y".to_string(),
        }
    }

    fn sender(id: u64) -> Sender {
        Sender {
            id,
            first_name: "Ada".to_string(),
            username: Some("ada".to_string()),
        }
    }

    fn message(user: u64, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: 100 + user as i64,
            sender: sender(user),
            text: text.to_string(),
        }
    }

    fn press(data: &str) -> IncomingCallback {
        IncomingCallback {
            sender: sender(1),
            data: Some(data.to_string()),
            message: Some(SentMessage {
                chat_id: 101,
                message_id: 9,
            }),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_start_command() {
        let h = harness(Stub::Empty);
        for text in ["/start", "/start@downbot", "/start ref42"] {
            let outcome = h.conversation.handle_message(&message(1, text)).await.unwrap();
            assert!(matches!(outcome, TurnOutcome::Welcomed));
        }
        for text in ["/stats", "/start@someotherbot", "/start@otherbot ref42"] {
            let outcome = h.conversation.handle_message(&message(1, text)).await.unwrap();
            assert!(matches!(outcome, TurnOutcome::Ignored));
        }

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(
            sent[0],
            Sent::Text {
                chat_id: 101,
                text: WELCOME_TEXT.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_youtube_link_offers_formats() {
        let h = harness(Stub::Empty);
        let outcome = h
            .conversation
            .handle_message_at(&message(1, "check this out https://youtu.be/abc123"), at(0))
            .await
            .unwrap();
        let audit = match outcome {
            TurnOutcome::Choosing { audit } => audit,
            other => panic!("expected format choice, got {other:?}"),
        };
        audit.finished().await;

        let sent = h.messenger.sent().await;
        assert!(sent.contains(&Sent::Text {
            chat_id: 101,
            text: PLACEHOLDER_TEXT.to_string()
        }));
        assert!(sent.iter().any(|s| matches!(
            s,
            Sent::Plain { text, .. } if text.contains("https://youtu.be/abc123")
        )));

        let edit = sent
            .iter()
            .find(|s| matches!(s, Sent::Edit { .. }))
            .expect("placeholder edited");
        assert_eq!(
            *edit,
            Sent::Edit {
                message: SentMessage {
                    chat_id: 101,
                    message_id: 1
                },
                text: FORMAT_PROMPT_TEXT.to_string(),
                keyboard: Some(vec![vec![
                    Button::Callback {
                        label: "🎵 MP3".to_string(),
                        payload: "yt|mp3|https://youtu.be/abc123".to_string(),
                    },
                    Button::Callback {
                        label: "🎬 MP4".to_string(),
                        payload: "yt|mp4|https://youtu.be/abc123".to_string(),
                    },
                ]]),
            }
        );
    }

    #[tokio::test]
    async fn test_cooldown_sends_only_notice() {
        let h = harness(Stub::Empty);
        h.conversation
            .handle_message_at(&message(1, "https://youtu.be/first"), at(0))
            .await
            .unwrap();
        let before = h.messenger.sent().await.len();

        let outcome = h
            .conversation
            .handle_message_at(&message(1, "check this out https://youtu.be/abc123"), at(2))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::RateLimited));

        let sent = h.messenger.sent().await;
        let new: Vec<_> = sent[before..]
            .iter()
            .filter(|s| !matches!(s, Sent::Plain { .. }))
            .collect();
        assert_eq!(
            new,
            vec![&Sent::Text {
                chat_id: 101,
                text: COOLDOWN_TEXT.to_string()
            }]
        );

        // Another user is unaffected
        let outcome = h
            .conversation
            .handle_message_at(&message(2, "https://youtu.be/abc123"), at(2))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Choosing { .. }));
    }

    #[tokio::test]
    async fn test_plain_chatter_is_ignored_without_using_cooldown() {
        let h = harness(Stub::Empty);
        let outcome = h
            .conversation
            .handle_message_at(&message(1, "hello bot"), at(0))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert!(h.messenger.sent().await.is_empty());

        let outcome = h
            .conversation
            .handle_message_at(&message(1, "https://youtu.be/abc123"), at(1))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Choosing { .. }));
    }

    #[tokio::test]
    async fn test_other_platforms_keep_placeholder() {
        let h = harness(Stub::Empty);
        let outcome = h
            .conversation
            .handle_message_at(&message(1, "https://www.instagram.com/p/xyz/"), at(0))
            .await
            .unwrap();
        let (platform, audit) = match outcome {
            TurnOutcome::Unresolved { platform, audit } => (platform, audit),
            other => panic!("expected unresolved, got {other:?}"),
        };
        audit.finished().await;
        assert_eq!(platform, Platform::Instagram);

        let sent = h.messenger.sent().await;
        assert!(!sent.iter().any(|s| matches!(s, Sent::Edit { .. })));
        assert!(sent.contains(&Sent::Text {
            chat_id: 101,
            text: PLACEHOLDER_TEXT.to_string()
        }));
    }

    #[tokio::test]
    async fn test_overlong_link_is_rejected_in_place() {
        let h = harness(Stub::Empty);
        let link = format!("https://www.youtube.com/watch?v={}", "a".repeat(80));
        let outcome = h
            .conversation
            .handle_message_at(&message(1, &link), at(0))
            .await
            .unwrap();
        assert!(matches!(outcome, TurnOutcome::Rejected { .. }));

        let sent = h.messenger.sent().await;
        assert!(sent.iter().any(|s| matches!(
            s,
            Sent::Edit { text, keyboard: None, .. } if text == LINK_TOO_LONG_TEXT
        )));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_affect_reply() {
        let h = harness_with(RecordingMessenger::failing_plain(), Stub::Empty);
        let outcome = h
            .conversation
            .handle_message_at(&message(1, "https://youtu.be/abc123"), at(0))
            .await
            .unwrap();
        let audit = match outcome {
            TurnOutcome::Choosing { audit } => audit,
            other => panic!("expected format choice, got {other:?}"),
        };
        audit.finished().await;
        assert_eq!(h.messenger.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_choice_delivers_download() {
        let h = harness(Stub::Item(mp4_item()));
        let outcome = h
            .conversation
            .handle_callback(&press("yt|mp4|https://youtu.be/abc123"))
            .await
            .unwrap();
        assert_eq!(outcome, ChoiceOutcome::Delivered);

        assert_eq!(
            *h.resolver.calls.lock().await,
            vec![(
                "/yt".to_string(),
                "https://youtu.be/abc123".to_string(),
                MediaFormat::Mp4
            )]
        );
        assert_eq!(
            h.messenger.sent().await,
            vec![Sent::Edit {
                message: SentMessage {
                    chat_id: 101,
                    message_id: 9
                },
                text: "Your download is ready\n\nFormat: MP4\nSize: 12MB".to_string(),
                keyboard: Some(vec![vec![Button::Link {
                    label: "⬇️ Download".to_string(),
                    url: reqwest::Url::parse("https://x/y").unwrap(),
                }]]),
            }]
        );
    }

    #[tokio::test]
    async fn test_resolver_failures_reported_to_user() {
        for reply in [Stub::Timeout, Stub::Empty] {
            let h = harness(reply);
            let outcome = h
                .conversation
                .handle_callback(&press("yt|mp3|https://youtu.be/abc123"))
                .await
                .unwrap();
            assert_eq!(outcome, ChoiceOutcome::Failed);

            let sent = h.messenger.sent().await;
            assert_eq!(sent.len(), 1);
            assert!(matches!(
                &sent[0],
                Sent::Edit { text, keyboard: None, .. } if text == FETCH_FAILED_TEXT
            ));
        }
    }

    #[tokio::test]
    async fn test_unusable_download_url_reported_to_user() {
        let h = harness(Stub::Item(MediaItem {
            download_url: "not a url".to_string(),
            ..mp4_item()
        }));
        let outcome = h
            .conversation
            .handle_callback(&press("yt|mp4|https://youtu.be/abc123"))
            .await
            .unwrap();
        assert_eq!(outcome, ChoiceOutcome::Failed);
    }

    #[test]
    fn test_start_command_addressing() {
        assert!(is_start_command("start", Some("downbot")));
        assert!(is_start_command("START@DownBot", Some("downbot")));
        assert!(!is_start_command("start@someotherbot", Some("downbot")));
        assert!(is_start_command("start@anybot", None));
        assert!(!is_start_command("stop@downbot", Some("downbot")));
    }

    #[tokio::test]
    async fn test_non_web_download_urls_reported_to_user() {
        for download_url in ["javascript:alert(1)", "ftp://files.example/a.mp4"] {
            let h = harness(Stub::Item(MediaItem {
                download_url: download_url.to_string(),
                ..mp4_item()
            }));
            let outcome = h
                .conversation
                .handle_callback(&press("yt|mp4|https://youtu.be/abc123"))
                .await
                .unwrap();
            assert_eq!(outcome, ChoiceOutcome::Failed);

            let sent = h.messenger.sent().await;
            assert!(matches!(
                sent.as_slice(),
                [Sent::Edit { text, keyboard: None, .. }] if text == FETCH_FAILED_TEXT
            ));
        }
    }

    #[tokio::test]
    async fn test_rejected_download_button_falls_back_to_failure_text() {
        let h = harness_with(RecordingMessenger::failing_link_edit(), Stub::Item(mp4_item()));
        let outcome = h
            .conversation
            .handle_callback(&press("yt|mp4|https://youtu.be/abc123"))
            .await
            .unwrap();
        assert_eq!(outcome, ChoiceOutcome::Failed);

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            Sent::Edit { text, keyboard: None, .. } if text == FETCH_FAILED_TEXT
        ));
    }

    #[tokio::test]
    async fn test_malformed_callbacks_are_ignored() {
        let h = harness(Stub::Item(mp4_item()));
        for data in ["garbage", "yt|mp4", "ig|mp4|https://x", "yt|flac|https://y"] {
            let outcome = h.conversation.handle_callback(&press(data)).await.unwrap();
            assert_eq!(outcome, ChoiceOutcome::Ignored);
        }

        let mut no_data = press("yt|mp4|https://youtu.be/a");
        no_data.data = None;
        assert_eq!(
            h.conversation.handle_callback(&no_data).await.unwrap(),
            ChoiceOutcome::Ignored
        );

        let mut no_message = press("yt|mp4|https://youtu.be/a");
        no_message.message = None;
        assert_eq!(
            h.conversation.handle_callback(&no_message).await.unwrap(),
            ChoiceOutcome::Ignored
        );

        assert!(h.messenger.sent().await.is_empty());
        assert!(h.resolver.calls.lock().await.is_empty());
    }
}
