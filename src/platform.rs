use std::fmt;

/// Media sources the bot knows how to recognise in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    YouTube,
    Instagram,
    X,
    Pinterest,
}

impl Platform {
    /// Detect the platform a piece of text links to.
    ///
    /// Matching is a case-insensitive substring test against fixed host
    /// markers, checked in order. `None` means the text should be ignored.
    pub fn detect(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("youtube.com") || text.contains("youtu.be") {
            Some(Platform::YouTube)
        } else if text.contains("instagram.com") {
            Some(Platform::Instagram)
        } else if text.contains("x.com") || text.contains("twitter.com") {
            Some(Platform::X)
        } else if text.contains("pinterest.com") {
            Some(Platform::Pinterest)
        } else {
            None
        }
    }

    /// Detect the platform and pick out the link itself: the first
    /// whitespace-separated word pointing at the detected platform, or the
    /// whole trimmed text when the markers only match across words.
    pub fn extract_link(text: &str) -> Option<(Self, &str)> {
        let platform = Self::detect(text)?;
        let link = text
            .split_whitespace()
            .find(|word| Self::detect(word) == Some(platform))
            .unwrap_or_else(|| text.trim());
        Some((platform, link))
    }

    /// Lowercase tag used in logs.
    pub fn tag(self) -> &'static str {
        match self {
            Platform::YouTube => "youtube",
            Platform::Instagram => "instagram",
            Platform::X => "x",
            Platform::Pinterest => "pinterest",
        }
    }

    /// Resolver endpoint serving this platform, if any.
    pub fn resolver_route(self) -> Option<&'static str> {
        match self {
            Platform::YouTube => Some("/yt"),
            Platform::Instagram | Platform::X | Platform::Pinterest => None,
        }
    }
}

/// Capitalised name, as shown in the audit channel.
impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::YouTube => write!(f, "Youtube"),
            Platform::Instagram => write!(f, "Instagram"),
            Platform::X => write!(f, "X"),
            Platform::Pinterest => write!(f, "Pinterest"),
        }
    }
}
