use std::fmt;
use std::str::FromStr;

use crate::error::TokenError;
use crate::platform::Platform;

/// Field separator inside a button payload.
pub const SEPARATOR: char = '|';

/// Telegram rejects `callback_data` longer than this many bytes.
pub const MAX_PAYLOAD_BYTES: usize = 64;

/// What a pressed button asks for. The tag doubles as the payload version:
/// a new layout gets a new tag rather than reusing an old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    YouTube,
}

impl Action {
    fn tag(self) -> &'static str {
        match self {
            Action::YouTube => "yt",
        }
    }

    pub fn platform(self) -> Platform {
        match self {
            Action::YouTube => Platform::YouTube,
        }
    }
}

impl FromStr for Action {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yt" => Ok(Action::YouTube),
            other => Err(TokenError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp3,
    Mp4,
}

impl MediaFormat {
    /// Query-string value understood by the resolver.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mp4 => "mp4",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFormat {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp3" => Ok(MediaFormat::Mp3),
            "mp4" => Ok(MediaFormat::Mp4),
            other => Err(TokenError::UnknownFormat(other.to_string())),
        }
    }
}

/// Request state carried across the gap between showing the format buttons
/// and receiving the press: `<action>|<format>|<url>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackToken {
    pub action: Action,
    pub format: MediaFormat,
    pub url: String,
}

impl CallbackToken {
    pub fn youtube(format: MediaFormat, url: impl Into<String>) -> Self {
        Self {
            action: Action::YouTube,
            format,
            url: url.into(),
        }
    }

    /// Encode into a button payload, refusing anything that would not
    /// decode back to the same token or that Telegram would reject.
    pub fn encode(&self) -> Result<String, TokenError> {
        if self.url.is_empty() {
            return Err(TokenError::EmptyUrl);
        }
        if self.url.contains(SEPARATOR) {
            return Err(TokenError::SeparatorInUrl);
        }

        let payload = format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.action.tag(),
            self.format.as_str(),
            self.url
        );
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(TokenError::TooLong(payload.len(), MAX_PAYLOAD_BYTES));
        }
        Ok(payload)
    }

    pub fn decode(payload: &str) -> Result<Self, TokenError> {
        let fields: Vec<&str> = payload.split(SEPARATOR).collect();
        let [action, format, url] = fields.as_slice() else {
            return Err(TokenError::FieldCount(fields.len()));
        };

        let action = action.parse()?;
        let format = format.parse()?;
        if url.is_empty() {
            return Err(TokenError::EmptyUrl);
        }

        Ok(Self {
            action,
            format,
            url: url.to_string(),
        })
    }
}
