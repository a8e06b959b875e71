use crate::assets::{
    CONNECT_DELAY, DEFAULT_API_BASE, DEFAULT_CAPTURE_INTERVAL, DEFAULT_WS_URL,
};
use crate::media::CaptureProfile;
use std::time::Duration;

/// Logical purpose of a stream. Every purpose gets its own Channel and its
/// own default fallback behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPurpose {
    Chat,
    Translation,
    Quiz,
}

impl StreamPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamPurpose::Chat => "chat",
            StreamPurpose::Translation => "translation",
            StreamPurpose::Quiz => "quiz",
        }
    }

    pub fn parse(value: &str) -> Option<StreamPurpose> {
        match value.to_lowercase().as_str() {
            "chat" => Some(StreamPurpose::Chat),
            "translation" => Some(StreamPurpose::Translation),
            "quiz" => Some(StreamPurpose::Quiz),
            _ => None,
        }
    }

    /// Only the translation pipeline falls back to the request/response API
    /// when the socket is down.
    pub fn default_fallback(&self) -> FallbackPolicy {
        match self {
            StreamPurpose::Translation => FallbackPolicy::HttpWhenDisconnected,
            StreamPurpose::Chat | StreamPurpose::Quiz => FallbackPolicy::Disabled,
        }
    }
}

impl std::fmt::Display for StreamPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the scheduler should do with frames while the socket is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Stop capturing until the socket reopens.
    Disabled,
    /// Keep capturing and push frames through the HTTP recognize call.
    HttpWhenDisconnected,
}

pub struct Config {
    pub ws_url: String,
    pub api_base: String,
    pub purpose: StreamPurpose,
    pub capture_interval: Duration,
    pub connect_delay: Duration,
    pub fallback: FallbackPolicy,
    pub profile: CaptureProfile,
}

impl Config {
    pub fn new(purpose: StreamPurpose) -> Self {
        Config {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            purpose,
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            connect_delay: CONNECT_DELAY,
            fallback: purpose.default_fallback(),
            profile: CaptureProfile::default(),
        }
    }
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_parsing() {
        assert_eq!(StreamPurpose::parse("chat"), Some(StreamPurpose::Chat));
        assert_eq!(
            StreamPurpose::parse("Translation"),
            Some(StreamPurpose::Translation)
        );
        assert_eq!(StreamPurpose::parse("quiz"), Some(StreamPurpose::Quiz));
        assert_eq!(StreamPurpose::parse("video"), None);
    }

    #[test]
    fn fallback_defaults_per_purpose() {
        assert_eq!(
            StreamPurpose::Translation.default_fallback(),
            FallbackPolicy::HttpWhenDisconnected
        );
        assert_eq!(
            StreamPurpose::Chat.default_fallback(),
            FallbackPolicy::Disabled
        );
        assert_eq!(
            StreamPurpose::Quiz.default_fallback(),
            FallbackPolicy::Disabled
        );
    }
}
