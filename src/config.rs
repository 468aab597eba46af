//! Service configuration loaded from the environment

use crate::sequencer::{OverlapPolicy, RevealTiming};
use std::str::FromStr;
use std::time::Duration;

/// Default remote completion gateway
pub const DEFAULT_COMPLETION_ENDPOINT: &str =
    "https://developers.cathaypacific.com/hackathon-apigw/hackathon-middleware/v1/vertex-ai/google-gemini";

/// Settings for the remote completion service
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub cookie: Option<String>,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMPLETION_ENDPOINT.to_string(),
            api_key: None,
            cookie: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub completion: CompletionConfig,
    pub reveal: RevealTiming,
    pub overlap_policy: OverlapPolicy,
    /// How long clients should show an error notification
    pub error_toast: Duration,
    /// Quiet period (no commands, no subscribers) after which a conversation
    /// is torn down
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            completion: CompletionConfig::default(),
            reveal: RevealTiming::default(),
            overlap_policy: OverlapPolicy::default(),
            error_toast: Duration::from_millis(5000),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: parse_or(&lookup, "VERA_PORT", defaults.port),
            completion: CompletionConfig {
                endpoint: non_empty("VERA_COMPLETION_ENDPOINT")
                    .unwrap_or(defaults.completion.endpoint),
                api_key: non_empty("VERA_API_KEY"),
                cookie: non_empty("VERA_COOKIE"),
                timeout: Duration::from_secs(positive_or(
                    &lookup,
                    "VERA_COMPLETION_TIMEOUT_SECS",
                    defaults.completion.timeout.as_secs(),
                )),
            },
            reveal: RevealTiming {
                composing: Duration::from_millis(parse_or(
                    &lookup,
                    "VERA_TYPING_DELAY_MS",
                    millis(defaults.reveal.composing),
                )),
                interval: Duration::from_millis(parse_or(
                    &lookup,
                    "VERA_REVEAL_INTERVAL_MS",
                    millis(defaults.reveal.interval),
                )),
                chunk_chars: parse_or(&lookup, "VERA_REVEAL_CHUNK_CHARS", defaults.reveal.chunk_chars)
                    .max(1),
            },
            overlap_policy: parse_or(&lookup, "VERA_REVEAL_POLICY", defaults.overlap_policy),
            error_toast: Duration::from_millis(parse_or(
                &lookup,
                "VERA_ERROR_TOAST_MS",
                millis(defaults.error_toast),
            )),
            idle_timeout: Duration::from_secs(positive_or(
                &lookup,
                "VERA_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable setting, using default");
            default
        }),
        None => default,
    }
}

/// Like `parse_or`, but zero counts as invalid
fn positive_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    match parse_or(lookup, key, default) {
        0 => {
            tracing::warn!(key, "Zero is not allowed here, using default");
            default
        }
        value => value,
    }
}
