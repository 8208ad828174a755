//! Client configuration

use crate::transport::{Surface, DEFAULT_EXCHANGE_TIMEOUT};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
/// Longest exchange deadline accepted from the environment (one day)
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Everything the client needs from its surroundings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Scheme, host and optional prefix of the wiki server
    pub base_url: String,
    /// Knowledge base the questions are asked against
    pub kb_id: String,
    /// Access password for protected knowledge bases
    pub token: Option<String>,
    pub surface: Surface,
    /// Wall-clock limit for one exchange
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, kb_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            kb_id: kb_id.into(),
            token: None,
            surface: Surface::default(),
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let kb_id = non_empty("WIKI_CHAT_KB_ID").ok_or(ConfigError::Missing("WIKI_CHAT_KB_ID"))?;
        let base_url = non_empty("WIKI_CHAT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let surface = match non_empty("WIKI_CHAT_SURFACE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: "WIKI_CHAT_SURFACE",
                reason,
            })?,
            None => Surface::default(),
        };

        let timeout = match non_empty("WIKI_CHAT_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "WIKI_CHAT_TIMEOUT_SECS",
                        reason: format!(
                            "expected between 1 and {MAX_TIMEOUT_SECS} seconds, got '{raw}'"
                        ),
                    })
                }
            },
            None => DEFAULT_EXCHANGE_TIMEOUT,
        };

        Ok(Self {
            base_url,
            kb_id,
            token: non_empty("WIKI_CHAT_TOKEN"),
            surface,
            timeout,
        })
    }

    pub fn with_surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Full URL of the streaming endpoint for the configured surface
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.surface.path())
    }
}
