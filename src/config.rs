//! Endpoint configuration for the Splicer backend.
//!
//! The token-issuing edge function and the agent server live at different
//! origins; both can be overridden through the environment for local
//! development against a self-hosted agent.

/// Default URL of the token-issuing edge function.
pub const DEFAULT_TOKEN_URL: &str = "https://api.spliceronline.com/functions/v1/stream-token";

/// Default base URL of the agent server (streams and cancellation).
pub const DEFAULT_AGENT_BASE_URL: &str = "https://agent.spliceronline.com";

/// Assistant identifier sent with every token request.
pub const DEFAULT_ASSISTANT_ID: &str = "splicer";

/// Resolved endpoint configuration.
#[derive(Debug, Clone)]
pub struct SplicerConfig {
    /// URL of the token-issuing collaborator
    pub token_url: String,
    /// Base URL of the agent server
    pub agent_base_url: String,
    /// Assistant id for token requests
    pub assistant_id: String,
}

impl SplicerConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `SPLICER_TOKEN_URL`, `SPLICER_AGENT_URL`.
    pub fn from_env() -> Self {
        Self {
            token_url: std::env::var("SPLICER_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            agent_base_url: std::env::var("SPLICER_AGENT_URL")
                .unwrap_or_else(|_| DEFAULT_AGENT_BASE_URL.to_string()),
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
        }
    }

    /// Config pointing both endpoints at one base URL (tests, self-hosting).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            token_url: format!("{}/stream-token", base_url),
            agent_base_url: base_url.to_string(),
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
        }
    }
}

impl Default for SplicerConfig {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            agent_base_url: DEFAULT_AGENT_BASE_URL.to_string(),
            assistant_id: DEFAULT_ASSISTANT_ID.to_string(),
        }
    }
}
