//! Client configuration
//!
//! Settings come from the environment (optionally a `.env` file) and can be
//! overridden with the builder-style setters.

use review_constants::{
    DEFAULT_API_URL, DEFAULT_USER_AGENT, ENV_API_URL, ENV_RELOAD_AFTER_MUTATION,
};
use tracing::{debug, warn};

/// Configuration for talking to the evaluation backend
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://localhost:9000`
    pub base_url: String,
    /// Reload the collection after every successful submit/delete
    pub reload_after_mutation: bool,
    /// User agent sent with each request
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a configuration for the given backend with default settings
    pub fn new<U: Into<String>>(base_url: U) -> Self {
        Self {
            base_url: base_url.into(),
            reload_after_mutation: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Build the configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let base_url = std::env::var(ENV_API_URL).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let reload_after_mutation = match std::env::var(ENV_RELOAD_AFTER_MUTATION) {
            Ok(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!(
                    value = %raw,
                    "Ignoring unrecognised {ENV_RELOAD_AFTER_MUTATION} value"
                );
                false
            }),
            Err(_) => false,
        };

        debug!(%base_url, reload_after_mutation, "Loaded client configuration");
        Self::new(base_url).with_reload_after_mutation(reload_after_mutation)
    }

    /// Set the backend base URL
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Enable/disable reloading after mutations
    pub fn with_reload_after_mutation(mut self, enabled: bool) -> Self {
        self.reload_after_mutation = enabled;
        self
    }

    /// Set the user agent
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
