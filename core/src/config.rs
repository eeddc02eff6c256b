//! Per-client configuration.
//!
//! # Design
//! Every value the engine needs travels in the arguments of each call, taken
//! from the `ClientConfig` of the client issuing it. Nothing is ever written
//! to engine-wide defaults, so clients with different agents or timeouts can
//! have requests in flight at the same time without affecting each other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cookies::{CookieJar, MemoryCookieJar};
use crate::error::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);
pub const DEFAULT_MAX_REDIRECTS: u32 = 7;

/// `"<crate name>/<crate version>"`.
pub fn default_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Configuration shared by every request a client issues.
#[derive(Clone)]
pub struct ClientConfig {
    user_agent: String,
    timeout: Duration,
    cookie_jar: Option<Arc<dyn CookieJar>>,
    max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: default_agent(),
            timeout: DEFAULT_TIMEOUT,
            cookie_jar: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("cookie_jar", &self.cookie_jar.is_some())
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from JSON-encoded [`ClientSettings`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let settings: ClientSettings = serde_json::from_str(json)?;
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(agent) = &settings.user_agent {
            config.user_agent = agent.clone();
        }
        if let Some(secs) = settings.timeout_secs {
            config.timeout =
                Duration::try_from_secs_f64(secs).map_err(|_| Error::InvalidTimeout(secs))?;
        }
        if let Some(max) = settings.max_redirects {
            config.max_redirects = max;
        }
        if settings.cookies {
            config.cookie_jar = Some(Arc::new(MemoryCookieJar::new()));
        }
        Ok(config)
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    pub fn with_max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    /// Value sent as `User-Agent`; empty means the header is not sent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Zero means no timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.cookie_jar.as_ref()
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    pub fn set_user_agent(&mut self, agent: impl Into<String>) {
        self.user_agent = agent.into();
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_cookie_jar(&mut self, jar: Option<Arc<dyn CookieJar>>) {
        self.cookie_jar = jar;
    }

    pub fn set_max_redirects(&mut self, max: u32) {
        self.max_redirects = max;
    }
}

/// Serializable subset of [`ClientConfig`]. Missing fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<f64>,
    pub max_redirects: Option<u32>,
    /// Attach an in-memory cookie jar.
    pub cookies: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.user_agent(), format!("coop-http-core/{}", env!("CARGO_PKG_VERSION")));
        assert_eq!(config.timeout(), Duration::from_secs(180));
        assert_eq!(config.max_redirects(), 7);
        assert!(config.cookie_jar().is_none());
    }

    #[test]
    fn from_json_overrides_given_fields_only() {
        let config =
            ClientConfig::from_json(r#"{"user_agent":"probe/1","timeout_secs":2.5,"cookies":true}"#)
                .unwrap();
        assert_eq!(config.user_agent(), "probe/1");
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.max_redirects(), DEFAULT_MAX_REDIRECTS);
        assert!(config.cookie_jar().is_some());
    }

    #[test]
    fn from_json_rejects_negative_timeout() {
        let err = ClientConfig::from_json(r#"{"timeout_secs":-1}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidTimeout(_)));
    }

    #[test]
    fn from_json_rejects_bad_json() {
        let err = ClientConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::InvalidSettings(_)));
    }

    #[test]
    fn builder_and_setters() {
        let mut config = ClientConfig::new()
            .with_user_agent("a")
            .with_timeout(Duration::ZERO)
            .with_max_redirects(0);
        assert_eq!(config.user_agent(), "a");
        assert!(config.timeout().is_zero());
        config.set_max_redirects(3);
        config.set_cookie_jar(Some(Arc::new(MemoryCookieJar::new())));
        assert_eq!(config.max_redirects(), 3);
        assert!(config.cookie_jar().is_some());
    }
}
