//! Client configuration
//!
//! Everything that used to be process-wide (server URL, test-server flag,
//! user agent) is carried explicitly in `AuthConfig` and handed to each
//! constructor, so differently configured clients can coexist.

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{
    ACCESS_TOKEN_PATH, AUTHORIZATION_SERVER, AUTHORIZE_CODE_PATH, DEFAULT_TIMEOUT_SECS, USER_AGENT,
};
use crate::error::{Error, Result};

/// Immutable settings for talking to the authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the authorization server, without a trailing slash
    pub authorization_server: String,
    /// Non-production server: TLS certificate verification is disabled
    pub test_server: bool,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authorization_server: AUTHORIZATION_SERVER.to_string(),
            test_server: false,
            user_agent: USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AuthConfig {
    /// Config pointing at another authorization server, defaults otherwise.
    pub fn with_server(authorization_server: impl Into<String>) -> Self {
        Self {
            authorization_server: authorization_server.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn access_token_endpoint(&self) -> String {
        format!("{}{ACCESS_TOKEN_PATH}", self.server_base())
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}{AUTHORIZE_CODE_PATH}", self.server_base())
    }

    /// Whether the configured server is the production authorization host.
    pub fn is_production(&self) -> bool {
        match (
            url::Url::parse(&self.authorization_server),
            url::Url::parse(AUTHORIZATION_SERVER),
        ) {
            (Ok(configured), Ok(production)) => {
                configured.host_str().map(str::to_ascii_lowercase).as_deref()
                    == production.host_str()
            }
            _ => self.server_base() == AUTHORIZATION_SERVER,
        }
    }

    /// Reject settings that cannot be used safely.
    ///
    /// `test_server` turns off certificate verification, so it is refused
    /// for the production host.
    pub fn validate(&self) -> Result<()> {
        if self.test_server && self.is_production() {
            return Err(Error::Construction(format!(
                "test_server cannot be enabled for the production authorization server {}",
                self.authorization_server
            )));
        }
        Ok(())
    }

    fn server_base(&self) -> &str {
        self.authorization_server.trim_end_matches('/')
    }
}
