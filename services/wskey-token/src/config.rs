//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The key secret is loaded from the WSKEY_SECRET env var or secret_file,
//! never stored in the TOML directly to avoid leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wskey_auth::{AuthConfig, ExchangeLog, Principal, WsKey};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub key: KeyConfig,
    #[serde(default)]
    pub server: AuthConfig,
    pub institution: InstitutionConfig,
    #[serde(default)]
    pub principal: Option<PrincipalConfig>,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

/// Application credential
#[derive(Debug, Deserialize)]
pub struct KeyConfig {
    pub id: String,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    /// Path to a file containing the secret (alternative to WSKEY_SECRET env var)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

/// Institutions the tokens are requested for
#[derive(Debug, Deserialize)]
pub struct InstitutionConfig {
    pub authenticating_id: u64,
    pub context_id: u64,
}

/// User to act on behalf of
#[derive(Debug, Deserialize)]
pub struct PrincipalConfig {
    pub id: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    wskey_auth::DEFAULT_LOG_FORMAT.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order:
    /// 1. WSKEY_SECRET env var
    /// 2. secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.key.id.is_empty() {
            return Err(common::Error::Config("key.id must not be empty".into()));
        }

        if !config.server.authorization_server.starts_with("http://")
            && !config.server.authorization_server.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "authorization_server must start with http:// or https://, got: {}",
                config.server.authorization_server
            )));
        }

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        config
            .server
            .validate()
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if let Ok(secret) = std::env::var("WSKEY_SECRET") {
            config.key.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.key.secret_file {
            config.key.secret = Secret::from_file(secret_file)?;
        }

        if config.key.secret.is_none() {
            return Err(common::Error::Config(
                "no key secret: set WSKEY_SECRET or key.secret_file".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("wskey-token.toml")
    }

    /// Build the credential described by `[key]`.
    pub fn wskey(&self) -> wskey_auth::Result<WsKey> {
        let secret = self
            .key
            .secret
            .as_ref()
            .map(|s| s.expose().clone())
            .unwrap_or_default();
        let mut key = WsKey::new(self.key.id.as_str(), secret)?;
        if let Some(ref redirect_uri) = self.key.redirect_uri {
            key = key.with_redirect_uri(redirect_uri.as_str())?;
        }
        if !self.key.services.is_empty() {
            key = key.with_services(self.key.services.clone())?;
        }
        Ok(key)
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.as_ref().map(|p| {
            Principal::new(
                self.institution.authenticating_id,
                p.id.as_str(),
                p.namespace.as_str(),
            )
        })
    }

    pub fn exchange_log(&self) -> wskey_auth::Result<Option<ExchangeLog>> {
        self.log
            .as_ref()
            .map(|log| ExchangeLog::new(log.format.as_str()))
            .transpose()
    }
}
