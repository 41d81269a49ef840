//! Application credential (WSKey)
//!
//! A `WsKey` is the client id and secret an application was issued, plus the
//! redirect URI and services it was registered for. It signs requests
//! directly and is the entry point for the login URL and both token grants.

use common::Secret;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::login::{LoginOptions, LoginUrl};
use crate::principal::Principal;
use crate::signer::{self, SignOptions};
use crate::token::AccessToken;

#[derive(Debug, Clone)]
pub struct WsKey {
    key: String,
    secret: Secret<String>,
    redirect_uri: Option<String>,
    services: Vec<String>,
    debug_timestamp: Option<i64>,
    debug_nonce: Option<String>,
}

impl WsKey {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let secret = secret.into();
        if key.is_empty() || secret.is_empty() {
            return Err(Error::Construction(
                "You must pass a valid key and secret to construct a WSKey".into(),
            ));
        }
        Ok(Self {
            key,
            secret: Secret::new(secret),
            redirect_uri: None,
            services: Vec::new(),
            debug_timestamp: None,
            debug_nonce: None,
        })
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Result<Self> {
        let redirect_uri = redirect_uri.into();
        if url::Url::parse(&redirect_uri).is_err() {
            return Err(Error::Construction(
                "You must pass a valid redirectUri".into(),
            ));
        }
        self.redirect_uri = Some(redirect_uri);
        Ok(self)
    }

    pub fn with_services(mut self, services: Vec<String>) -> Result<Self> {
        if services.is_empty() {
            return Err(Error::Construction(
                "You must pass an array of at least one service".into(),
            ));
        }
        self.services = services;
        Ok(self)
    }

    /// Sign every request with this timestamp. For reproducible signatures.
    pub fn with_debug_timestamp(mut self, timestamp: i64) -> Self {
        self.debug_timestamp = Some(timestamp);
        self
    }

    /// Sign every request with this nonce. For reproducible signatures.
    pub fn with_debug_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.debug_nonce = Some(nonce.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        self.secret.expose()
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// `Authorization` header value for `method url`.
    ///
    /// Debug timestamp and nonce apply unless the options already fix them.
    pub fn hmac_signature(
        &self,
        method: &str,
        url: &str,
        options: &SignOptions<'_>,
    ) -> Result<String> {
        let mut options = options.clone();
        if options.timestamp.is_none() {
            options.timestamp = self.debug_timestamp;
        }
        if options.nonce.is_none() {
            options.nonce = self.debug_nonce.clone();
        }
        signer::sign(method, url, &self.key, self.secret.expose(), &options)
    }

    /// Login redirect for the authorization-code flow, using this key's
    /// redirect URI and services.
    pub fn login_url(
        &self,
        config: &AuthConfig,
        authenticating_institution_id: Option<u64>,
        context_institution_id: Option<u64>,
    ) -> Result<String> {
        let login = LoginUrl::new(
            config,
            self.key.as_str(),
            self.redirect_uri.clone().unwrap_or_default(),
            self.services.clone(),
            LoginOptions {
                authenticating_institution_id,
                context_institution_id,
                test_mode: false,
            },
        )?;
        Ok(login.url())
    }

    /// Exchange an authorization code for an access token.
    pub async fn access_token_with_auth_code(
        &self,
        config: &AuthConfig,
        code: &str,
        authenticating_institution_id: u64,
        context_institution_id: u64,
        user: Option<Principal>,
    ) -> Result<AccessToken> {
        let redirect_uri = self.redirect_uri.as_deref().ok_or_else(|| {
            Error::Precondition("You must pass a redirectUri".into())
        })?;
        let mut token = AccessToken::authorization_code(
            config,
            code,
            authenticating_institution_id,
            context_institution_id,
            redirect_uri,
        )?;
        token.create(self.clone(), user).await?;
        Ok(token)
    }

    /// Obtain an access token with the client credentials grant.
    pub async fn access_token_with_client_credentials(
        &self,
        config: &AuthConfig,
        authenticating_institution_id: u64,
        context_institution_id: u64,
        user: Option<Principal>,
    ) -> Result<AccessToken> {
        let mut token = AccessToken::client_credentials(
            config,
            authenticating_institution_id,
            context_institution_id,
            self.services.clone(),
        )?;
        token.create(self.clone(), user).await?;
        Ok(token)
    }
}
