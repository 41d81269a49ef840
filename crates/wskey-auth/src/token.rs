//! Access token lifecycle
//!
//! An `AccessToken` is built for one grant type, validated up front, and
//! populated by exchanging it with the authorization server:
//!
//! ```text
//! Unrequested --create--> Requested --2xx--> Valid --clock--> Expired
//!                             |                 ^               |
//!                             +--error--> Error +----refresh----+
//! ```
//!
//! A failed exchange commits nothing: the token fields stay as they were
//! before the call (cleared, in the refresh case).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::exchange::{self, IssuedToken};
use crate::expiry;
use crate::key::WsKey;
use crate::log::ExchangeLog;
use crate::principal::Principal;
use crate::refresh::RefreshToken;
use crate::signer::SignOptions;
use crate::transport::{HttpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            "refresh_token" => Ok(Self::RefreshToken),
            _ => Err(Error::Construction(
                "You must pass a valid grant type to construct an Access Token".into(),
            )),
        }
    }
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unrequested,
    Requested,
    Valid,
    Expired,
    Error,
}

/// Construction parameters. Which fields are required depends on the grant.
#[derive(Debug, Clone, Default)]
pub struct TokenParams {
    pub code: Option<String>,
    pub authenticating_institution_id: Option<u64>,
    pub context_institution_id: Option<u64>,
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub refresh_token: Option<RefreshToken>,
    /// Previously issued token string; requires `expires_at`
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in: Option<u64>,
    pub key: Option<WsKey>,
    pub log: Option<ExchangeLog>,
    /// Skip the per-grant required field checks
    pub test_mode: bool,
}

impl TokenParams {
    fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.authenticating_institution_id.is_none()
            && self.context_institution_id.is_none()
            && self.redirect_uri.is_none()
            && self.scopes.is_empty()
            && self.refresh_token.is_none()
            && self.access_token.is_none()
            && self.expires_at.is_none()
            && self.expires_in.is_none()
            && self.key.is_none()
            && self.log.is_none()
            && !self.test_mode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unrequested,
    Requested,
    Issued,
    Failed,
}

pub struct AccessToken {
    config: AuthConfig,
    /// Built from `config` on first exchange unless one was supplied
    transport: Option<Arc<dyn Transport>>,
    grant_type: GrantType,
    code: Option<String>,
    authenticating_institution_id: Option<u64>,
    context_institution_id: Option<u64>,
    redirect_uri: Option<String>,
    scopes: Vec<String>,
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    expires_at: Option<DateTime<Utc>>,
    refresh_token: Option<RefreshToken>,
    response: Option<Map<String, Value>>,
    user: Option<Principal>,
    key: Option<WsKey>,
    log: Option<ExchangeLog>,
    status: Status,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("grant_type", &self.grant_type)
            .field("state", &self.state())
            .field("authenticating_institution_id", &self.authenticating_institution_id)
            .field("context_institution_id", &self.context_institution_id)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn new(config: &AuthConfig, grant_type: GrantType, params: TokenParams) -> Result<Self> {
        if params.is_empty() {
            return Err(Error::Construction(
                "You must pass at least one option to construct an Access Token".into(),
            ));
        }
        config.validate()?;
        let code = params.code.filter(|c| !c.is_empty());
        let redirect_uri = params.redirect_uri.filter(|r| !r.is_empty());
        let access_token = params.access_token.filter(|t| !t.is_empty());

        if access_token.is_some() && params.expires_at.is_none() {
            return Err(Error::Construction(
                "You must pass an expires_at when constructing an Access Token from a token string"
                    .into(),
            ));
        }

        if access_token.is_none() && !params.test_mode {
            let institutions = params.authenticating_institution_id.is_some()
                && params.context_institution_id.is_some();
            match grant_type {
                GrantType::AuthorizationCode if code.is_none() => {
                    return Err(Error::Construction(
                        "You must pass a code to construct an Access Token using the authorization_code grant type".into(),
                    ));
                }
                GrantType::AuthorizationCode | GrantType::ClientCredentials
                    if !institutions =>
                {
                    return Err(Error::Construction(
                        "You must pass the options authenticatingInstitutionId and contextInstitutionId to construct an Access Token".into(),
                    ));
                }
                GrantType::ClientCredentials if params.scopes.is_empty() => {
                    return Err(Error::Construction(
                        "You must pass the option scope to construct an Access Token using the client_credentials grant type".into(),
                    ));
                }
                GrantType::RefreshToken if params.refresh_token.is_none() => {
                    return Err(Error::Construction(
                        "You must pass the option refreshToken to construct an Access Token using the refresh_token grant type".into(),
                    ));
                }
                _ => {}
            }
        }

        let status = if access_token.is_some() {
            Status::Issued
        } else {
            Status::Unrequested
        };

        Ok(Self {
            config: config.clone(),
            transport: None,
            grant_type,
            code,
            authenticating_institution_id: params.authenticating_institution_id,
            context_institution_id: params.context_institution_id,
            redirect_uri,
            scopes: params.scopes,
            access_token,
            token_type: None,
            expires_in: params.expires_in,
            expires_at: params.expires_at,
            refresh_token: params.refresh_token,
            response: None,
            user: None,
            key: params.key,
            log: params.log,
            status,
        })
    }

    /// Token for exchanging a login code.
    pub fn authorization_code(
        config: &AuthConfig,
        code: impl Into<String>,
        authenticating_institution_id: u64,
        context_institution_id: u64,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            config,
            GrantType::AuthorizationCode,
            TokenParams {
                code: Some(code.into()),
                authenticating_institution_id: Some(authenticating_institution_id),
                context_institution_id: Some(context_institution_id),
                redirect_uri: Some(redirect_uri.into()),
                ..TokenParams::default()
            },
        )
    }

    /// Token for the client credentials grant.
    pub fn client_credentials(
        config: &AuthConfig,
        authenticating_institution_id: u64,
        context_institution_id: u64,
        scopes: Vec<String>,
    ) -> Result<Self> {
        Self::new(
            config,
            GrantType::ClientCredentials,
            TokenParams {
                authenticating_institution_id: Some(authenticating_institution_id),
                context_institution_id: Some(context_institution_id),
                scopes,
                ..TokenParams::default()
            },
        )
    }

    /// Token to be obtained by redeeming a refresh token.
    pub fn from_refresh_token(config: &AuthConfig, refresh_token: RefreshToken) -> Result<Self> {
        Self::new(
            config,
            GrantType::RefreshToken,
            TokenParams {
                refresh_token: Some(refresh_token),
                ..TokenParams::default()
            },
        )
    }

    /// Replace the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_log(mut self, log: ExchangeLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Token endpoint URL for the current grant. Scopes are joined with a
    /// literal space and only the redirect URI is percent-encoded.
    pub fn request_url(&self) -> String {
        let mut url = format!(
            "{}?grant_type={}",
            self.config.access_token_endpoint(),
            self.grant_type
        );
        let institutions = format!(
            "&authenticatingInstitutionId={}&contextInstitutionId={}",
            optional_id(self.authenticating_institution_id),
            optional_id(self.context_institution_id)
        );
        match self.grant_type {
            GrantType::RefreshToken => {
                let value = self.refresh_token.as_ref().map_or("", RefreshToken::value);
                url.push_str(&format!("&refresh_token={value}"));
            }
            GrantType::AuthorizationCode => {
                url.push_str(&format!(
                    "&code={}{institutions}&redirect_uri={}",
                    self.code.as_deref().unwrap_or_default(),
                    urlencoding::encode(self.redirect_uri.as_deref().unwrap_or_default())
                ));
            }
            GrantType::ClientCredentials => {
                url.push_str(&institutions);
                if !self.scopes.is_empty() {
                    url.push_str(&format!("&scope={}", self.scopes.join(" ")));
                }
            }
        }
        url
    }

    /// Bind `key` (and `user`, if given) and exchange with the server.
    ///
    /// The request is signed with `user` as principal when one is passed.
    pub async fn create(&mut self, key: WsKey, user: Option<Principal>) -> Result<()> {
        self.key = Some(key);
        let signed_for_user = user.is_some();
        if user.is_some() {
            self.user = user;
        }

        let url = self.request_url();
        let principal = if signed_for_user { self.user.as_ref() } else { None };
        let authorization = self.sign_request(&url, principal)?;
        self.exchange(&url, &authorization).await
    }

    /// Redeem the refresh token for a new access token.
    pub async fn refresh(&mut self) -> Result<()> {
        if let Some(reason) = self.refresh_precondition() {
            self.status = Status::Failed;
            warn!(reason, "refresh rejected");
            return Err(Error::Precondition(reason.into()));
        }

        self.grant_type = GrantType::RefreshToken;
        self.access_token = None;
        self.expires_in = None;
        self.expires_at = None;

        let url = self.request_url();
        let authorization = self.sign_request(&url, None)?;
        info!("refreshing access token");
        self.exchange(&url, &authorization).await
    }

    /// Current token string.
    ///
    /// With `auto_refresh`, an expired token is refreshed first; if there is
    /// no unexpired refresh token this fails with `Error::TokenUnusable`
    /// without contacting the server.
    pub async fn value(&mut self, auto_refresh: bool) -> Result<Option<&str>> {
        if auto_refresh && self.is_expired() {
            let refreshable = self
                .refresh_token
                .as_ref()
                .is_some_and(|refresh_token| !refresh_token.is_expired());
            if !refreshable {
                return Err(Error::TokenUnusable);
            }
            self.refresh().await?;
        }
        Ok(self.access_token.as_deref())
    }

    /// Expired, or never given an expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .as_ref()
            .is_none_or(|expires_at| expiry::is_expired_at(expires_at, now))
    }

    pub fn state(&self) -> TokenState {
        match self.status {
            Status::Unrequested => TokenState::Unrequested,
            Status::Requested => TokenState::Requested,
            Status::Failed => TokenState::Error,
            Status::Issued if self.is_expired() => TokenState::Expired,
            Status::Issued => TokenState::Valid,
        }
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn authenticating_institution_id(&self) -> Option<u64> {
        self.authenticating_institution_id
    }

    pub fn context_institution_id(&self) -> Option<u64> {
        self.context_institution_id
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// The issued token string, without any refresh.
    pub fn token_string(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// Decoded body of the last successful exchange.
    pub fn response(&self) -> Option<&Map<String, Value>> {
        self.response.as_ref()
    }

    pub fn user(&self) -> Option<&Principal> {
        self.user.as_ref()
    }

    pub fn key(&self) -> Option<&WsKey> {
        self.key.as_ref()
    }

    pub fn log(&self) -> Option<&ExchangeLog> {
        self.log.as_ref()
    }

    fn transport(&mut self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&self.config)?);
        self.transport = Some(transport.clone());
        Ok(transport)
    }

    /// Why a refresh cannot be attempted, if it cannot.
    fn refresh_precondition(&self) -> Option<&'static str> {
        if self.key.is_none() {
            return Some("AccessToken must have an associated WSKey Property");
        }
        match &self.refresh_token {
            None => Some("AccessToken has no refresh token"),
            Some(refresh_token) if refresh_token.is_expired() => Some("Refresh token has expired"),
            Some(_) => None,
        }
    }

    fn sign_request(&self, url: &str, principal: Option<&Principal>) -> Result<String> {
        let key = self.key.as_ref().ok_or_else(|| {
            Error::Precondition("AccessToken must have an associated WSKey Property".into())
        })?;
        let options = SignOptions {
            principal,
            ..SignOptions::default()
        };
        key.hmac_signature("POST", url, &options)
    }

    async fn exchange(&mut self, url: &str, authorization: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::Precondition(format!("invalid token request URL {url}: {e}")))?;

        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(e) => {
                self.status = Status::Failed;
                return Err(e);
            }
        };

        self.status = Status::Requested;
        debug!(grant_type = %self.grant_type, url = %parsed, "requesting access token");

        let response = match transport.post(&parsed, authorization).await {
            Ok(response) => response,
            Err(e) => {
                self.status = Status::Failed;
                warn!(grant_type = %self.grant_type, error = %e, "token request failed");
                return Err(e);
            }
        };

        if let Some(log) = &self.log {
            log.emit("POST", parsed.as_str(), response.status);
        }

        match exchange::interpret(&response, Utc::now()) {
            Ok(issued) => {
                self.commit(issued);
                self.status = Status::Issued;
                info!(
                    grant_type = %self.grant_type,
                    expires_at = ?self.expires_at,
                    refreshable = self.refresh_token.is_some(),
                    "access token issued"
                );
                Ok(())
            }
            Err(e) => {
                self.status = Status::Failed;
                warn!(grant_type = %self.grant_type, status = response.status, error = %e, "token exchange rejected");
                Err(e)
            }
        }
    }

    fn commit(&mut self, issued: IssuedToken) {
        self.access_token = Some(issued.access_token);
        self.token_type = issued.token_type;
        self.expires_in = issued.expires_in;
        self.expires_at = Some(issued.expires_at);
        if issued.context_institution_id.is_some() {
            self.context_institution_id = issued.context_institution_id;
        }
        if let Some((principal_id, principal_id_ns)) = issued.principal {
            self.user = Some(Principal::from_response(
                self.authenticating_institution_id,
                principal_id,
                principal_id_ns,
            ));
        }
        if issued.refresh_token.is_some() {
            self.refresh_token = issued.refresh_token;
        }
        self.response = Some(issued.raw);
    }
}

fn optional_id(id: Option<u64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}
