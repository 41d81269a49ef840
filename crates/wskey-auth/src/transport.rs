//! HTTP transport for token exchanges
//!
//! `Transport` is the seam between the token lifecycle and the network. The
//! default `HttpTransport` wraps a `reqwest::Client` configured from
//! `AuthConfig`; tests and embedding applications can supply their own.
//!
//! Uses `Pin<Box<dyn Future>>` return types so the trait stays object-safe
//! (`Arc<dyn Transport>`).

use std::future::Future;
use std::pin::Pin;

use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// What the core needs back from an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl ExchangeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    /// POST to `url` with the given `Authorization` value and no body.
    fn post<'a>(
        &'a self,
        url: &'a Url,
        authorization: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeResponse>> + Send + 'a>>;
}

/// reqwest-backed transport.
///
/// Sends `Accept: application/json` and the configured `User-Agent`, bounds
/// every call with the configured timeout, and refuses redirects that leave
/// http(s) or downgrade https to http.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Fails with `Error::Construction` when `test_server` is set for the
    /// production host.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .redirect(redirect_policy());

        if config.test_server {
            warn!(
                server = %config.authorization_server,
                "test server mode: TLS certificate verification disabled"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Construction(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        url: &'a Url,
        authorization: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(url.clone())
                .header(AUTHORIZATION, authorization)
                .header(ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response
                .text()
                .await
                .map_err(|e| Error::Http(format!("reading token response body: {e}")))?;

            debug!(status, content_type = ?content_type, bytes = body.len(), "token endpoint responded");
            Ok(ExchangeResponse {
                status,
                content_type,
                body,
            })
        })
    }
}

fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
        }
        let refusal = redirect_refusal(attempt.previous().last(), attempt.url());
        match refusal {
            Some(reason) => attempt.error(reason),
            None => attempt.follow(),
        }
    })
}

/// Reason to refuse a redirect from `previous` to `next`, if any.
fn redirect_refusal(previous: Option<&Url>, next: &Url) -> Option<String> {
    let next_scheme = next.scheme();
    if next_scheme != "http" && next_scheme != "https" {
        return Some(format!("refusing redirect to {next_scheme} URL"));
    }
    match previous.map(Url::scheme) {
        Some("https") if next_scheme == "http" => {
            Some("refusing redirect from https to http".to_string())
        }
        _ => None,
    }
}
