//! Login URL for the authorization-code flow
//!
//! The user's browser is sent to `authorizeCode` on the authorization server.
//! After login the server redirects back to `redirect_uri` with a `code`
//! parameter, which is then exchanged with `AccessToken::authorization_code`.
//!
//! Leaving out both institution ids produces the "where are you from" variant
//! where the user picks their institution on the login page.

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Optional parts of a login URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginOptions {
    pub authenticating_institution_id: Option<u64>,
    pub context_institution_id: Option<u64>,
    /// Skip the redirect URI and scope checks
    pub test_mode: bool,
}

/// A validated login redirect.
#[derive(Debug, Clone)]
pub struct LoginUrl {
    authorize_endpoint: String,
    client_id: String,
    institutions: Option<(u64, u64)>,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl LoginUrl {
    pub fn new(
        config: &AuthConfig,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        options: LoginOptions,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let redirect_uri = redirect_uri.into();

        if client_id.is_empty() {
            return Err(Error::Construction(
                "You must pass a valid key to construct a login URL".into(),
            ));
        }

        let institutions = match (
            options.authenticating_institution_id,
            options.context_institution_id,
        ) {
            (Some(authenticating), Some(context)) => Some((authenticating, context)),
            (None, Some(_)) => {
                return Err(Error::Construction(
                    "If you pass a contextInstitutionId, you must pass an authenticatingInstitutionId"
                        .into(),
                ));
            }
            (Some(_), None) => {
                return Err(Error::Construction(
                    "If you pass an authenticatingInstitutionId, you must pass a contextInstitutionId"
                        .into(),
                ));
            }
            (None, None) => None,
        };

        if !options.test_mode {
            if redirect_uri.is_empty() {
                return Err(Error::Construction("You must pass a redirectUri".into()));
            }
            if url::Url::parse(&redirect_uri).is_err() {
                return Err(Error::Construction("You must pass a valid redirectUri".into()));
            }
            if scopes.is_empty() {
                return Err(Error::Construction(
                    "You must pass an array of at least one scope".into(),
                ));
            }
        }

        Ok(Self {
            authorize_endpoint: config.authorize_endpoint(),
            client_id,
            institutions,
            redirect_uri,
            scopes,
        })
    }

    /// Render the URL. Only the redirect URI is percent-encoded; scopes are
    /// joined with a literal space.
    pub fn url(&self) -> String {
        let mut url = format!("{}?client_id={}", self.authorize_endpoint, self.client_id);
        if let Some((authenticating, context)) = self.institutions {
            url.push_str(&format!(
                "&authenticatingInstitutionId={authenticating}&contextInstitutionId={context}"
            ));
        }
        url.push_str(&format!(
            "&redirect_uri={}&response_type=code",
            urlencoding::encode(&self.redirect_uri)
        ));
        if !self.scopes.is_empty() {
            url.push_str(&format!("&scope={}", self.scopes.join(" ")));
        }
        url
    }
}
