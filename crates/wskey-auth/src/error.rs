//! Error types for WSKey authentication operations

/// Errors from signing, token construction and token exchange.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid arguments when building a key, login URL, token or log template.
    #[error("{0}")]
    Construction(String),

    /// An operation was attempted without the state it needs (bound key,
    /// usable refresh token, signing material).
    #[error("{0}")]
    Precondition(String),

    /// The token is expired and there is no unexpired refresh token to renew it.
    #[error("Sorry you do not have a valid Access Token")]
    TokenUnusable,

    /// Non-2xx answer from the authorization server.
    #[error("{status} {message}")]
    Exchange { status: u16, message: String },

    /// Non-2xx answer whose body claimed to be JSON but did not parse.
    #[error("{status} Malformed JSON in response - {detail}\n{body}")]
    MalformedJson {
        status: u16,
        detail: String,
        body: String,
    },

    /// 2xx answer that cannot populate a token.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl Error {
    /// HTTP status of the exchange that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Exchange { status, .. } | Error::MalformedJson { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
