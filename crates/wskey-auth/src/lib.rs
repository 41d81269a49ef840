//! WSKey authentication library
//!
//! Client side of the WorldShare key scheme: HMAC-signed requests made with
//! an application key (`WsKey`), and OAuth-style access tokens obtained from
//! the authorization server with those signatures. The library has no
//! dependency on the CLI binary and can be used on its own.
//!
//! Token flow:
//! 1. Build a `WsKey` from the client id and secret
//! 2. Either send the user to `WsKey::login_url()` and exchange the returned
//!    code, or use the client credentials grant directly
//! 3. `AccessToken::create()` signs the exchange and populates the token
//! 4. `AccessToken::value(true)` renews an expired token with its refresh
//!    token before handing out the string

pub mod config;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod expiry;
pub mod key;
pub mod log;
pub mod login;
pub mod principal;
pub mod refresh;
pub mod signer;
pub mod token;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::AuthConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use key::WsKey;
pub use log::{DEFAULT_LOG_FORMAT, ExchangeLog};
pub use login::{LoginOptions, LoginUrl};
pub use principal::Principal;
pub use refresh::RefreshToken;
pub use signer::{SignOptions, sign};
pub use token::{AccessToken, GrantType, TokenParams, TokenState};
pub use transport::{ExchangeResponse, HttpTransport, Transport};
