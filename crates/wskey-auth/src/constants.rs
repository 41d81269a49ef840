//! WSKey wire constants
//!
//! Fixed values of the WorldCat authorization protocol. The server URL here is
//! only the default for `AuthConfig`; nothing reads it as a global.

/// Production authorization server (token and login endpoints live under it)
pub const AUTHORIZATION_SERVER: &str = "https://authn.sd00.worldcat.org/oauth2";

/// Path of the token exchange endpoint, relative to the authorization server
pub const ACCESS_TOKEN_PATH: &str = "/accessToken";

/// Path of the browser login endpoint, relative to the authorization server
pub const AUTHORIZE_CODE_PATH: &str = "/authorizeCode";

/// Default `User-Agent` sent on token exchanges
pub const USER_AGENT: &str = "wskey-auth-rs";

/// Default exchange timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Scheme identifier that prefixes every HMAC `Authorization` header value
pub const HMAC_SCHEME: &str = "http://www.worldcat.org/wskey/v2/hmac/v1";

// The signature covers these constants, not the actual request target.

/// Host every request is normalized to before signing
pub const SIGNATURE_HOST: &str = "www.oclc.org";

/// Port every request is normalized to before signing
pub const SIGNATURE_PORT: &str = "443";

/// Path every request is normalized to before signing
pub const SIGNATURE_PATH: &str = "/wskey";
