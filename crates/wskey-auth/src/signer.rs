//! HMAC request signing
//!
//! Produces the value of an `Authorization` header that authenticates a
//! single outbound request with a WSKey and its secret, independent of any
//! bearer token.
//!
//! The signed base string is the "normalized request":
//!
//! ```text
//! <key id>\n<timestamp>\n<nonce>\n<body hash (empty)>\n<METHOD>\n
//! www.oclc.org\n443\n/wskey\n<name=value>\n...
//! ```
//!
//! where the trailing lines are the request's query parameters, decoded,
//! sorted, and re-encoded RFC 3986 style. The principal and extra auth params
//! ride along in the header but are not signed; neither is the body.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngExt;
use sha2::Sha256;

use crate::constants::{HMAC_SCHEME, SIGNATURE_HOST, SIGNATURE_PATH, SIGNATURE_PORT};
use crate::error::{Error, Result};
use crate::principal::Principal;

type HmacSha256 = Hmac<Sha256>;

/// Per-call signing options.
#[derive(Debug, Clone, Default)]
pub struct SignOptions<'a> {
    /// User on whose behalf the request is made
    pub principal: Option<&'a Principal>,
    /// Extra `name="value"` pairs appended to the header, in order
    pub auth_params: Vec<(String, String)>,
    /// Fixed Unix timestamp instead of the current time
    pub timestamp: Option<i64>,
    /// Fixed nonce instead of a random one
    pub nonce: Option<String>,
}

impl<'a> SignOptions<'a> {
    pub fn with_principal(mut self, principal: &'a Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_auth_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_params.push((name.into(), value.into()));
        self
    }
}

/// Compute the `Authorization` header value for `method url`.
///
/// Fails only when the key id or secret is empty.
pub fn sign(
    method: &str,
    url: &str,
    key_id: &str,
    secret: &str,
    options: &SignOptions<'_>,
) -> Result<String> {
    if key_id.is_empty() || secret.is_empty() {
        return Err(Error::Precondition(
            "You must pass a valid key and secret to sign a request".into(),
        ));
    }

    let timestamp = options.timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let nonce = options.nonce.clone().unwrap_or_else(generate_nonce);

    let base = normalize_request(key_id, timestamp, &nonce, method, url);
    let signature = compute_signature(secret.as_bytes(), &base)?;

    let mut header = format!(
        "{HMAC_SCHEME} clientId=\"{key_id}\", timestamp=\"{timestamp}\", nonce=\"{nonce}\", signature=\"{signature}\""
    );
    if let Some(principal) = options.principal {
        header.push_str(&format!(
            ", principalID=\"{}\", principalIDNS=\"{}\"",
            escape_quoted(principal.principal_id()),
            escape_quoted(principal.principal_id_ns())
        ));
    }
    for (name, value) in &options.auth_params {
        header.push_str(&format!(", {name}=\"{}\"", escape_quoted(value)));
    }
    Ok(header)
}

/// Backslash-escape `\` and `"` so a value stays inside its quoted string.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Random 8-hex-digit nonce. Unique per signature, not secret.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 4];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Build the canonical string that gets signed.
pub fn normalize_request(
    key_id: &str,
    timestamp: i64,
    nonce: &str,
    method: &str,
    url: &str,
) -> String {
    let mut normalized = format!(
        "{key_id}\n{timestamp}\n{nonce}\n\n{method}\n{SIGNATURE_HOST}\n{SIGNATURE_PORT}\n{SIGNATURE_PATH}\n"
    );
    for (name, value) in query_params(url) {
        normalized.push_str(&format!(
            "{}={}\n",
            urlencoding::encode(&name),
            urlencoding::encode(&value)
        ));
    }
    normalized
}

/// `base64(HMAC-SHA256(secret, base))`
pub fn compute_signature(secret: &[u8], base: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| Error::Precondition(format!("invalid signing secret: {e}")))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Decoded query parameters, sorted by name then value.
fn query_params(url: &str) -> Vec<(String, String)> {
    let url = url.split_once('#').map_or(url, |(head, _)| head);
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect();
    params.sort();
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR_SIGNATURE: &str = "y0avD+LN2+UwehWjnezKgtECVcpD6a9ff7HBldQfKUQ=";

    fn fixed<'a>() -> SignOptions<'a> {
        SignOptions {
            timestamp: Some(1386968102),
            nonce: Some("2382dbb7".into()),
            ..Default::default()
        }
    }

    fn signature_of(header: &str) -> &str {
        let start = header.find("signature=\"").unwrap() + "signature=\"".len();
        let end = header[start..].find('"').unwrap();
        &header[start..start + end]
    }

    #[test]
    fn known_vector_without_principal() {
        let header = sign("GET", "http://www.oclc.org/test", "test", "secret", &fixed()).unwrap();
        assert_eq!(
            header,
            format!(
                "http://www.worldcat.org/wskey/v2/hmac/v1 clientId=\"test\", timestamp=\"1386968102\", nonce=\"2382dbb7\", signature=\"{VECTOR_SIGNATURE}\""
            )
        );
    }

    #[test]
    fn principal_is_appended_but_not_signed() {
        let user = Principal::new(128807, "principalID", "principalIDNS");
        let options = fixed().with_principal(&user);
        let header = sign("GET", "http://www.oclc.org/test", "test", "secret", &options).unwrap();
        assert_eq!(
            header,
            format!(
                "http://www.worldcat.org/wskey/v2/hmac/v1 clientId=\"test\", timestamp=\"1386968102\", nonce=\"2382dbb7\", signature=\"{VECTOR_SIGNATURE}\", principalID=\"principalID\", principalIDNS=\"principalIDNS\""
            )
        );
    }

    #[test]
    fn extra_auth_params_follow_principal_in_order() {
        let user = Principal::new(128807, "principalID", "principalIDNS");
        let options = fixed()
            .with_principal(&user)
            .with_auth_param("username", "testuser")
            .with_auth_param("agent", "desk-1");
        let header = sign("GET", "http://www.oclc.org/test", "test", "secret", &options).unwrap();
        assert!(header.ends_with(
            "principalID=\"principalID\", principalIDNS=\"principalIDNS\", username=\"testuser\", agent=\"desk-1\""
        ));
        assert_eq!(signature_of(&header), VECTOR_SIGNATURE);
    }

    #[test]
    fn quotes_and_backslashes_in_values_are_escaped() {
        let user = Principal::new(128807, "a\"b", "urn:ns\\x");
        let options = fixed()
            .with_principal(&user)
            .with_auth_param("note", "say \"hi\"");
        let header = sign("GET", "http://www.oclc.org/test", "test", "secret", &options).unwrap();
        assert!(header.ends_with(
            "principalID=\"a\\\"b\", principalIDNS=\"urn:ns\\\\x\", note=\"say \\\"hi\\\"\""
        ));
        assert_eq!(signature_of(&header), VECTOR_SIGNATURE);
    }

    #[test]
    fn same_inputs_same_header() {
        let a = sign("POST", "https://example.org/a?x=1", "k", "s", &fixed()).unwrap();
        let b = sign("POST", "https://example.org/a?x=1", "k", "s", &fixed()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn changing_any_input_changes_signature() {
        let url = "http://www.oclc.org/test";
        let base = sign("GET", url, "test", "secret", &fixed()).unwrap();
        let base_sig = signature_of(&base).to_string();

        let other_nonce = SignOptions {
            nonce: Some("2382dbb8".into()),
            ..fixed()
        };
        let other_time = SignOptions {
            timestamp: Some(1386968103),
            ..fixed()
        };
        let variants = [
            sign("POST", url, "test", "secret", &fixed()).unwrap(),
            sign("GET", url, "test2", "secret", &fixed()).unwrap(),
            sign("GET", url, "test", "secret2", &fixed()).unwrap(),
            sign("GET", "http://www.oclc.org/test?a=1", "test", "secret", &fixed()).unwrap(),
            sign("GET", url, "test", "secret", &other_nonce).unwrap(),
            sign("GET", url, "test", "secret", &other_time).unwrap(),
        ];
        for header in &variants {
            assert_ne!(signature_of(header), base_sig, "header: {header}");
        }
    }

    #[test]
    fn empty_key_or_secret_is_rejected() {
        let err = sign("GET", "http://x", "", "secret", &fixed()).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        let err = sign("GET", "http://x", "test", "", &fixed()).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn normalized_request_sorts_and_encodes_query() {
        let normalized = normalize_request(
            "test",
            1386968102,
            "2382dbb7",
            "POST",
            "https://authn.sd00.worldcat.org/oauth2/accessToken?grant_type=client_credentials&scope=WMS_NCIP WMS_ACQ&authenticatingInstitutionId=128807&contextInstitutionId=128807",
        );
        assert_eq!(
            normalized,
            "test\n1386968102\n2382dbb7\n\nPOST\nwww.oclc.org\n443\n/wskey\n\
             authenticatingInstitutionId=128807\n\
             contextInstitutionId=128807\n\
             grant_type=client_credentials\n\
             scope=WMS_NCIP%20WMS_ACQ\n"
        );
    }

    #[test]
    fn encoded_and_raw_query_normalize_identically() {
        let raw = normalize_request("k", 1, "n", "GET", "http://h/p?redirect_uri=http://a.b/c d");
        let encoded = normalize_request(
            "k",
            1,
            "n",
            "GET",
            "http://h/p?redirect_uri=http%3A%2F%2Fa.b%2Fc+d",
        );
        assert_eq!(raw, encoded);
        assert!(raw.ends_with("redirect_uri=http%3A%2F%2Fa.b%2Fc%20d\n"));
    }

    #[test]
    fn fragment_is_ignored() {
        let with_fragment = normalize_request("k", 1, "n", "GET", "http://h/p?a=1#frag");
        let without = normalize_request("k", 1, "n", "GET", "http://h/p?a=1");
        assert_eq!(with_fragment, without);
    }

    #[test]
    fn nonce_is_eight_hex_digits() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 8);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_headers_differ_between_calls() {
        let a = sign("GET", "http://x", "k", "s", &SignOptions::default()).unwrap();
        let b = sign("GET", "http://x", "k", "s", &SignOptions::default()).unwrap();
        assert_ne!(a, b, "random nonces must not collide");
    }
}
