//! Token endpoint response interpretation
//!
//! A 2xx body is parsed into an `IssuedToken` without touching any access
//! token; the caller commits it in one step, so a bad response never leaves
//! a token half-updated.
//!
//! Non-2xx bodies become `Error::Exchange` (`"<status> <message>"`), or
//! `Error::MalformedJson` when a non-HTML body fails to parse.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::expiry;
use crate::refresh::RefreshToken;
use crate::transport::ExchangeResponse;

/// Fields of a successful exchange, ready to be committed to a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub expires_at: DateTime<Utc>,
    pub context_institution_id: Option<u64>,
    /// `(principalID, principalIDNS)`
    pub principal: Option<(String, String)>,
    pub refresh_token: Option<RefreshToken>,
    pub raw: Map<String, Value>,
}

/// Turn an exchange response into an issued token or the matching error.
pub fn interpret(response: &ExchangeResponse, now: DateTime<Utc>) -> Result<IssuedToken> {
    if response.is_success() {
        parse_success(&response.body, now)
    } else {
        Err(parse_failure(
            response.status,
            response.content_type.as_deref(),
            &response.body,
        ))
    }
}

/// Parse a 2xx token response body.
///
/// `expires_at` is trusted as sent when present and parseable; otherwise it
/// is computed as `now + expires_in`.
pub fn parse_success(body: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
    let raw: Map<String, Value> = serde_json::from_str(body)
        .map_err(|e| Error::InvalidResponse(format!("body is not a JSON object: {e}")))?;

    let access_token = non_empty_str(&raw, "access_token")
        .ok_or_else(|| Error::InvalidResponse("missing access_token".into()))?
        .to_string();
    let token_type = non_empty_str(&raw, "token_type").map(str::to_owned);
    let expires_in = raw.get("expires_in").and_then(as_u64);
    let expires_at = resolve_expiry(&raw, "expires_at", expires_in, now)
        .ok_or_else(|| Error::InvalidResponse("access token has no usable expiry".into()))?;

    let context_institution_id = raw.get("contextInstitutionId").and_then(as_u64);

    let principal = match (
        non_empty_str(&raw, "principalID"),
        non_empty_str(&raw, "principalIDNS"),
    ) {
        (Some(id), Some(ns)) => Some((id.to_string(), ns.to_string())),
        _ => None,
    };

    let refresh_token = match non_empty_str(&raw, "refresh_token") {
        Some(value) => {
            let rt_expires_in = raw.get("refresh_token_expires_in").and_then(as_u64);
            let rt_expires_at =
                resolve_expiry(&raw, "refresh_token_expires_at", rt_expires_in, now).ok_or_else(
                    || Error::InvalidResponse("refresh token has no usable expiry".into()),
                )?;
            let rt_expires_in = rt_expires_in
                .unwrap_or_else(|| (rt_expires_at - now).num_seconds().max(0) as u64);
            Some(
                RefreshToken::new(value, rt_expires_in, rt_expires_at)
                    .map_err(|e| Error::InvalidResponse(e.to_string()))?,
            )
        }
        None => None,
    };

    Ok(IssuedToken {
        access_token,
        token_type,
        expires_in,
        expires_at,
        context_institution_id,
        principal,
        refresh_token,
        raw,
    })
}

/// Build the error for a non-2xx response.
///
/// HTML bodies carry no message. Anything else must be JSON; the message is
/// taken from `message`, then `error.errorMessage`, then `error` as a string.
pub fn parse_failure(status: u16, content_type: Option<&str>, body: &str) -> Error {
    if content_type.is_some_and(is_html) {
        return Error::Exchange {
            status,
            message: String::new(),
        };
    }

    match serde_json::from_str::<Value>(body) {
        Ok(json) => Error::Exchange {
            status,
            message: error_message(&json),
        },
        Err(e) => Error::MalformedJson {
            status,
            detail: e.to_string(),
            body: body.to_string(),
        },
    }
}

fn error_message(json: &Value) -> String {
    if let Some(message) = json.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    match json.get("error") {
        Some(Value::Object(error)) => error
            .get("errorMessage")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(error)) => error.clone(),
        _ => String::new(),
    }
}

fn is_html(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("text/html"))
}

fn resolve_expiry(
    raw: &Map<String, Value>,
    field: &str,
    expires_in: Option<u64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if let Some(reported) = non_empty_str(raw, field) {
        match expiry::parse_timestamp(reported) {
            Some(at) => return Some(at),
            None => warn!(field, value = reported, "unparseable expiry, using relative lifetime"),
        }
    }
    expiry::expires_after(now, expires_in?)
}

fn non_empty_str<'a>(raw: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 8, 23, 17, 45, 30).unwrap()
    }

    const FULL_RESPONSE: &str = r#"{
        "access_token": "tk_Yebz4BpEp9dAsghA7KpWx6dYD1OZKWBlHjqW",
        "token_type": "bearer",
        "expires_in": "3599",
        "principalID": "8eaa9f92-3951-431c-975a-e5dt26b7d232",
        "principalIDNS": "urn:oclc:wms:da",
        "contextInstitutionId": "128807",
        "expires_at": "2018-08-23 18:45:29Z",
        "refresh_token": "rt_239308230",
        "refresh_token_expires_in": 604799,
        "refresh_token_expires_at": "2018-08-30 17:45:29Z"
    }"#;

    #[test]
    fn parses_full_response() {
        let issued = parse_success(FULL_RESPONSE, now()).unwrap();
        assert_eq!(issued.access_token, "tk_Yebz4BpEp9dAsghA7KpWx6dYD1OZKWBlHjqW");
        assert_eq!(issued.token_type.as_deref(), Some("bearer"));
        assert_eq!(issued.expires_in, Some(3599));
        assert_eq!(
            issued.expires_at,
            Utc.with_ymd_and_hms(2018, 8, 23, 18, 45, 29).unwrap()
        );
        assert_eq!(issued.context_institution_id, Some(128807));
        assert_eq!(
            issued.principal,
            Some((
                "8eaa9f92-3951-431c-975a-e5dt26b7d232".to_string(),
                "urn:oclc:wms:da".to_string()
            ))
        );
        let rt = issued.refresh_token.unwrap();
        assert_eq!(rt.value(), "rt_239308230");
        assert_eq!(rt.expires_in(), 604799);
        assert_eq!(
            rt.expires_at(),
            Utc.with_ymd_and_hms(2018, 8, 30, 17, 45, 29).unwrap()
        );
        assert_eq!(issued.raw["token_type"], "bearer");
    }

    #[test]
    fn missing_refresh_fields_yield_no_refresh_token() {
        let body = r#"{"access_token":"tk_1","token_type":"bearer","expires_in":3599,"expires_at":"2018-08-23 18:45:29Z"}"#;
        let issued = parse_success(body, now()).unwrap();
        assert!(issued.refresh_token.is_none());
        assert!(issued.principal.is_none());
        assert!(issued.context_institution_id.is_none());
    }

    #[test]
    fn expiry_is_derived_when_server_omits_it() {
        let body = r#"{"access_token":"tk_1","token_type":"bearer","expires_in":1200}"#;
        let issued = parse_success(body, now()).unwrap();
        assert_eq!(
            issued.expires_at,
            Utc.with_ymd_and_hms(2018, 8, 23, 18, 5, 30).unwrap()
        );
    }

    #[test]
    fn unparseable_expiry_falls_back_to_lifetime() {
        let body = r#"{"access_token":"tk_1","expires_in":60,"expires_at":"someday"}"#;
        let issued = parse_success(body, now()).unwrap();
        assert_eq!(issued.expires_at, now() + chrono::TimeDelta::seconds(60));
    }

    #[test]
    fn token_without_any_expiry_is_invalid() {
        let body = r#"{"access_token":"tk_1","token_type":"bearer"}"#;
        assert!(matches!(
            parse_success(body, now()),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn principal_needs_both_fields() {
        let body = r#"{"access_token":"tk_1","expires_in":60,"principalID":"p"}"#;
        assert!(parse_success(body, now()).unwrap().principal.is_none());
    }

    #[test]
    fn refresh_expiry_derived_from_lifetime() {
        let body = r#"{"access_token":"tk_1","expires_in":60,"refresh_token":"rt_1","refresh_token_expires_in":"600"}"#;
        let rt = parse_success(body, now()).unwrap().refresh_token.unwrap();
        assert_eq!(rt.expires_in(), 600);
        assert_eq!(rt.expires_at(), now() + chrono::TimeDelta::seconds(600));
    }

    #[test]
    fn refresh_token_without_expiry_is_invalid() {
        let body = r#"{"access_token":"tk_1","expires_in":60,"refresh_token":"rt_1"}"#;
        assert!(parse_success(body, now()).is_err());
    }

    #[test]
    fn success_without_access_token_is_invalid() {
        assert!(matches!(
            parse_success(r#"{"expires_in":60}"#, now()),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_success("<html/>", now()),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn failure_message_from_message_field() {
        let err = parse_failure(
            401,
            Some("application/json"),
            r#"{"message":"WSKey test is invalid","detail":"Authorization header: ..."}"#,
        );
        assert_eq!(err.to_string(), "401 WSKey test is invalid");
    }

    #[test]
    fn failure_message_from_nested_error() {
        let err = parse_failure(
            403,
            Some("application/json;charset=UTF-8"),
            r#"{"error":{"errorCode":"unauthorized_client","errorMessage":"unauthorized_client"}}"#,
        );
        assert_eq!(err.to_string(), "403 unauthorized_client");
    }

    #[test]
    fn failure_message_from_error_string() {
        let err = parse_failure(403, None, r#"{"error":"unauthorized_client"}"#);
        assert_eq!(err.to_string(), "403 unauthorized_client");
    }

    #[test]
    fn failure_without_known_fields_has_empty_message() {
        let err = parse_failure(401, Some("application/json"), r#"{"code":401}"#);
        assert!(matches!(&err, Error::Exchange { status: 401, message } if message.is_empty()));
    }

    #[test]
    fn html_failure_has_empty_message() {
        let err = parse_failure(401, Some("text/html; charset=utf-8"), "<html>denied</html>");
        assert!(matches!(&err, Error::Exchange { status: 401, message } if message.is_empty()));
        assert_eq!(err.to_string(), "401 ");
    }

    #[test]
    fn xml_failure_is_malformed_json() {
        let body = "<?xml version=\"1.0\"?><error><code>401</code></error>";
        let err = parse_failure(401, Some("application/xml"), body);
        match &err {
            Error::MalformedJson {
                status,
                detail,
                body: raw,
            } => {
                assert_eq!(*status, 401);
                assert!(!detail.is_empty());
                assert_eq!(raw, body);
            }
            other => panic!("expected malformed JSON, got {other:?}"),
        }
        assert!(err
            .to_string()
            .starts_with("401 Malformed JSON in response - "));
    }

    #[test]
    fn interpret_dispatches_on_status() {
        let ok = ExchangeResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: FULL_RESPONSE.into(),
        };
        assert!(interpret(&ok, now()).is_ok());

        let denied = ExchangeResponse {
            status: 401,
            content_type: Some("text/html".into()),
            body: String::new(),
        };
        assert_eq!(interpret(&denied, now()).unwrap_err().status(), Some(401));
    }
}
