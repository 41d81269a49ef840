//! Per-exchange log lines
//!
//! A token can carry an `ExchangeLog`; each exchange with the authorization
//! server then emits one line rendered from the template through `tracing`.
//!
//! Placeholders: `{method}`, `{uri}`, `{code}`, `{request}` (method and URI)
//! and `{response}` (status code).

use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_LOG_FORMAT: &str = "Request: {request} Response: {response}";

const PLACEHOLDERS: [&str; 5] = ["method", "uri", "code", "request", "response"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLog {
    template: String,
}

impl Default for ExchangeLog {
    fn default() -> Self {
        Self {
            template: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl ExchangeLog {
    /// Validate a template. Unknown or unterminated placeholders are rejected.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                Error::Construction(format!("unterminated placeholder in log format: {template}"))
            })?;
            let name = &after[..close];
            if !PLACEHOLDERS.contains(&name) {
                return Err(Error::Construction(format!(
                    "unknown placeholder {{{name}}} in log format"
                )));
            }
            rest = &after[close + 1..];
        }
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, method: &str, uri: &str, code: u16) -> String {
        let code = code.to_string();
        self.template
            .replace("{request}", &format!("{method} {uri}"))
            .replace("{response}", &code)
            .replace("{method}", method)
            .replace("{uri}", uri)
            .replace("{code}", &code)
    }

    pub(crate) fn emit(&self, method: &str, uri: &str, code: u16) {
        info!(method, uri, status = code, "{}", self.render(method, uri, code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "https://authn.sd00.worldcat.org/oauth2/accessToken?grant_type=client_credentials&authenticatingInstitutionId=128807&contextInstitutionId=128807&scope=WMS_NCIP%20WMS_ACQ%20refresh_token";

    #[test]
    fn custom_format_renders_fields() {
        let log = ExchangeLog::new("Request - {method} - {uri} - {code}").unwrap();
        assert_eq!(
            log.render("POST", URI, 200),
            format!("Request - POST - {URI} - 200")
        );
    }

    #[test]
    fn default_format_uses_request_and_response() {
        let log = ExchangeLog::default();
        assert_eq!(
            log.render("POST", "http://h/accessToken", 401),
            "Request: POST http://h/accessToken Response: 401"
        );
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = ExchangeLog::new("{method} {body}").unwrap_err();
        assert!(matches!(err, Error::Construction(msg) if msg.contains("{body}")));
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        assert!(ExchangeLog::new("{method").is_err());
    }

    #[test]
    fn literal_text_passes_through() {
        let log = ExchangeLog::new("token exchange").unwrap();
        assert_eq!(log.render("POST", URI, 200), "token exchange");
    }
}
