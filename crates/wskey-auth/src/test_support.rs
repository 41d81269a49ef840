//! Mock authorization server for exchange tests.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use tokio::net::TcpListener;

use crate::config::AuthConfig;

/// One request seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub query: String,
    pub authorization: String,
}

pub struct MockServer {
    pub config: AuthConfig,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Serve `body` with the given status and content type on
/// `/oauth2/accessToken`, recording every request.
pub async fn start_auth_server(
    status: u16,
    content_type: &'static str,
    body: impl Into<String>,
) -> MockServer {
    let body = body.into();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();

    let app = Router::new().route(
        "/oauth2/accessToken",
        post(move |headers: HeaderMap, uri: Uri| {
            let recorded = recorded.clone();
            let body = body.clone();
            async move {
                recorded.lock().unwrap().push(RecordedCall {
                    query: uri.query().unwrap_or_default().to_string(),
                    authorization: headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string(),
                });
                (
                    StatusCode::from_u16(status).unwrap(),
                    [("content-type", content_type)],
                    body,
                )
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        config: AuthConfig::with_server(format!("http://{addr}/oauth2")),
        calls,
        _handle: handle,
    }
}

/// Token response with a principal and a refresh token, valid until 2080.
pub const TOKEN_WITH_REFRESH: &str = r#"{
    "access_token": "tk_Yebz4BpEp9dAsghA7KpWx6dYD1OZKWBlHjqW",
    "token_type": "bearer",
    "expires_in": "3599",
    "principalID": "principalID",
    "principalIDNS": "principalIDNS",
    "contextInstitutionId": "128807",
    "expires_at": "2080-08-23 18:45:29Z",
    "refresh_token": "rt_239308230",
    "refresh_token_expires_in": "604799",
    "refresh_token_expires_at": "2080-08-30 18:45:29Z"
}"#;

/// Same shape, but the access token expired in 2013.
pub const EXPIRED_TOKEN_WITH_REFRESH: &str = r#"{
    "access_token": "tk_Yebz4BpEp9dAsghA7KpWx6dYD1OZKWBlHjqW",
    "token_type": "bearer",
    "expires_in": "3599",
    "principalID": "principalID",
    "principalIDNS": "principalIDNS",
    "contextInstitutionId": "128807",
    "expires_at": "2013-08-23 18:45:29Z",
    "refresh_token": "rt_239308230",
    "refresh_token_expires_in": "604799",
    "refresh_token_expires_at": "2080-08-30 18:45:29Z"
}"#;

/// Token response without a refresh token.
pub const TOKEN_WITHOUT_REFRESH: &str = r#"{
    "access_token": "tk_Yebz4BpEp9dAsghA7KpWx6dYD1OZKWBlHjqW",
    "token_type": "bearer",
    "expires_in": "3599",
    "principalID": "principalID",
    "principalIDNS": "principalIDNS",
    "contextInstitutionId": "128807",
    "expires_at": "2080-08-23 18:45:29Z"
}"#;
