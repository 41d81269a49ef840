//! Refresh token records
//!
//! A refresh token is returned alongside an access token when the key is
//! entitled to one. It never changes once parsed: a successful refresh hands
//! back a new record that replaces the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expiry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    value: String,
    /// Lifetime in seconds as reported by the server
    expires_in: u64,
    expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn new(value: impl Into<String>, expires_in: u64, expires_at: DateTime<Utc>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::Construction(
                "You must pass a refresh token value".into(),
            ));
        }
        Ok(Self {
            value,
            expires_in,
            expires_at,
        })
    }

    /// Build from the server's string form of the expiry (`2018-08-23 18:45:29Z`).
    pub fn parse(value: impl Into<String>, expires_in: u64, expires_at: &str) -> Result<Self> {
        let at = expiry::parse_timestamp(expires_at).ok_or_else(|| {
            Error::Construction(format!("invalid refresh token expiry: {expires_at}"))
        })?;
        Self::new(value, expires_in, at)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        expiry::is_expired_at(&self.expires_at, now)
    }
}
