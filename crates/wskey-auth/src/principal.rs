//! End-user identity layered on top of an application key

use serde::{Deserialize, Serialize};

/// A user at an institution, identified by principal ID and namespace.
///
/// Embedded in signed `Authorization` headers and attached to access tokens
/// whose exchange response names a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    institution_id: Option<u64>,
    principal_id: String,
    principal_id_ns: String,
}

impl Principal {
    pub fn new(
        institution_id: u64,
        principal_id: impl Into<String>,
        principal_id_ns: impl Into<String>,
    ) -> Self {
        Self {
            institution_id: Some(institution_id),
            principal_id: principal_id.into(),
            principal_id_ns: principal_id_ns.into(),
        }
    }

    /// Principal reported by the server for a token whose authenticating
    /// institution may be unknown (test mode).
    pub(crate) fn from_response(
        institution_id: Option<u64>,
        principal_id: String,
        principal_id_ns: String,
    ) -> Self {
        Self {
            institution_id,
            principal_id,
            principal_id_ns,
        }
    }

    pub fn institution_id(&self) -> Option<u64> {
        self.institution_id
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn principal_id_ns(&self) -> &str {
        &self.principal_id_ns
    }
}
