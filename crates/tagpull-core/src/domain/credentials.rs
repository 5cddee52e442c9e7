use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials used to authorize calls against a remote queue.
///
/// Stored as a JSON blob keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Set once the issuer revoked the grant.
    #[serde(default)]
    pub invalid: bool,
}

impl Credentials {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            invalid: false,
        }
    }

    pub fn to_blob(&self) -> String {
        // a struct of strings and timestamps always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a stored blob. Blank or undecodable blobs yield `None`.
    pub fn from_blob(blob: &str) -> Option<Self> {
        if blob.trim().is_empty() {
            return None;
        }
        serde_json::from_str(blob).ok()
    }
}
