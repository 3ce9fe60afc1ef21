//! Credential normalization shared by external apps and synthetic tests.
//!
//! A user-supplied secret is converted into a method-tagged envelope once, at
//! the storage edge; every outbound caller consumes the envelope and never
//! sees the raw input again. Raw secrets must not appear in logs or Debug
//! output.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    None,
    ApiKey,
    BearerToken,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
            AuthMethod::BearerToken => "bearer_token",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(AuthMethod::None),
            "api_key" => Some(AuthMethod::ApiKey),
            "bearer_token" => Some(AuthMethod::BearerToken),
            _ => None,
        }
    }
}

/// Raw authentication material in flight between the caller and the
/// normalizer. Debug output is redacted so the secret cannot leak through
/// logging of creation inputs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Normalized credential envelope. The wire/storage shape is the bare JSON
/// object (`{"header_name": ..., "key": ...}` or `{"token": ...}`), hence the
/// untagged representation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credential {
    ApiKey { header_name: String, key: String },
    BearerToken { token: String },
}

impl Credential {
    /// Build an envelope from an authentication method and a raw secret.
    ///
    /// A missing or empty secret with method != none is treated as
    /// unauthenticated rather than rejected. A secret that already is the
    /// matching envelope (e.g. round-tripped through an update form) is
    /// passed through unchanged, so normalization is idempotent.
    pub fn normalize(method: AuthMethod, secret: Option<&str>) -> Option<Credential> {
        let secret = secret?.trim();
        if secret.is_empty() {
            return None;
        }
        match method {
            AuthMethod::None => None,
            AuthMethod::ApiKey => match serde_json::from_str::<Credential>(secret) {
                Ok(cred @ Credential::ApiKey { .. }) => Some(cred),
                _ => Some(Credential::ApiKey {
                    header_name: API_KEY_HEADER.to_string(),
                    key: secret.to_string(),
                }),
            },
            AuthMethod::BearerToken => match serde_json::from_str::<Credential>(secret) {
                Ok(cred @ Credential::BearerToken { .. }) => Some(cred),
                _ => Some(Credential::BearerToken {
                    token: secret.to_string(),
                }),
            },
        }
    }

    /// Attach this credential to an outbound request.
    pub fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credential::ApiKey { header_name, key } => req.header(header_name.as_str(), key.as_str()),
            Credential::BearerToken { token } => req.bearer_auth(token),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Credential> {
        serde_json::from_str(s)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ApiKey { header_name, .. } => f
                .debug_struct("ApiKey")
                .field("header_name", header_name)
                .field("key", &"[REDACTED]")
                .finish(),
            Credential::BearerToken { .. } => f
                .debug_struct("BearerToken")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}
