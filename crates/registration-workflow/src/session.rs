//! Authentication sessions
//!
//! The orchestrator never looks up credentials on its own. A [`Session`] is
//! handed to it at construction and can be swapped after re-authentication.

use serde::{Deserialize, Serialize};

/// Environment variable read by [`EnvSession::default`]
pub const TOKEN_ENV_VAR: &str = "REGISTRATION_TOKEN";

/// Bearer token for the hospital backend. Never printed in full.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    /// Returns `None` for an empty or whitespace-only token
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(BearerToken(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "BearerToken({}…)", visible)
    }
}

/// Source of the current bearer token
pub trait Session: Send + Sync {
    /// Current token, or `None` when the user is signed out
    fn bearer_token(&self) -> Option<BearerToken>;
}

/// Session with a fixed token
#[derive(Clone, Debug, Default)]
pub struct StaticSession {
    token: Option<BearerToken>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::new(token),
        }
    }

    pub fn signed_out() -> Self {
        Self { token: None }
    }
}

impl Session for StaticSession {
    fn bearer_token(&self) -> Option<BearerToken> {
        self.token.clone()
    }
}

/// Session that reads the token from an environment variable on every call
#[derive(Clone, Debug)]
pub struct EnvSession {
    var: String,
}

impl EnvSession {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSession {
    fn default() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

impl Session for EnvSession {
    fn bearer_token(&self) -> Option<BearerToken> {
        std::env::var(&self.var).ok().and_then(BearerToken::new)
    }
}
