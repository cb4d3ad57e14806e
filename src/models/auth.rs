use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Provider-issued JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Identity details the OAuth provider attaches to the token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The acting user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        let metadata = claims.user_metadata;
        Session {
            user_id: claims.sub,
            email: claims.email,
            display_name: metadata.user_name.or(metadata.preferred_username),
            avatar_url: metadata.avatar_url,
        }
    }
}

/// Per-request context threaded into every data access call
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<Session>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        RequestContext { session: None }
    }

    pub fn authenticated(session: Session) -> Self {
        RequestContext {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    pub fn require_session(&self) -> AppResult<&Session> {
        self.session.as_ref().ok_or(AppError::Unauthenticated)
    }
}
