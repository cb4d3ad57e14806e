use actix_web::{
    cookie::{Cookie, SameSite},
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    /// The store behind the data access port rejected or failed the call.
    #[error("Backend failure: {0}")]
    Backend(StoreError),

    /// No session is present for an operation that needs one.
    #[error("Authentication required")]
    Unauthenticated,

    /// A session token was presented but could not be accepted.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Tag attachment stopped at `tag`; the tags in `linked` stay attached.
    #[error("Failed to attach tag '{tag}' after linking {} tag(s): {source}", .linked.len())]
    PartialApplication {
        tag: String,
        linked: Vec<String>,
        #[source]
        source: Box<AppError>,
    },

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_tags: Option<Vec<String>>,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict(what) => AppError::Conflict(what),
            other => AppError::Backend(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    /// True when the caller should be sent to log in rather than shown a failure.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AppError::Unauthenticated)
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let mut linked_tags = None;
        let error_message = match self {
            AppError::Backend(ref e) => {
                tracing::error!("Backend failure: {:?}", e);
                "Backend failure".to_string()
            }
            AppError::Unauthenticated => "Authentication required".to_string(),
            AppError::Unauthorized(ref e) => e.clone(),
            AppError::Forbidden(ref e) => e.clone(),
            AppError::NotFound(ref e) => e.clone(),
            AppError::Validation(ref e) => e.clone(),
            AppError::Conflict(ref e) => e.clone(),
            AppError::PartialApplication {
                ref tag,
                ref linked,
                ref source,
            } => {
                tracing::error!("Tag '{}' failed after {:?} were linked: {:?}", tag, linked, source);
                linked_tags = Some(linked.clone());
                format!("Failed to attach tag '{}'", tag)
            }
            AppError::Jwt(ref e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                e.clone()
            }
        };

        let body = ErrorResponse {
            detail: error_message,
            linked_tags,
        };

        let mut response_builder = HttpResponse::build(self.status_code());

        // A rejected token is cleared so the client falls back to anonymous browsing
        if matches!(self, AppError::Unauthorized(_) | AppError::Jwt(_)) {
            let mut token_cookie = Cookie::new("token", "");
            token_cookie.set_http_only(true);
            token_cookie.set_same_site(SameSite::None);
            token_cookie.set_secure(true);
            token_cookie.set_path("/");
            token_cookie.set_max_age(time::Duration::seconds(-1));

            response_builder.insert_header((header::SET_COOKIE, token_cookie.to_string()));
        }

        response_builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PartialApplication { .. } => StatusCode::BAD_GATEWAY,
            AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
