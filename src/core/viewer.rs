// Viewer identity - who is making the call, if anyone

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Header carrying the already-verified user id. Session verification itself
/// belongs to the hosted auth platform in front of this service.
pub const VIEWER_HEADER: &str = "x-viewer-id";

/// The identity a request acts under. Reads work anonymously; every mutating
/// service operation calls [`Viewer::require_user`] before touching the
/// gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    user_id: Option<Uuid>,
}

impl Viewer {
    pub fn authenticated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Authorization pre-check for mutations: a typed failure, issued before
    /// any remote call is attempted.
    pub fn require_user(&self) -> AppResult<Uuid> {
        self.user_id
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(VIEWER_HEADER) else {
            return Ok(Viewer::anonymous());
        };

        let raw = raw
            .to_str()
            .map_err(|_| AppError::BadRequest(format!("{} header is not valid text", VIEWER_HEADER)))?;
        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::BadRequest(format!("{} header is not a valid id", VIEWER_HEADER)))?;

        Ok(Viewer::authenticated(user_id))
    }
}
