//! Bearer token authentication.
//!
//! Every request gets a [`Principal`] extension; handlers decide what that
//! principal may do.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::repository::RepositoryKey;
use crate::services::access_policy::Principal;

/// Extract the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or(v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Attach the authenticated principal to the request. Unknown tokens are
/// rejected before any handler runs.
pub async fn access_middleware(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match state
        .services
        .access
        .authenticate(bearer_token(request.headers()))
    {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };
    request.extensions_mut().insert(principal);
    next.run(request).await
}

pub fn require_read(state: &SharedState, principal: &Principal, repository: &RepositoryKey) -> Result<()> {
    if state.services.access.can_read(principal, repository) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!("Read access to {} denied", repository)))
    }
}

pub fn require_write(state: &SharedState, principal: &Principal, repository: &RepositoryKey) -> Result<()> {
    if state.services.access.can_write(principal, repository) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!("Write access to {} denied", repository)))
    }
}
