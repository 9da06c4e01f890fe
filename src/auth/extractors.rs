use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo_types::UserId,
        services::{authenticate, INVALID_TOKEN},
    },
    error::AppError,
    state::AppState,
};

/// The authenticated caller, placed in request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// Reads `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized(INVALID_TOKEN))
}

/// Guard composed in front of every authenticated route.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let user_id = authenticate(&keys, bearer_token(req.headers())?)?;
    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Fails closed when a handler is mounted without the guard.
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))
    }
}
