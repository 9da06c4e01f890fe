use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{CredentialsRequest, LoginResponse, MessageResponse, PublicUser},
        extractors::{bearer_token, AuthUser},
        jwt::JwtKeys,
        services,
    },
    error::{json_body, AppResult},
    state::AppState,
};

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let req = json_body(payload)?;
    let user = services::register(&state, &req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let req = json_body(payload)?;
    let session = services::login(&state, &req.username, &req.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: session.user.into(),
    }))
}

#[instrument(skip(state, headers))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    headers: HeaderMap,
) -> AppResult<Json<MessageResponse>> {
    let keys = JwtKeys::from_ref(&state);
    services::logout(&keys, bearer_token(&headers)?)?;
    Ok(Json(MessageResponse {
        message: "logged out; discard the token",
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PublicUser>> {
    let user = services::current_user(&state, user_id).await?;
    Ok(Json(user.into()))
}
