use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password, verify_against_decoy, verify_password},
        repo_types::{User, UserId},
    },
    error::{with_deadline, AppError, AppResult},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "invalid username or password";
pub(crate) const INVALID_TOKEN: &str = "missing or invalid token";

/// Outcome of a successful login.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub user: User,
}

pub async fn register(state: &AppState, username: &str, password: &str) -> AppResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::validation("username is required"));
    }
    if username.contains('\0') {
        return Err(AppError::validation("username must not contain NUL characters"));
    }
    if password.is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let hash = hash_password(password).map_err(AppError::Internal)?;
    let user = with_deadline(
        state.config.store_timeout,
        state.users.create_user(username, &hash),
    )
    .await
    .map_err(|e| {
        if matches!(e, AppError::Conflict(_)) {
            warn!(%username, "username already registered");
        }
        e
    })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Unknown usernames and wrong passwords produce the same error.
pub async fn login(state: &AppState, username: &str, password: &str) -> AppResult<Session> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() || username.contains('\0') {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    let user = match with_deadline(
        state.config.store_timeout,
        state.users.find_by_username(username),
    )
    .await
    {
        Ok(u) => u,
        Err(AppError::NotFound(_)) => {
            verify_against_decoy(password);
            warn!(%username, "login unknown username");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
        }
        Err(e) => return Err(e),
    };

    let ok = verify_password(password, &user.password_hash).map_err(AppError::Internal)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    let keys = JwtKeys::new(&state.config.jwt);
    let signed = keys.sign(user.id).map_err(AppError::Internal)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Session {
        token: signed.token,
        expires_at: signed.expires_at,
        user,
    })
}

/// Resolves a bearer token to the user it was issued for.
pub fn authenticate(keys: &JwtKeys, token: &str) -> AppResult<UserId> {
    keys.verify(token).map(|c| c.sub).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        AppError::Unauthorized(INVALID_TOKEN)
    })
}

/// Tokens are stateless: there is no revocation list, so a logged-out token
/// stays valid until it expires. The client is expected to discard it.
pub fn logout(keys: &JwtKeys, token: &str) -> AppResult<()> {
    let claims = keys
        .verify(token)
        .map_err(|_| AppError::Unauthorized(INVALID_TOKEN))?;
    info!(user_id = %claims.sub, jti = %claims.jti, "user logged out");
    Ok(())
}

pub async fn current_user(state: &AppState, user_id: UserId) -> AppResult<User> {
    match with_deadline(state.config.store_timeout, state.users.find_by_id(user_id)).await {
        Ok(u) => Ok(u),
        Err(AppError::NotFound(_)) => {
            warn!(%user_id, "token refers to missing user");
            Err(AppError::Unauthorized(INVALID_TOKEN))
        }
        Err(e) => Err(e),
    }
}
