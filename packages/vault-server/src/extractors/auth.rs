use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Cookie carrying the session token when no `Authorization` header is sent.
pub const SESSION_COOKIE: &str = "__session";

/// Verified caller identity.
///
/// Read from `Authorization: Bearer <token>`, falling back to the
/// `__session` cookie. Only the token subject is trusted; roles are
/// looked up in the database.
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AppError::TokenMissing)?;

        let claims = jwt::verify(&token, &state.config.auth.jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        if claims.sub.trim().is_empty() {
            return Err(AppError::TokenInvalid);
        }

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

/// Identity that may be absent. Invalid tokens are treated as absent.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(header) = parts.headers.get("Authorization") {
        let value = header.to_str().map_err(|_| AppError::TokenInvalid)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;
        return Ok(Some(token.to_string()));
    }

    let jar = CookieJar::from_headers(&parts.headers);
    Ok(jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}
