use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::user::*;
use crate::state::AppState;
use crate::vault::{UserDirectory, compute_usage};

/// Caller's profile.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "User",
    operation_id = "getProfile",
    summary = "Get profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = UserDirectory::new(&state.db, &state.config.storage)
        .get_or_create(&auth_user.user_id)
        .await?;
    let usage = compute_usage(&state.db, &auth_user.user_id).await?;
    Ok(Json(ProfileResponse::new(user, &usage)))
}

/// Caller's quota and deduplicated usage.
#[utoipa::path(
    get,
    path = "/storage",
    tag = "User",
    operation_id = "getStorage",
    summary = "Get storage usage",
    description = "`used` counts each distinct piece of content once, however many files point at it.",
    responses(
        (status = 200, description = "Storage usage", body = StorageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn storage(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StorageResponse>, AppError> {
    let user = UserDirectory::new(&state.db, &state.config.storage)
        .get_or_create(&auth_user.user_id)
        .await?;
    let usage = compute_usage(&state.db, &auth_user.user_id).await?;
    Ok(Json(StorageResponse::new(user.storage_quota, &usage)))
}

/// Usage with and without deduplication.
#[utoipa::path(
    get,
    path = "/storage/statistics",
    tag = "User",
    operation_id = "getStorageStatistics",
    summary = "Get deduplication statistics",
    responses(
        (status = 200, description = "Storage statistics", body = StorageStatisticsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn storage_statistics(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StorageStatisticsResponse>, AppError> {
    let user = UserDirectory::new(&state.db, &state.config.storage)
        .get_or_create(&auth_user.user_id)
        .await?;
    let usage = compute_usage(&state.db, &auth_user.user_id).await?;
    Ok(Json(StorageStatisticsResponse::new(user.storage_quota, usage)))
}
