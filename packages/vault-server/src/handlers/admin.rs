use axum::{
    Json,
    extract::{Path, State},
};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::admin::*;
use crate::models::shared::{PageQuery, Pagination};
use crate::state::AppState;
use crate::vault::{FileLifecycle, UserDirectory};

fn users(state: &AppState) -> UserDirectory<'_, sea_orm::DatabaseConnection> {
    UserDirectory::new(&state.db, &state.config.storage)
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Admin",
    operation_id = "listUsers",
    summary = "List vault users",
    description = "Paginated, newest first. Requires the `admin` role.",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(admin = %auth_user.user_id))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let directory = users(&state);
    directory.require_admin(&auth_user.user_id).await?;

    let (page, per_page) = query.resolve(USER_LIST_PER_PAGE)?;
    let (rows, total) = directory.list(page, per_page).await?;

    Ok(Json(UserListResponse {
        data: rows.into_iter().map(Into::into).collect(),
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    patch,
    path = "/users/{id}/role",
    tag = "Admin",
    operation_id = "updateUserRole",
    summary = "Change a user's role",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated user", body = AdminUserResponse),
        (status = 400, description = "Unknown role (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin = %auth_user.user_id, role = %payload.role))]
pub async fn update_role(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateRoleRequest>,
) -> Result<Json<AdminUserResponse>, AppError> {
    let directory = users(&state);
    directory.require_admin(&auth_user.user_id).await?;

    let user = directory.set_role(&id, payload.role.trim()).await?;
    info!(user_id = %user.id, role = %user.role, "Role updated");
    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/users/{id}/quota",
    tag = "Admin",
    operation_id = "updateUserQuota",
    summary = "Change a user's quota",
    description = "Quota is given in megabytes, between 1 and the configured maximum.",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateQuotaRequest,
    responses(
        (status = 200, description = "Updated user", body = AdminUserResponse),
        (status = 400, description = "Out of range (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin = %auth_user.user_id, quota_mb = payload.quota_mb))]
pub async fn update_quota(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateQuotaRequest>,
) -> Result<Json<AdminUserResponse>, AppError> {
    let directory = users(&state);
    directory.require_admin(&auth_user.user_id).await?;

    let user = directory.set_quota_mb(&id, payload.quota_mb).await?;
    info!(user_id = %user.id, quota = user.storage_quota, "Quota updated");
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Admin",
    operation_id = "deleteUser",
    summary = "Delete a user and their files",
    description = "Deletes every file the user holds, releasing content nothing else references, then removes the user.",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = DeleteUserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(admin = %auth_user.user_id))]
pub async fn delete_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteUserResponse>, AppError> {
    users(&state).require_admin(&auth_user.user_id).await?;

    let report = FileLifecycle::new(&state.db, &state.store, &state.config.storage)
        .purge_user(&id)
        .await?;
    Ok(Json(DeleteUserResponse {
        id,
        files_deleted: report.files_deleted,
    }))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Admin",
    operation_id = "getSystemStats",
    summary = "Vault-wide statistics",
    responses(
        (status = 200, description = "System statistics", body = SystemStatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(admin = %auth_user.user_id))]
pub async fn system_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SystemStatsResponse>, AppError> {
    let directory = users(&state);
    directory.require_admin(&auth_user.user_id).await?;
    Ok(Json(directory.system_stats().await?.into()))
}

#[utoipa::path(
    post,
    path = "/reconcile",
    tag = "Admin",
    operation_id = "reconcile",
    summary = "Reconcile ledgers with the content store",
    description = "Rewrites reference counts from the ownership ledger, releases unreferenced content, and re-derives blob tags from public flags.",
    responses(
        (status = 200, description = "Reconciliation report", body = ReconcileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(admin = %auth_user.user_id))]
pub async fn reconcile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, AppError> {
    users(&state).require_admin(&auth_user.user_id).await?;

    let lifecycle = FileLifecycle::new(&state.db, &state.store, &state.config.storage);
    let refs = lifecycle.reconcile_references().await?;
    let tags = lifecycle.reconcile_tags().await?;
    Ok(Json(ReconcileResponse::new(refs, tags)))
}
