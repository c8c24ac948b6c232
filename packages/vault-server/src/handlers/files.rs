use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::files::*;
use crate::models::shared::{PageQuery, Pagination};
use crate::state::AppState;
use crate::vault::lifecycle::{self, FileLifecycle};
use crate::vault::{UploadOrchestrator, UserDirectory};

fn uploads(state: &AppState) -> UploadOrchestrator<'_> {
    UploadOrchestrator::new(&state.db, &state.store, &state.config.storage)
}

fn files(state: &AppState) -> FileLifecycle<'_> {
    FileLifecycle::new(&state.db, &state.store, &state.config.storage)
}

/// Authorize a single upload.
#[utoipa::path(
    post,
    path = "/upload-url",
    tag = "Files",
    operation_id = "createUploadUrl",
    summary = "Authorize an upload",
    description = "Links the caller to already-stored content when the hash is known. Otherwise checks the quota and returns a presigned PUT URL for the hash-derived blob key.",
    request_body = UploadUrlRequest,
    responses(
        (status = 200, description = "Duplicate linked or upload URL issued", body = UploadUrlResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "Quota exceeded (STORAGE_QUOTA_EXCEEDED)", body = ErrorBody),
        (status = 502, description = "Content store unavailable (STORAGE_BACKEND_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, content_hash = %payload.content_hash))]
pub async fn create_upload_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UploadUrlRequest>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    let auth = uploads(&state)
        .authorize(&auth_user.user_id, payload.into())
        .await?;
    Ok(Json(auth.into()))
}

/// Finalize an upload.
#[utoipa::path(
    post,
    path = "/complete",
    tag = "Files",
    operation_id = "completeUpload",
    summary = "Complete an upload",
    description = "Verifies the blob landed in the content store and records the file. A concurrent completion of the same content is folded into the duplicate path.",
    request_body = CompleteUploadRequest,
    responses(
        (status = 201, description = "File recorded", body = FileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Blob not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Lost a race, retry (RETRYABLE_CONFLICT)", body = ErrorBody),
        (status = 502, description = "Content store unavailable (STORAGE_BACKEND_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, content_hash = %payload.content_hash))]
pub async fn complete_upload(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CompleteUploadRequest>,
) -> Result<(StatusCode, Json<FileResponse>), AppError> {
    let file = uploads(&state)
        .complete(&auth_user.user_id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

/// Authorize several uploads at once.
#[utoipa::path(
    post,
    path = "/batch/prepare",
    tag = "Files",
    operation_id = "prepareBatchUpload",
    summary = "Prepare a batch upload",
    description = "Per-item duplicate detection, with one quota decision for the bytes of every item whose content is not stored yet.",
    request_body = BatchPrepareRequest,
    responses(
        (status = 200, description = "Per-item outcomes", body = BatchPrepareResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, items = payload.files.len()))]
pub async fn prepare_batch(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BatchPrepareRequest>,
) -> Result<Json<BatchPrepareResponse>, AppError> {
    let requests = payload.files.into_iter().map(Into::into).collect();
    let batch = uploads(&state)
        .batch_authorize(&auth_user.user_id, requests)
        .await?;
    Ok(Json(batch.into()))
}

/// Finalize several uploads.
#[utoipa::path(
    post,
    path = "/batch/complete",
    tag = "Files",
    operation_id = "completeBatchUpload",
    summary = "Complete a batch upload",
    description = "Completes each item independently. A failed item is reported and does not undo its siblings.",
    request_body = BatchCompleteRequest,
    responses(
        (status = 200, description = "Per-item results", body = BatchCompleteResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id, batch_id = %payload.batch_id))]
pub async fn complete_batch(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<BatchCompleteRequest>,
) -> Result<Json<BatchCompleteResponse>, AppError> {
    let completions = payload.files.into_iter().map(Into::into).collect();
    let batch = uploads(&state)
        .batch_complete(&auth_user.user_id, payload.batch_id, completions)
        .await?;
    Ok(Json(batch.into()))
}

/// List the caller's files.
#[utoipa::path(
    get,
    path = "/",
    tag = "Files",
    operation_id = "listFiles",
    summary = "List files",
    description = "Returns the caller's files, newest first.",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of files", body = FileListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_files(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let (page, per_page) = query.resolve(20)?;
    UserDirectory::new(&state.db, &state.config.storage)
        .get_or_create(&auth_user.user_id)
        .await?;

    let (rows, total) = lifecycle::list_files(&state.db, &auth_user.user_id, page, per_page).await?;
    let pagination = Pagination::new(page, per_page, total);

    Ok(Json(FileListResponse {
        data: rows.into_iter().map(Into::into).collect(),
        has_more: pagination.has_more(),
        pagination,
    }))
}

/// Get one of the caller's files.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get file metadata",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File", body = FileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileResponse>, AppError> {
    let file = lifecycle::file_info(&state.db, &auth_user.user_id, id).await?;
    Ok(Json(file.into()))
}

/// Download URL for a file.
#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Files",
    operation_id = "getDownloadUrl",
    summary = "Get a download URL",
    description = "Public files get their stable URL. Private files get a presigned URL valid for `download_url_ttl_secs`.",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
        (status = 502, description = "Content store unavailable (STORAGE_BACKEND_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn download_url(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let link = files(&state)
        .download_url(Some(&auth_user.user_id), id)
        .await?;
    Ok(Json(link.into()))
}

/// Share link for a public file.
#[utoipa::path(
    get,
    path = "/{id}/share-link",
    tag = "Files",
    operation_id = "getShareLink",
    summary = "Get or create a share link",
    description = "Returns the file's share link, creating it on first request. The file must be public.",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Share link", body = ShareLinkResponse),
        (status = 400, description = "File is private (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn share_link(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareLinkResponse>, AppError> {
    let link = files(&state).share_link(&auth_user.user_id, id).await?;
    Ok(Json(ShareLinkResponse::new(
        link.id,
        &state.config.server.public_base_url,
    )))
}

/// Delete one of the caller's files.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Files",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Removes the caller's file. The stored content is released when no other file references it.",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    files(&state)
        .delete_owned_file(&auth_user.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flip a file between private and public.
#[utoipa::path(
    patch,
    path = "/{id}/public",
    tag = "Files",
    operation_id = "toggleVisibility",
    summary = "Toggle public access",
    description = "Making a file public creates its share link. Making it private removes the link.",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "New visibility", body = VisibilityResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn toggle_visibility(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VisibilityResponse>, AppError> {
    let visibility = files(&state)
        .toggle_visibility(&auth_user.user_id, id)
        .await?;
    Ok(Json(VisibilityResponse::new(
        visibility,
        &state.config.server.public_base_url,
    )))
}
