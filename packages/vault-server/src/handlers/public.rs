use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::models::files::{DownloadUrlResponse, PublicFileResponse};
use crate::state::AppState;
use crate::utils::share_id;
use crate::vault::FileLifecycle;

fn files(state: &AppState) -> FileLifecycle<'_> {
    FileLifecycle::new(&state.db, &state.store, &state.config.storage)
}

/// Metadata of a public file.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Public",
    operation_id = "getPublicFile",
    summary = "Get public file metadata",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Public file", body = PublicFileResponse),
        (status = 404, description = "Missing or private (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_public_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicFileResponse>, AppError> {
    let file = files(&state).public_info(id).await?;
    Ok(Json(file.into()))
}

/// Stable URL of a public file.
#[utoipa::path(
    get,
    path = "/{id}/download",
    tag = "Public",
    operation_id = "getPublicDownloadUrl",
    summary = "Get a public download URL",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 404, description = "Missing or private (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn public_download_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let link = files(&state).download_url(None, id).await?;
    Ok(Json(link.into()))
}

/// Follow a share link.
#[utoipa::path(
    get,
    path = "/share/{short_id}",
    tag = "Public",
    operation_id = "resolveShareLink",
    summary = "Resolve a share link",
    description = "Redirects to the file's public URL and counts a download.",
    params(("short_id" = String, Path, description = "Share ID")),
    responses(
        (status = 302, description = "Redirect to the public URL"),
        (status = 404, description = "Unknown link or file no longer public (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn resolve_share(
    State(state): State<AppState>,
    Path(short_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !share_id::is_well_formed(&short_id, state.config.storage.share_id_length) {
        return Err(AppError::NotFound("Share link not found".into()));
    }
    let resolved = files(&state).resolve_share(&short_id).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, resolved.url)]))
}
