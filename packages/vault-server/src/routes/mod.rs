use utoipa_axum::{router::OpenApiRouter, routes};

use crate::handlers;
use crate::state::AppState;

pub fn api_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest("/v1", v1_routes())
}

/// Unauthenticated routes mounted outside `/api`.
pub fn root_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::health::health))
        .routes(routes!(handlers::public::resolve_share))
}

fn v1_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/files", file_routes())
        .nest("/public/files", public_routes())
        .nest("/user", user_routes())
        .nest("/admin", admin_routes())
}

fn file_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::files::list_files))
        .routes(routes!(handlers::files::create_upload_url))
        .routes(routes!(handlers::files::complete_upload))
        .routes(routes!(handlers::files::prepare_batch))
        .routes(routes!(handlers::files::complete_batch))
        .routes(routes!(
            handlers::files::get_file,
            handlers::files::delete_file
        ))
        .routes(routes!(handlers::files::download_url))
        .routes(routes!(handlers::files::share_link))
        .routes(routes!(handlers::files::toggle_visibility))
}

fn public_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::public::get_public_file))
        .routes(routes!(handlers::public::public_download_url))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::user::profile))
        .routes(routes!(handlers::user::storage))
        .routes(routes!(handlers::user::storage_statistics))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::admin::list_users))
        .routes(routes!(handlers::admin::update_role))
        .routes(routes!(handlers::admin::update_quota))
        .routes(routes!(handlers::admin::delete_user))
        .routes(routes!(handlers::admin::system_stats))
        .routes(routes!(handlers::admin::reconcile))
}
