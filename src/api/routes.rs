use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Multipart framing on top of the raw upload limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize + MULTIPART_OVERHEAD;

    let mut router = Router::new()
        // Files
        .route(
            "/files",
            get(handlers::list_files)
                .post(handlers::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/trash", get(handlers::trash))
        .route("/files/recent", get(handlers::recent_files))
        .route("/files/search", get(handlers::search_files))
        .route(
            "/files/:id",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/files/:id/download", get(handlers::download_file))
        .route("/files/:id/share", post(handlers::share_file))
        .route("/files/:id/unshare", post(handlers::unshare_file))
        .route("/files/:id/restore", post(handlers::restore_file))
        .route("/files/:id/permanent", delete(handlers::purge_file))
        // Folders
        .route("/folders", post(handlers::create_folder))
        .route("/folders/trash", get(handlers::trashed_folders))
        .route(
            "/folders/:id",
            get(handlers::get_folder)
                .put(handlers::update_folder)
                .delete(handlers::delete_folder),
        )
        .route("/folders/:id/contents", get(handlers::folder_contents))
        .route("/folders/:id/restore", post(handlers::restore_folder))
        .route("/folders/:id/permanent", delete(handlers::purge_folder))
        // Anonymous share links
        .route("/shared/:token", get(handlers::shared_file))
        // Quota
        .route("/storage", get(handlers::storage_info))
        // Internal
        .route("/_internal/users/:id/quota", put(handlers::set_quota))
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled, purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
