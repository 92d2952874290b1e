use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/maintenance/backfill-part-issues",
            post(commands::maintenance::backfill_handler),
        )
        .route(
            "/api/maintenance/migrate-sites",
            post(commands::maintenance::migrate_handler),
        )
        .route(
            "/api/maintenance/import",
            post(commands::maintenance::import_handler),
        )
}
