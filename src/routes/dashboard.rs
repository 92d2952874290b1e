use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/summary", get(commands::dashboard::get_summary))
        .route(
            "/api/dashboard/robots",
            get(commands::dashboard::get_dashboard_robots),
        )
        .route(
            "/api/dashboard/export",
            get(commands::dashboard::export_dashboard),
        )
}
