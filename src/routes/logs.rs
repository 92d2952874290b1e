use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/logs", get(commands::logs::get_logs))
        .route("/api/logs/export", get(commands::logs::export_logs))
        .route("/api/logs/edit", post(commands::logs::edit_log))
        .route("/api/logs/delete", post(commands::logs::delete_log))
}
