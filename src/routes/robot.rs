use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/robots", get(commands::robot::get_robots))
        .route("/api/robots/create", post(commands::robot::create_robot))
        .route("/api/robots/status", post(commands::robot::update_status))
        .route("/api/robots/field", post(commands::robot::update_field))
        .route("/api/robots/part/toggle", post(commands::robot::toggle_part))
        .route("/api/robots/part/date", post(commands::robot::set_part_date))
        .route("/api/robots/history", get(commands::robot::get_history))
        .route("/api/robots/delete", post(commands::robot::delete_robot))
}
