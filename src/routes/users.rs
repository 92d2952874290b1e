use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(commands::users::get_users))
        .route("/api/users/role", post(commands::users::set_role))
        .route("/api/users/delete", post(commands::users::delete_user))
}
