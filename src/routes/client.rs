use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/clients", get(commands::client::get_clients))
        .route("/api/clients/create", post(commands::client::create_client))
        .route("/api/sites", get(commands::client::get_sites))
        .route("/api/sites/create", post(commands::client::create_site))
}
