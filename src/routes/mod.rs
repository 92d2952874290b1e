use crate::state::AppState;
use axum::Router;

pub mod auth;
pub mod client;
pub mod dashboard;
pub mod logs;
pub mod maintenance;
pub mod robot;
pub mod users;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(client::router())
        .merge(robot::router())
        .merge(logs::router())
        .merge(dashboard::router())
        .merge(users::router())
        .merge(maintenance::router())
}
