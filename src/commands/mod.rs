pub mod auth;
pub mod client;
pub mod dashboard;
pub mod logs;
pub mod maintenance;
pub mod robot;
pub mod users;
