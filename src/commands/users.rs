use std::collections::HashSet;

use axum::extract::{Extension, Json, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::commands::auth::super_admin_email;
use crate::db::User;
use crate::domain::actor::{Action, Role};
use crate::error::{FleetError, FleetResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// List users, oldest first. Duplicate profiles for the same email (possible
/// through concurrent first sign-ins) are deleted as they are found; only
/// the earliest row per email survives.
pub async fn get_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FleetResult<Json<Vec<User>>> {
    claims.actor()?.require(Action::ManageUsers)?;

    let rows: Vec<User> = sqlx::query_as(
        "SELECT uid, email, NULL AS password_hash, role, email_verified, display_name,
                verification_token, created_at, last_login_at
         FROM users ORDER BY created_at ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut seen = HashSet::new();
    let mut survivors = Vec::new();
    for user in rows {
        if seen.insert(user.email.clone()) {
            survivors.push(user);
        } else {
            sqlx::query("DELETE FROM users WHERE uid = $1")
                .bind(&user.uid)
                .execute(&state.pool)
                .await?;
            tracing::info!("Removed duplicate user profile: {}", user.email);
        }
    }
    Ok(Json(survivors))
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub uid: String,
    pub role: String,
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RoleChangeRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::ManageUsers)?;

    let role = Role::parse(&payload.role)
        .ok_or_else(|| FleetError::Validation(format!("Unknown role '{}'", payload.role)))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE uid = $1")
        .bind(&payload.uid)
        .fetch_optional(&state.pool)
        .await?;
    let user = user.ok_or_else(|| FleetError::NotFound("User not found".into()))?;

    // The promoted identity cannot be demoted; login would undo it anyway.
    if user.email == super_admin_email() && role != Role::SuperAdmin {
        return Err(FleetError::Forbidden(
            "The configured super admin cannot be demoted".into(),
        ));
    }

    sqlx::query("UPDATE users SET role = $1 WHERE uid = $2")
        .bind(role.as_str())
        .bind(&payload.uid)
        .execute(&state.pool)
        .await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct UserDeleteRequest {
    pub uid: String,
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UserDeleteRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::ManageUsers)?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE uid = $1")
        .bind(&payload.uid)
        .fetch_optional(&state.pool)
        .await?;
    let user = user.ok_or_else(|| FleetError::NotFound("User not found".into()))?;

    if user.email == super_admin_email() {
        return Err(FleetError::Forbidden(
            "The configured super admin cannot be deleted".into(),
        ));
    }

    sqlx::query("DELETE FROM users WHERE uid = $1")
        .bind(&payload.uid)
        .execute(&state.pool)
        .await?;
    Ok(Json(json!({ "success": true })))
}
