use axum::extract::{Extension, Json, Query, State};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::User;
use crate::error::{FleetError, FleetResult};
use crate::middleware::auth::{get_jwt_secret, Claims};
use crate::state::AppState;

/// The one identity force-promoted to super_admin on every login, no matter
/// what the stored role says.
pub fn super_admin_email() -> String {
    std::env::var("SUPER_ADMIN_EMAIL").unwrap_or_else(|_| "dev@brightbots.in".to_string())
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> FleetResult<Json<Value>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(FleetError::Validation("A valid email is required".into()));
    }
    if payload.password.len() < 6 {
        return Err(FleetError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT uid FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(FleetError::Validation("Email is already registered".into()));
    }

    let uid = Uuid::new_v4().to_string();
    let verification_token = Uuid::new_v4().to_string();
    let password_hash = hash(&payload.password, DEFAULT_COST)?;
    let role = if email == super_admin_email() {
        "super_admin"
    } else {
        "viewer"
    };

    sqlx::query(
        "INSERT INTO users (uid, email, password_hash, role, email_verified, display_name, verification_token)
         VALUES ($1, $2, $3, $4, FALSE, $5, $6)",
    )
    .bind(&uid)
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(&payload.display_name)
    .bind(&verification_token)
    .execute(&state.pool)
    .await?;

    // There is no mailer; the token rides back in the response and the log.
    tracing::info!("Verification token for {}: {}", email, verification_token);

    Ok(Json(json!({
        "success": true,
        "uid": uid,
        "verification_token": verification_token,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> FleetResult<Json<Value>> {
    let result = sqlx::query(
        "UPDATE users SET email_verified = TRUE, verification_token = NULL
         WHERE verification_token = $1",
    )
    .bind(&params.token)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(FleetError::NotFound("Unknown verification token".into()));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub uid: String,
    pub email: String,
    pub role: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> FleetResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(FleetError::Validation(
            "Email and password are required".into(),
        ));
    }

    // Duplicate profiles can exist; the earliest row is authoritative.
    let user: Option<User> = sqlx::query_as(
        "SELECT * FROM users WHERE email = $1 ORDER BY created_at ASC LIMIT 1",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    let user = user.ok_or_else(|| FleetError::Auth("Invalid email or password".into()))?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| FleetError::Auth("Invalid email or password".into()))?;
    if !verify(&payload.password, password_hash)? {
        return Err(FleetError::Auth("Invalid email or password".into()));
    }
    if !user.email_verified {
        return Err(FleetError::Auth("Email is not verified".into()));
    }

    // Enforce super_admin for the configured account even if the row was
    // edited since the last login.
    let mut role = user.role.clone();
    if email == super_admin_email() && role != "super_admin" {
        role = "super_admin".to_string();
        sqlx::query("UPDATE users SET role = 'super_admin' WHERE uid = $1")
            .bind(&user.uid)
            .execute(&state.pool)
            .await?;
    }

    sqlx::query("UPDATE users SET last_login_at = $1 WHERE uid = $2")
        .bind(Utc::now())
        .bind(&user.uid)
        .execute(&state.pool)
        .await?;

    let claims = Claims {
        sub: user.uid.clone(),
        email: email.clone(),
        role: role.clone(),
        sid: Uuid::new_v4().to_string(),
        exp: (Utc::now().timestamp() + 60 * 60 * 24) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&get_jwt_secret()),
    )?;

    Ok(Json(LoginResponse {
        success: true,
        token,
        uid: user.uid,
        email,
        role,
    }))
}

pub async fn logout() -> Json<Value> {
    // Tokens are stateless; the client drops its copy.
    Json(json!({ "success": true }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> FleetResult<Json<Value>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE uid = $1")
        .bind(&claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| FleetError::NotFound("User profile not found".into()))?;

    Ok(Json(json!({
        "uid": user.uid,
        "email": user.email,
        "role": user.role,
        "email_verified": user.email_verified,
        "display_name": user.display_name,
    })))
}
