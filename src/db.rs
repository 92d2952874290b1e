use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{FleetError, FleetResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> FleetResult<DbPool> {
    // connect_lazy_with returns the pool immediately without validating the
    // connection; the first query does.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> FleetResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| FleetError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Disable);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> FleetResult<()> {
    // Clear any stale advisory locks left by a crashed migrator.
    let _ = sqlx::query("SELECT pg_advisory_unlock_all()")
        .execute(pool)
        .await;

    sqlx::migrate!("./migrations").run(pool).await?;

    let _ = ensure_seeds(pool).await;

    Ok(())
}

/// Bootstrap the configured super-admin account so a fresh database is
/// usable without the signup/verify round trip. The password defaults to
/// "admin" and should be rotated on first login.
async fn ensure_seeds(pool: &DbPool) -> FleetResult<()> {
    let email =
        std::env::var("SUPER_ADMIN_EMAIL").unwrap_or_else(|_| "dev@brightbots.in".to_string());

    let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(pool)
        .await
        .unwrap_or((0,));
    if exists.0 == 0 {
        if let Ok(hash) = bcrypt::hash("admin", bcrypt::DEFAULT_COST) {
            let _ = sqlx::query(
                "INSERT INTO users (uid, email, password_hash, role, email_verified)
                 VALUES ($1, $2, $3, 'super_admin', TRUE)
                 ON CONFLICT DO NOTHING",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&email)
            .bind(hash)
            .execute(pool)
            .await;
            tracing::info!("Seeded super admin account: {}", email);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ClientRow {
    pub client: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct SiteRow {
    pub client: String,
    pub site: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RobotRow {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
    pub cleaner_did: String,
    pub tc_did: String,
    pub cl_pcb_model: String,
    pub tc_pcb_model: String,
    pub running_status: String,
    pub breakdown_status: String,
    pub work: String,
    pub target_date: Option<NaiveDate>,
    pub running_manual_at: Option<DateTime<Utc>>,
    pub running_not_running_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PartIssueRow {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
    pub part: String,
    pub selected: bool,
    pub dispatch_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct HistoryRow {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
    pub day: NaiveDate,
    pub changes: serde_json::Value,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct RbtLog {
    pub log_id: i64,
    pub client: Option<String>,
    pub site: String,
    pub rbt_id: String,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub updated_by: String,
    pub timestamp: DateTime<Utc>,
    #[sqlx(default)]
    pub edited_by: Option<String>,
    #[sqlx(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub email_verified: bool,
    #[sqlx(default)]
    pub display_name: Option<String>,
    #[sqlx(default)]
    pub verification_token: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Default)]
pub struct FleetSummary {
    pub total_robots: Option<i64>,
    pub auto_count: Option<i64>,
    pub manual_count: Option<i64>,
    pub not_running_count: Option<i64>,
    pub breakdown_count: Option<i64>,
    pub with_issue_count: Option<i64>,
}
