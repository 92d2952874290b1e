use axum::extract::{Extension, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::{DbPool, PartIssueRow};
use crate::domain::actor::Action;
use crate::domain::parts::PART_CATALOG;
use crate::error::{FleetError, FleetResult};
use crate::importer::{self, ImportRow};
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Default, Serialize)]
pub struct BackfillReport {
    pub sites: usize,
    pub robots: usize,
}

/// Bring every robot of a client up to the canonical part catalog: insert
/// missing parts as unselected/empty, drop rows whose part name fell out of
/// the catalog, and record the resulting part map in that day's history.
pub async fn backfill_part_issues(pool: &DbPool, client: &str) -> FleetResult<BackfillReport> {
    let sites: Vec<(String,)> = sqlx::query_as("SELECT site FROM sites WHERE client = $1")
        .bind(client)
        .fetch_all(pool)
        .await?;
    if sites.is_empty() {
        return Err(FleetError::NotFound(format!(
            "No sites found for client '{}'",
            client
        )));
    }

    let catalog: Vec<String> = PART_CATALOG.iter().map(|p| p.to_string()).collect();
    let now = Utc::now();
    let mut report = BackfillReport {
        sites: sites.len(),
        ..Default::default()
    };

    for (site,) in &sites {
        let robots: Vec<(String,)> =
            sqlx::query_as("SELECT rbt_id FROM robots WHERE client = $1 AND site = $2")
                .bind(client)
                .bind(site)
                .fetch_all(pool)
                .await?;

        for (rbt_id,) in &robots {
            report.robots += 1;
            let mut tx = pool.begin().await?;

            for part in PART_CATALOG {
                sqlx::query(
                    "INSERT INTO part_issues (client, site, rbt_id, part)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (client, site, rbt_id, part) DO NOTHING",
                )
                .bind(client)
                .bind(site)
                .bind(rbt_id)
                .bind(part)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                "DELETE FROM part_issues
                 WHERE client = $1 AND site = $2 AND rbt_id = $3 AND part <> ALL($4)",
            )
            .bind(client)
            .bind(site)
            .bind(rbt_id)
            .bind(&catalog)
            .execute(&mut *tx)
            .await?;

            let parts: Vec<PartIssueRow> = sqlx::query_as(
                "SELECT * FROM part_issues WHERE client = $1 AND site = $2 AND rbt_id = $3",
            )
            .bind(client)
            .bind(site)
            .bind(rbt_id)
            .fetch_all(&mut *tx)
            .await?;
            let mut map = serde_json::Map::new();
            for part in parts {
                map.insert(
                    part.part.clone(),
                    json!({
                        "selected": part.selected,
                        "dispatch_date": part.dispatch_date,
                        "delivery_date": part.delivery_date,
                    }),
                );
            }

            sqlx::query(
                "INSERT INTO robot_history (client, site, rbt_id, day, changes, updated_by, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (client, site, rbt_id, day)
                 DO UPDATE SET changes = robot_history.changes || EXCLUDED.changes,
                               updated_by = EXCLUDED.updated_by,
                               updated_at = EXCLUDED.updated_at",
            )
            .bind(client)
            .bind(site)
            .bind(rbt_id)
            .bind(now.date_naive())
            .bind(json!({ "part_issues": Value::Object(map) }))
            .bind("maintenance")
            .bind(now)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            tracing::info!("Backfilled part issues for {} -> {} -> {}", client, site, rbt_id);
        }
    }

    Ok(report)
}

#[derive(Debug, Default, Serialize)]
pub struct MigrateReport {
    pub sites: u64,
    pub robots: u64,
    pub parts: u64,
    pub history: u64,
    pub logs: u64,
}

/// Move the legacy flat layout (rows with an empty client) under a real
/// client, creating it if needed. Log rows carry no client of their own and
/// are matched by the site names being moved. Idempotent once nothing with
/// an empty client remains.
pub async fn migrate_sites(pool: &DbPool, client: &str) -> FleetResult<MigrateReport> {
    if client.trim().is_empty() {
        return Err(FleetError::Validation("A client name is required".into()));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO clients (client) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(client)
        .execute(&mut *tx)
        .await?;

    let legacy_sites: Vec<(String,)> = sqlx::query_as("SELECT site FROM sites WHERE client = ''")
        .fetch_all(&mut *tx)
        .await?;
    let site_names: Vec<String> = legacy_sites.into_iter().map(|(s,)| s).collect();

    let mut report = MigrateReport::default();
    report.sites = sqlx::query("UPDATE sites SET client = $1 WHERE client = ''")
        .bind(client)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    report.robots = sqlx::query("UPDATE robots SET client = $1 WHERE client = ''")
        .bind(client)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    report.parts = sqlx::query("UPDATE part_issues SET client = $1 WHERE client = ''")
        .bind(client)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    report.history = sqlx::query("UPDATE robot_history SET client = $1 WHERE client = ''")
        .bind(client)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    report.logs = sqlx::query(
        "UPDATE rbt_logs SET client = $1 WHERE client IS NULL AND site = ANY($2)",
    )
    .bind(client)
    .bind(&site_names)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(report)
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub robots: usize,
    pub parts: usize,
}

/// Bootstrap upsert of robots and their parts. Does not run the transition
/// rules and writes no audit logs; the CSV is taken as ground truth.
pub async fn import_rows(
    pool: &DbPool,
    client: &str,
    rows: Vec<ImportRow>,
) -> FleetResult<ImportReport> {
    let now = Utc::now();
    let mut report = ImportReport::default();
    let mut tx = pool.begin().await?;

    if !client.is_empty() {
        sqlx::query("INSERT INTO clients (client) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(client)
            .execute(&mut *tx)
            .await?;
    }

    for row in rows {
        sqlx::query("INSERT INTO sites (client, site) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(client)
            .bind(&row.site)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO robots (client, site, rbt_id, cleaner_did, tc_did, cl_pcb_model,
                                 tc_pcb_model, running_status, breakdown_status, work, last_updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (client, site, rbt_id)
             DO UPDATE SET cleaner_did = EXCLUDED.cleaner_did,
                           tc_did = EXCLUDED.tc_did,
                           cl_pcb_model = EXCLUDED.cl_pcb_model,
                           tc_pcb_model = EXCLUDED.tc_pcb_model,
                           running_status = EXCLUDED.running_status,
                           breakdown_status = EXCLUDED.breakdown_status,
                           work = EXCLUDED.work,
                           last_updated = EXCLUDED.last_updated",
        )
        .bind(client)
        .bind(&row.site)
        .bind(&row.rbt_id)
        .bind(&row.cleaner_did)
        .bind(&row.tc_did)
        .bind(&row.cl_pcb_model)
        .bind(&row.tc_pcb_model)
        .bind(&row.running_status)
        .bind(&row.breakdown_status)
        .bind(&row.work)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        report.robots += 1;

        for part in &row.parts {
            sqlx::query(
                "INSERT INTO part_issues (client, site, rbt_id, part, selected, dispatch_date, delivery_date)
                 VALUES ($1, $2, $3, $4, TRUE, $5, $6)
                 ON CONFLICT (client, site, rbt_id, part)
                 DO UPDATE SET selected = TRUE,
                               dispatch_date = EXCLUDED.dispatch_date,
                               delivery_date = EXCLUDED.delivery_date",
            )
            .bind(client)
            .bind(&row.site)
            .bind(&row.rbt_id)
            .bind(&part.part)
            .bind(part.dispatch_date)
            .bind(part.delivery_date)
            .execute(&mut *tx)
            .await?;
            report.parts += 1;
        }
    }

    tx.commit().await?;
    Ok(report)
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceQuery {
    pub client: String,
}

pub async fn backfill_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<MaintenanceQuery>,
) -> FleetResult<Json<BackfillReport>> {
    claims.actor()?.require(Action::RunMaintenance)?;
    Ok(Json(backfill_part_issues(&state.pool, params.client.trim()).await?))
}

pub async fn migrate_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<MaintenanceQuery>,
) -> FleetResult<Json<MigrateReport>> {
    claims.actor()?.require(Action::RunMaintenance)?;
    Ok(Json(migrate_sites(&state.pool, params.client.trim()).await?))
}

pub async fn import_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<MaintenanceQuery>,
    body: String,
) -> FleetResult<Json<ImportReport>> {
    claims.actor()?.require(Action::ImportRobots)?;
    let rows = importer::parse_csv(body.as_bytes())?;
    Ok(Json(import_rows(&state.pool, params.client.trim(), rows).await?))
}
