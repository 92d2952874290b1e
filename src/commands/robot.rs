use std::collections::BTreeMap;

use axum::extract::{Extension, Json, Query, State};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::audit::{apply_changes, BasisWrite, FieldChange, Scope};
use crate::db::{DbPool, HistoryRow, PartIssueRow, RobotRow};
use crate::domain::actor::Action;
use crate::domain::ageing::ageing_days;
use crate::domain::fields::{EntityField, FieldPath, PartDateField};
use crate::domain::parts::{default_part_map, editor_visible, is_catalog_part, PartIssueState};
use crate::domain::status::{
    plan_breakdown_change, plan_running_change, BasisAction, BreakdownStatus, RunningStatus,
    StatusPlan, StatusSnapshot, is_work_status,
};
use crate::error::{FleetError, FleetResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

/// Robot as served to the dashboard: stored fields plus the derived ageing,
/// the complete part map and the part-editor visibility flag.
#[derive(Debug, Serialize)]
pub struct RobotPayload {
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
    pub ageing: i64,
    pub part_issues: BTreeMap<String, PartIssueState>,
    pub selected_parts: usize,
    pub issue_editor_visible: bool,
    pub last_updated: DateTime<Utc>,
}

fn rbt_numeric_suffix(id: &str) -> i64 {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn build_payload(
    row: RobotRow,
    parts: Vec<PartIssueRow>,
    now: DateTime<Utc>,
) -> RobotPayload {
    let running = RunningStatus::parse(&row.running_status).unwrap_or(RunningStatus::Auto);
    let breakdown = BreakdownStatus::parse(&row.breakdown_status).unwrap_or(BreakdownStatus::Na);

    // Complete map over the catalog; stored rows overlay the defaults.
    let mut part_issues = default_part_map();
    for part in parts {
        part_issues.insert(
            part.part,
            PartIssueState {
                selected: part.selected,
                dispatch_date: part.dispatch_date,
                delivery_date: part.delivery_date,
            },
        );
    }
    let selected_parts = part_issues.values().filter(|p| p.selected).count();

    RobotPayload {
        ageing: ageing_days(running, row.running_manual_at, row.running_not_running_at, now),
        issue_editor_visible: editor_visible(running, breakdown),
        client: row.client,
        site: row.site,
        rbt_id: row.rbt_id,
        cleaner_did: row.cleaner_did,
        tc_did: row.tc_did,
        cl_pcb_model: row.cl_pcb_model,
        tc_pcb_model: row.tc_pcb_model,
        running_status: row.running_status,
        breakdown_status: row.breakdown_status,
        work: row.work,
        target_date: row.target_date,
        part_issues,
        selected_parts,
        last_updated: row.last_updated,
    }
}

/// Load robots for a client (optionally one site), with part maps and
/// derived fields, ordered by site then numeric RBT suffix.
pub async fn load_robots(
    pool: &DbPool,
    client: &str,
    site: Option<&str>,
) -> FleetResult<Vec<RobotPayload>> {
    let rows: Vec<RobotRow> = match site {
        Some(site) => {
            sqlx::query_as("SELECT * FROM robots WHERE client = $1 AND site = $2")
                .bind(client)
                .bind(site)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM robots WHERE client = $1")
                .bind(client)
                .fetch_all(pool)
                .await?
        }
    };

    let part_rows: Vec<PartIssueRow> =
        sqlx::query_as("SELECT * FROM part_issues WHERE client = $1")
            .bind(client)
            .fetch_all(pool)
            .await?;
    let mut by_robot: BTreeMap<(String, String), Vec<PartIssueRow>> = BTreeMap::new();
    for part in part_rows {
        by_robot
            .entry((part.site.clone(), part.rbt_id.clone()))
            .or_default()
            .push(part);
    }

    let now = Utc::now();
    let mut payloads: Vec<RobotPayload> = rows
        .into_iter()
        .map(|row| {
            let parts = by_robot
                .remove(&(row.site.clone(), row.rbt_id.clone()))
                .unwrap_or_default();
            build_payload(row, parts, now)
        })
        .collect();
    payloads.sort_by(|a, b| {
        (a.site.as_str(), rbt_numeric_suffix(&a.rbt_id))
            .cmp(&(b.site.as_str(), rbt_numeric_suffix(&b.rbt_id)))
    });
    Ok(payloads)
}

#[derive(Debug, Deserialize)]
pub struct RobotListQuery {
    pub client: String,
    pub site: Option<String>,
}

pub async fn get_robots(
    State(state): State<AppState>,
    Query(params): Query<RobotListQuery>,
) -> FleetResult<Json<Vec<RobotPayload>>> {
    if params.client.is_empty() {
        return Err(FleetError::Validation("A client must be selected".into()));
    }
    let robots = load_robots(&state.pool, &params.client, params.site.as_deref()).await?;
    Ok(Json(robots))
}

#[derive(Debug, Deserialize)]
pub struct RobotRef {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
}

impl RobotRef {
    fn validate(&self) -> FleetResult<()> {
        if self.client.is_empty() || self.site.is_empty() || self.rbt_id.is_empty() {
            return Err(FleetError::Validation(
                "Client, site and RBT id are required".into(),
            ));
        }
        Ok(())
    }

    fn scope(&self) -> Scope {
        Scope {
            client: self.client.clone(),
            site: self.site.clone(),
            rbt_id: self.rbt_id.clone(),
        }
    }
}

async fn fetch_robot(pool: &DbPool, rbt: &RobotRef) -> FleetResult<RobotRow> {
    sqlx::query_as("SELECT * FROM robots WHERE client = $1 AND site = $2 AND rbt_id = $3")
        .bind(&rbt.client)
        .bind(&rbt.site)
        .bind(&rbt.rbt_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            FleetError::NotFound(format!("Robot {}/{} not found", rbt.site, rbt.rbt_id))
        })
}

#[derive(Debug, Deserialize)]
pub struct CreateRobotRequest {
    pub client: String,
    pub site: String,
}

pub async fn create_robot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRobotRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::AddRobot)?;
    if payload.client.is_empty() || payload.site.is_empty() {
        return Err(FleetError::Validation(
            "Client and site must be selected".into(),
        ));
    }

    let known: Option<(String,)> =
        sqlx::query_as("SELECT site FROM sites WHERE client = $1 AND site = $2")
            .bind(&payload.client)
            .bind(&payload.site)
            .fetch_optional(&state.pool)
            .await?;
    if known.is_none() {
        return Err(FleetError::NotFound(format!(
            "Site '{}' does not exist under client '{}'",
            payload.site, payload.client
        )));
    }

    // Next sequential id within the site.
    let ids: Vec<(String,)> =
        sqlx::query_as("SELECT rbt_id FROM robots WHERE client = $1 AND site = $2")
            .bind(&payload.client)
            .bind(&payload.site)
            .fetch_all(&state.pool)
            .await?;
    let next = ids
        .iter()
        .map(|(id,)| rbt_numeric_suffix(id))
        .max()
        .unwrap_or(0)
        + 1;
    let rbt_id = format!("RBT{}", next);

    sqlx::query("INSERT INTO robots (client, site, rbt_id) VALUES ($1, $2, $3)")
        .bind(&payload.client)
        .bind(&payload.site)
        .bind(&rbt_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(json!({ "success": true, "rbt_id": rbt_id })))
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    #[serde(flatten)]
    pub rbt: RobotRef,
    pub field: String,
    pub value: String,
    pub target_date: Option<NaiveDate>,
}

fn plan_for(row: &RobotRow, field: &str, value: &str) -> FleetResult<StatusPlan> {
    let snapshot = StatusSnapshot {
        running: RunningStatus::parse(&row.running_status).unwrap_or(RunningStatus::Auto),
        breakdown: BreakdownStatus::parse(&row.breakdown_status).unwrap_or(BreakdownStatus::Na),
        manual_at: row.running_manual_at,
        not_running_at: row.running_not_running_at,
    };
    match field {
        "running_status" => {
            let next = RunningStatus::parse(value).ok_or_else(|| {
                FleetError::Validation(format!("Unknown running status '{}'", value))
            })?;
            Ok(plan_running_change(&snapshot, next))
        }
        "breakdown_status" => {
            let next = BreakdownStatus::parse(value).ok_or_else(|| {
                FleetError::Validation(format!("Unknown breakdown status '{}'", value))
            })?;
            Ok(plan_breakdown_change(&snapshot, next))
        }
        other => Err(FleetError::Validation(format!(
            "'{}' is not a status field",
            other
        ))),
    }
}

/// Apply a running/breakdown status change through the transition planner.
/// Every changed field gets its own log row; the ageing-basis timestamps
/// ride along silently in the entity update.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StatusChangeRequest>,
) -> FleetResult<Json<Value>> {
    let actor = claims.actor()?;
    actor.require(Action::EditStatus)?;
    payload.rbt.validate()?;

    let row = fetch_robot(&state.pool, &payload.rbt).await?;
    let plan = plan_for(&row, &payload.field, &payload.value)?;

    if plan.requires_target_date && payload.target_date.is_none() && row.target_date.is_none() {
        return Err(FleetError::Validation(
            "A target date is required when leaving the Auto state".into(),
        ));
    }

    let now = Utc::now();
    let mut changes = Vec::new();
    if plan.running.as_str() != row.running_status {
        changes.push(FieldChange {
            path: FieldPath::Entity(EntityField::RunningStatus),
            old: json!(row.running_status),
            new: json!(plan.running.as_str()),
        });
    }
    if plan.breakdown.as_str() != row.breakdown_status {
        changes.push(FieldChange {
            path: FieldPath::Entity(EntityField::BreakdownStatus),
            old: json!(row.breakdown_status),
            new: json!(plan.breakdown.as_str()),
        });
    }
    if let Some(date) = payload.target_date {
        if row.target_date != Some(date) {
            changes.push(FieldChange {
                path: FieldPath::Entity(EntityField::TargetDate),
                old: json!(row.target_date.map(|d| d.to_string())),
                new: json!(date.to_string()),
            });
        }
    }

    let basis = BasisWrite {
        manual_at: match plan.manual_at {
            BasisAction::Keep => None,
            action => Some(action.apply(row.running_manual_at, now)),
        },
        not_running_at: match plan.not_running_at {
            BasisAction::Keep => None,
            action => Some(action.apply(row.running_not_running_at, now)),
        },
    };

    let written = apply_changes(&state.pool, &payload.rbt.scope(), &actor, changes, basis).await?;
    Ok(Json(json!({ "success": true, "changed_fields": written })))
}

#[derive(Debug, Deserialize)]
pub struct FieldEditRequest {
    #[serde(flatten)]
    pub rbt: RobotRef,
    pub field: String,
    pub value: String,
}

/// Direct edit of a non-status entity field: `work`, `target_date` or one of
/// the free-text identity fields. Statuses go through `update_status`.
pub async fn update_field(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<FieldEditRequest>,
) -> FleetResult<Json<Value>> {
    let actor = claims.actor()?;
    payload.rbt.validate()?;

    let field = EntityField::parse(&payload.field)
        .ok_or_else(|| FleetError::Validation(format!("Unknown field '{}'", payload.field)))?;

    let row = fetch_robot(&state.pool, &payload.rbt).await?;
    let value = payload.value.trim().to_string();

    let change = match field {
        EntityField::RunningStatus | EntityField::BreakdownStatus => {
            return Err(FleetError::Validation(
                "Status fields must go through the status endpoint".into(),
            ));
        }
        EntityField::Work => {
            actor.require(Action::EditStatus)?;
            if !value.is_empty() && !is_work_status(&value) {
                return Err(FleetError::Validation(format!(
                    "Unknown work status '{}'",
                    value
                )));
            }
            FieldChange {
                path: FieldPath::Entity(field),
                old: json!(row.work),
                new: json!(value),
            }
        }
        EntityField::TargetDate => {
            actor.require(Action::EditStatus)?;
            FieldChange {
                path: FieldPath::Entity(field),
                old: json!(row.target_date.map(|d| d.to_string())),
                new: if value.is_empty() {
                    Value::Null
                } else {
                    json!(value)
                },
            }
        }
        free_text => {
            actor.require(Action::EditFreeText)?;
            let old = match free_text {
                EntityField::CleanerDid => &row.cleaner_did,
                EntityField::TcDid => &row.tc_did,
                EntityField::ClPcbModel => &row.cl_pcb_model,
                EntityField::TcPcbModel => &row.tc_pcb_model,
                _ => unreachable!(),
            };
            FieldChange {
                path: FieldPath::Entity(free_text),
                old: json!(old),
                new: json!(value),
            }
        }
    };

    let written =
        apply_changes(&state.pool, &payload.rbt.scope(), &actor, vec![change], BasisWrite::default())
            .await?;
    Ok(Json(json!({ "success": true, "changed_fields": written })))
}

async fn fetch_part_state(
    pool: &DbPool,
    rbt: &RobotRef,
    part: &str,
) -> FleetResult<PartIssueState> {
    let row: Option<PartIssueRow> = sqlx::query_as(
        "SELECT * FROM part_issues WHERE client = $1 AND site = $2 AND rbt_id = $3 AND part = $4",
    )
    .bind(&rbt.client)
    .bind(&rbt.site)
    .bind(&rbt.rbt_id)
    .bind(part)
    .fetch_optional(pool)
    .await?;
    Ok(row
        .map(|r| PartIssueState {
            selected: r.selected,
            dispatch_date: r.dispatch_date,
            delivery_date: r.delivery_date,
        })
        .unwrap_or_default())
}

#[derive(Debug, Deserialize)]
pub struct PartToggleRequest {
    #[serde(flatten)]
    pub rbt: RobotRef,
    pub part: String,
}

pub async fn toggle_part(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PartToggleRequest>,
) -> FleetResult<Json<Value>> {
    let actor = claims.actor()?;
    actor.require(Action::EditPartIssue)?;
    payload.rbt.validate()?;
    if !is_catalog_part(&payload.part) {
        return Err(FleetError::Validation(format!(
            "Unknown part '{}'",
            payload.part
        )));
    }

    fetch_robot(&state.pool, &payload.rbt).await?;
    let current = fetch_part_state(&state.pool, &payload.rbt, &payload.part).await?;
    let next = current.toggled();

    let change = FieldChange {
        path: FieldPath::Part(payload.part.clone()),
        old: serde_json::to_value(&current)?,
        new: serde_json::to_value(&next)?,
    };
    apply_changes(&state.pool, &payload.rbt.scope(), &actor, vec![change], BasisWrite::default())
        .await?;

    Ok(Json(json!({ "success": true, "part": payload.part, "state": next })))
}

#[derive(Debug, Deserialize)]
pub struct PartDateRequest {
    #[serde(flatten)]
    pub rbt: RobotRef,
    pub part: String,
    pub subfield: String,
    pub value: Option<NaiveDate>,
}

pub async fn set_part_date(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<PartDateRequest>,
) -> FleetResult<Json<Value>> {
    let actor = claims.actor()?;
    actor.require(Action::EditPartIssue)?;
    payload.rbt.validate()?;
    if !is_catalog_part(&payload.part) {
        return Err(FleetError::Validation(format!(
            "Unknown part '{}'",
            payload.part
        )));
    }
    let subfield = PartDateField::parse(&payload.subfield).ok_or_else(|| {
        FleetError::Validation(format!("Unknown part field '{}'", payload.subfield))
    })?;

    fetch_robot(&state.pool, &payload.rbt).await?;
    let current = fetch_part_state(&state.pool, &payload.rbt, &payload.part).await?;
    if !current.selected {
        return Err(FleetError::Validation(format!(
            "Part '{}' is not selected",
            payload.part
        )));
    }

    let old = match subfield {
        PartDateField::Dispatch => current.dispatch_date,
        PartDateField::Delivery => current.delivery_date,
    };
    let change = FieldChange {
        path: FieldPath::PartDate(payload.part.clone(), subfield),
        old: json!(old.map(|d| d.to_string())),
        new: json!(payload.value.map(|d| d.to_string())),
    };
    let written =
        apply_changes(&state.pool, &payload.rbt.scope(), &actor, vec![change], BasisWrite::default())
            .await?;
    Ok(Json(json!({ "success": true, "changed_fields": written })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> FleetResult<Json<Vec<HistoryRow>>> {
    let rows: Vec<HistoryRow> = sqlx::query_as(
        "SELECT * FROM robot_history
         WHERE client = $1 AND site = $2 AND rbt_id = $3
         ORDER BY day DESC",
    )
    .bind(&params.client)
    .bind(&params.site)
    .bind(&params.rbt_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(rows))
}

/// Irreversible delete. The robot row and its part rows go; history and log
/// rows stay behind as orphans.
pub async fn delete_robot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RobotRef>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::DeleteRobot)?;
    payload.validate()?;

    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM part_issues WHERE client = $1 AND site = $2 AND rbt_id = $3")
        .bind(&payload.client)
        .bind(&payload.site)
        .bind(&payload.rbt_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM robots WHERE client = $1 AND site = $2 AND rbt_id = $3")
        .bind(&payload.client)
        .bind(&payload.site)
        .bind(&payload.rbt_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(FleetError::NotFound(format!(
            "Robot {}/{} not found",
            payload.site, payload.rbt_id
        )));
    }
    tx.commit().await?;

    tracing::info!(
        "Robot {}/{}/{} deleted by {}",
        payload.client,
        payload.site,
        payload.rbt_id,
        claims.email
    );
    Ok(Json(json!({ "success": true })))
}
