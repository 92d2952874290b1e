use axum::extract::{Json, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::commands::robot::{load_robots, RobotPayload};
use crate::db::FleetSummary;
use crate::error::{FleetError, FleetResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub client: String,
}

/// Per-client robot counts, computed in one pass.
pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryQuery>,
) -> FleetResult<Json<FleetSummary>> {
    let summary: FleetSummary = sqlx::query_as(
        "SELECT COUNT(*) AS total_robots,
                COUNT(*) FILTER (WHERE running_status = 'Auto') AS auto_count,
                COUNT(*) FILTER (WHERE running_status = 'Manual') AS manual_count,
                COUNT(*) FILTER (WHERE running_status = 'Not Running') AS not_running_count,
                COUNT(*) FILTER (WHERE breakdown_status = 'Breakdown') AS breakdown_count,
                COUNT(*) FILTER (WHERE breakdown_status = 'Running With Issue') AS with_issue_count
         FROM robots WHERE client = $1",
    )
    .bind(&params.client)
    .fetch_one(&state.pool)
    .await?;
    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub client: String,
    pub site: Option<String>,
    pub running_status: Option<String>,
    pub breakdown_status: Option<String>,
    pub work: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn filtered_robots(
    state: &AppState,
    params: &DashboardQuery,
) -> FleetResult<Vec<RobotPayload>> {
    if params.client.is_empty() {
        return Err(FleetError::Validation("A client must be selected".into()));
    }
    let mut robots = load_robots(&state.pool, &params.client, params.site.as_deref()).await?;

    if let Some(running) = &params.running_status {
        robots.retain(|r| &r.running_status == running);
    }
    if let Some(breakdown) = &params.breakdown_status {
        robots.retain(|r| &r.breakdown_status == breakdown);
    }
    if let Some(work) = &params.work {
        robots.retain(|r| &r.work == work);
    }
    if let Some(from) = params.from {
        robots.retain(|r| r.last_updated.date_naive() >= from);
    }
    if let Some(to) = params.to {
        robots.retain(|r| r.last_updated.date_naive() <= to);
    }
    Ok(robots)
}

pub async fn get_dashboard_robots(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> FleetResult<Json<Vec<RobotPayload>>> {
    Ok(Json(filtered_robots(&state, &params).await?))
}

pub async fn export_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> FleetResult<impl IntoResponse> {
    let robots = filtered_robots(&state, &params).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Site",
        "RBT",
        "Running Status",
        "Breakdown Status",
        "Work",
        "Ageing",
        "Last Updated",
    ])?;
    for robot in &robots {
        writer.write_record([
            robot.site.clone(),
            robot.rbt_id.clone(),
            robot.running_status.clone(),
            robot.breakdown_status.clone(),
            robot.work.clone(),
            robot.ageing.to_string(),
            robot.last_updated.format("%d-%m-%Y %H:%M:%S").to_string(),
        ])?;
    }
    let csv = String::from_utf8(
        writer
            .into_inner()
            .map_err(|e| FleetError::Internal(format!("CSV write error: {}", e)))?,
    )
    .map_err(|e| FleetError::Internal(format!("CSV encoding error: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"fleet_dashboard_export.csv\"",
            ),
        ],
        csv,
    ))
}
