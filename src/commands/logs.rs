use axum::extract::{Extension, Json, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::RbtLog;
use crate::domain::actor::Action;
use crate::error::{FleetError, FleetResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub client: Option<String>,
    pub site: Option<String>,
    pub rbt_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn fetch_logs(state: &AppState, params: &LogQuery) -> FleetResult<Vec<RbtLog>> {
    // Date filters are inclusive calendar days.
    let rows: Vec<RbtLog> = sqlx::query_as(
        "SELECT * FROM rbt_logs
         WHERE ($1::text IS NULL OR client = $1)
           AND ($2::text IS NULL OR site = $2)
           AND ($3::text IS NULL OR rbt_id = $3)
           AND ($4::date IS NULL OR timestamp >= $4::date)
           AND ($5::date IS NULL OR timestamp < $5::date + 1)
         ORDER BY timestamp DESC",
    )
    .bind(&params.client)
    .bind(&params.site)
    .bind(&params.rbt_id)
    .bind(params.from)
    .bind(params.to)
    .fetch_all(&state.pool)
    .await?;
    Ok(rows)
}

pub async fn get_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> FleetResult<Json<Vec<RbtLog>>> {
    Ok(Json(fetch_logs(&state, &params).await?))
}

/// Flatten a part-issue log value for CSV: keep only parts with at least one
/// date, `PART: dispatch=<d> • delivery=<d>` joined with `; `. Handles both
/// shapes seen in log rows: a single part object (`part_issues.<PART>`) and
/// a whole map keyed by part name.
pub fn compact_part_value(field: &str, raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object()?;

    let single = obj.contains_key("selected")
        || obj.contains_key("dispatch_date")
        || obj.contains_key("delivery_date");
    let entries: Vec<(String, &serde_json::Map<String, Value>)> = if single {
        let part = field.strip_prefix("part_issues.")?;
        let part = part.split('.').next().unwrap_or(part);
        vec![(part.to_string(), obj)]
    } else {
        obj.iter()
            .filter_map(|(k, v)| v.as_object().map(|m| (k.clone(), m)))
            .collect()
    };

    let date_of = |m: &serde_json::Map<String, Value>, key: &str| -> Option<String> {
        match m.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    };

    let flattened: Vec<String> = entries
        .into_iter()
        .filter_map(|(part, m)| {
            let mut bits = Vec::new();
            if let Some(d) = date_of(m, "dispatch_date") {
                bits.push(format!("dispatch={}", d));
            }
            if let Some(d) = date_of(m, "delivery_date") {
                bits.push(format!("delivery={}", d));
            }
            if bits.is_empty() {
                None
            } else {
                Some(format!("{}: {}", part, bits.join(" \u{2022} ")))
            }
        })
        .collect();

    if flattened.is_empty() {
        None
    } else {
        Some(flattened.join("; "))
    }
}

fn csv_value(field: &str, raw: &str) -> String {
    if field.starts_with("part_issues") {
        if let Some(compact) = compact_part_value(field, raw) {
            return compact;
        }
    }
    if raw.is_empty() {
        "-".to_string()
    } else {
        raw.to_string()
    }
}

pub async fn export_logs(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> FleetResult<impl IntoResponse> {
    let logs = fetch_logs(&state, &params).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Client", "Site", "RBT ID", "Field", "Old Value", "New Value", "Updated By", "Time",
    ])?;
    for log in &logs {
        writer.write_record([
            log.client.clone().unwrap_or_else(|| "-".to_string()),
            log.site.clone(),
            log.rbt_id.clone(),
            log.field.clone(),
            csv_value(&log.field, &log.old_value),
            csv_value(&log.field, &log.new_value),
            log.updated_by.clone(),
            log.timestamp.format("%d-%m-%Y %H:%M:%S").to_string(),
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
                "attachment; filename=\"rbt_logs_export.csv\"",
            ),
        ],
        csv,
    ))
}

#[derive(Debug, Deserialize)]
pub struct LogEditRequest {
    pub log_id: i64,
    pub old_value: String,
    pub new_value: String,
}

/// The log is append-only from the system's point of view; only a
/// super_admin may correct a row, and the correction is stamped.
pub async fn edit_log(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LogEditRequest>,
) -> FleetResult<Json<Value>> {
    let actor = claims.actor()?;
    actor.require(Action::EditLog)?;

    let result = sqlx::query(
        "UPDATE rbt_logs SET old_value = $1, new_value = $2, edited_by = $3, edited_at = $4
         WHERE log_id = $5",
    )
    .bind(&payload.old_value)
    .bind(&payload.new_value)
    .bind(&actor.email)
    .bind(Utc::now())
    .bind(payload.log_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(FleetError::NotFound(format!(
            "Log row {} not found",
            payload.log_id
        )));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct LogDeleteRequest {
    pub log_id: i64,
}

pub async fn delete_log(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LogDeleteRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::DeleteLog)?;

    let result = sqlx::query("DELETE FROM rbt_logs WHERE log_id = $1")
        .bind(payload.log_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(FleetError::NotFound(format!(
            "Log row {} not found",
            payload.log_id
        )));
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compacts_single_part_object() {
        let raw = r#"{"selected":true,"dispatch_date":"2024-01-05","delivery_date":null}"#;
        assert_eq!(
            compact_part_value("part_issues.BATTERY", raw),
            Some("BATTERY: dispatch=2024-01-05".to_string())
        );
    }

    #[test]
    fn compacts_part_map_keeping_dated_parts() {
        let raw = r#"{
            "BATTERY": {"selected":true,"dispatch_date":"2024-01-05","delivery_date":"2024-01-09"},
            "XBEE": {"selected":true,"dispatch_date":null,"delivery_date":null},
            "RTC": {"selected":false,"dispatch_date":null,"delivery_date":"2024-02-01"}
        }"#;
        let compact = compact_part_value("part_issues", raw).unwrap();
        assert_eq!(
            compact,
            "BATTERY: dispatch=2024-01-05 \u{2022} delivery=2024-01-09; RTC: delivery=2024-02-01"
        );
    }

    #[test]
    fn non_json_values_pass_through() {
        assert_eq!(compact_part_value("part_issues.BATTERY", "Manual"), None);
        assert_eq!(csv_value("running_status", "Manual"), "Manual");
        assert_eq!(csv_value("running_status", ""), "-");
    }

    #[test]
    fn dateless_parts_compact_to_nothing() {
        let raw = r#"{"selected":true,"dispatch_date":null,"delivery_date":null}"#;
        assert_eq!(compact_part_value("part_issues.BATTERY", raw), None);
        assert_eq!(csv_value("part_issues.BATTERY", raw), raw);
    }
}
