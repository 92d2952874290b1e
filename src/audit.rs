use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{Postgres, Transaction};

use crate::db::DbPool;
use crate::domain::actor::Actor;
use crate::domain::fields::{EntityField, FieldPath};
use crate::domain::parts::PartIssueState;
use crate::error::{FleetError, FleetResult};

/// Identifies the robot a batch of changes applies to.
#[derive(Debug, Clone)]
pub struct Scope {
    pub client: String,
    pub site: String,
    pub rbt_id: String,
}

/// One field mutation with its before/after values.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub path: FieldPath,
    pub old: Value,
    pub new: Value,
}

/// Pending writes to the ageing-basis timestamps. They ride along with a
/// status change in the entity update but get no log rows of their own.
/// `None` leaves the column untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasisWrite {
    pub manual_at: Option<Option<DateTime<Utc>>>,
    pub not_running_at: Option<Option<DateTime<Utc>>>,
}

/// How log rows store values: objects JSON-stringified, primitives coerced
/// to string, null/empty collapsing to the `-` sentinel.
pub fn serialize_value(v: &Value) -> String {
    match v {
        Value::Null => "-".to_string(),
        Value::String(s) if s.is_empty() => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply a batch of field changes to one robot: entity update, per-day
/// history merge, and one audit log row per change, committed as a single
/// transaction. Unchanged values are dropped first; an all-no-op call
/// performs zero writes and returns 0.
pub async fn apply_changes(
    pool: &DbPool,
    scope: &Scope,
    actor: &Actor,
    mut changes: Vec<FieldChange>,
    basis: BasisWrite,
) -> FleetResult<usize> {
    changes.retain(|c| c.old != c.new);
    if changes.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for change in &changes {
        write_field(&mut tx, scope, change).await?;
    }

    if let Some(manual_at) = basis.manual_at {
        sqlx::query(
            "UPDATE robots SET running_manual_at = $1 WHERE client = $2 AND site = $3 AND rbt_id = $4",
        )
        .bind(manual_at)
        .bind(&scope.client)
        .bind(&scope.site)
        .bind(&scope.rbt_id)
        .execute(&mut *tx)
        .await?;
    }
    if let Some(not_running_at) = basis.not_running_at {
        sqlx::query(
            "UPDATE robots SET running_not_running_at = $1 WHERE client = $2 AND site = $3 AND rbt_id = $4",
        )
        .bind(not_running_at)
        .bind(&scope.client)
        .bind(&scope.site)
        .bind(&scope.rbt_id)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE robots SET last_updated = $1 WHERE client = $2 AND site = $3 AND rbt_id = $4")
        .bind(now)
        .bind(&scope.client)
        .bind(&scope.site)
        .bind(&scope.rbt_id)
        .execute(&mut *tx)
        .await?;

    // One history row per robot per UTC day, merged field-by-field so the
    // latest change of the day wins.
    let mut day_changes = serde_json::Map::new();
    for change in &changes {
        day_changes.insert(change.path.dotted(), change.new.clone());
    }
    sqlx::query(
        "INSERT INTO robot_history (client, site, rbt_id, day, changes, updated_by, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (client, site, rbt_id, day)
         DO UPDATE SET changes = robot_history.changes || EXCLUDED.changes,
                       updated_by = EXCLUDED.updated_by,
                       updated_at = EXCLUDED.updated_at",
    )
    .bind(&scope.client)
    .bind(&scope.site)
    .bind(&scope.rbt_id)
    .bind(now.date_naive())
    .bind(Value::Object(day_changes))
    .bind(&actor.email)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let client = (!scope.client.is_empty()).then_some(scope.client.as_str());
    for change in &changes {
        sqlx::query(
            "INSERT INTO rbt_logs (client, site, rbt_id, field, old_value, new_value, updated_by, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(client)
        .bind(&scope.site)
        .bind(&scope.rbt_id)
        .bind(change.path.dotted())
        .bind(serialize_value(&change.old))
        .bind(serialize_value(&change.new))
        .bind(&actor.email)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(changes.len())
}

async fn write_field(
    tx: &mut Transaction<'_, Postgres>,
    scope: &Scope,
    change: &FieldChange,
) -> FleetResult<()> {
    match &change.path {
        FieldPath::Entity(EntityField::TargetDate) => {
            sqlx::query(
                "UPDATE robots SET target_date = $1 WHERE client = $2 AND site = $3 AND rbt_id = $4",
            )
            .bind(value_as_date(&change.new)?)
            .bind(&scope.client)
            .bind(&scope.site)
            .bind(&scope.rbt_id)
            .execute(&mut **tx)
            .await?;
        }
        FieldPath::Entity(field) => {
            // Column names come from the closed enum, never from input.
            let sql = format!(
                "UPDATE robots SET {} = $1 WHERE client = $2 AND site = $3 AND rbt_id = $4",
                field.column()
            );
            sqlx::query(&sql)
                .bind(value_as_text(&change.new))
                .bind(&scope.client)
                .bind(&scope.site)
                .bind(&scope.rbt_id)
                .execute(&mut **tx)
                .await?;
        }
        FieldPath::Part(part) => {
            let state: PartIssueState = serde_json::from_value(change.new.clone())?;
            sqlx::query(
                "INSERT INTO part_issues (client, site, rbt_id, part, selected, dispatch_date, delivery_date)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (client, site, rbt_id, part)
                 DO UPDATE SET selected = EXCLUDED.selected,
                               dispatch_date = EXCLUDED.dispatch_date,
                               delivery_date = EXCLUDED.delivery_date",
            )
            .bind(&scope.client)
            .bind(&scope.site)
            .bind(&scope.rbt_id)
            .bind(part)
            .bind(state.selected)
            .bind(state.dispatch_date)
            .bind(state.delivery_date)
            .execute(&mut **tx)
            .await?;
        }
        FieldPath::PartDate(part, sub) => {
            let sql = format!(
                "INSERT INTO part_issues (client, site, rbt_id, part, selected, {col})
                 VALUES ($1, $2, $3, $4, TRUE, $5)
                 ON CONFLICT (client, site, rbt_id, part)
                 DO UPDATE SET {col} = EXCLUDED.{col}",
                col = sub.column()
            );
            sqlx::query(&sql)
                .bind(&scope.client)
                .bind(&scope.site)
                .bind(&scope.rbt_id)
                .bind(part)
                .bind(value_as_date(&change.new)?)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

fn value_as_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_as_date(v: &Value) -> FleetResult<Option<NaiveDate>> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| FleetError::Validation(format!("Invalid date: {}", s))),
        other => Err(FleetError::Validation(format!("Invalid date: {}", other))),
    }
}
