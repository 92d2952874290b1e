use axum::extract::{Extension, Json, Query, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{ClientRow, SiteRow};
use crate::domain::actor::Action;
use crate::error::{FleetError, FleetResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;

pub async fn get_clients(State(state): State<AppState>) -> FleetResult<Json<Vec<String>>> {
    let rows: Vec<ClientRow> = sqlx::query_as("SELECT * FROM clients ORDER BY client ASC")
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(rows.into_iter().map(|r| r.client).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    pub client: String,
}

pub async fn get_sites(
    State(state): State<AppState>,
    Query(params): Query<ClientQuery>,
) -> FleetResult<Json<Vec<String>>> {
    let rows: Vec<SiteRow> =
        sqlx::query_as("SELECT * FROM sites WHERE client = $1 ORDER BY site ASC")
            .bind(&params.client)
            .fetch_all(&state.pool)
            .await?;
    Ok(Json(rows.into_iter().map(|r| r.site).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub client: String,
}

pub async fn create_client(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateClientRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::AddSite)?;

    let client = payload.client.trim().to_string();
    if client.is_empty() {
        return Err(FleetError::Validation("Client name is required".into()));
    }

    let duplicate: Option<(String,)> =
        sqlx::query_as("SELECT client FROM clients WHERE LOWER(client) = LOWER($1)")
            .bind(&client)
            .fetch_optional(&state.pool)
            .await?;
    if let Some((existing,)) = duplicate {
        return Err(FleetError::Validation(format!(
            "Client '{}' already exists",
            existing
        )));
    }

    sqlx::query("INSERT INTO clients (client) VALUES ($1)")
        .bind(&client)
        .execute(&state.pool)
        .await?;

    Ok(Json(json!({ "success": true, "client": client })))
}

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub client: String,
    pub site: String,
}

pub async fn create_site(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSiteRequest>,
) -> FleetResult<Json<Value>> {
    claims.actor()?.require(Action::AddSite)?;

    let site = payload.site.trim().to_string();
    if payload.client.is_empty() || site.is_empty() {
        return Err(FleetError::Validation(
            "Client and site names are required".into(),
        ));
    }

    let known: Option<(String,)> = sqlx::query_as("SELECT client FROM clients WHERE client = $1")
        .bind(&payload.client)
        .fetch_optional(&state.pool)
        .await?;
    if known.is_none() {
        return Err(FleetError::NotFound(format!(
            "Client '{}' does not exist",
            payload.client
        )));
    }

    sqlx::query("INSERT INTO sites (client, site) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(&payload.client)
        .bind(&site)
        .execute(&state.pool)
        .await?;

    Ok(Json(json!({ "success": true, "site": site })))
}
