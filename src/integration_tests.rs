#[cfg(test)]
mod tests {
    use axum::extract::{Extension, Json, State};
    use chrono::NaiveDate;
    use uuid::Uuid;

    use crate::commands::maintenance::import_rows;
    use crate::commands::robot::{delete_robot, update_status, RobotRef, StatusChangeRequest};
    use crate::db::{self, DbPool, RobotRow};
    use crate::importer::parse_csv;
    use crate::middleware::auth::Claims;
    use crate::state::AppState;

    async fn test_pool() -> Option<DbPool> {
        dotenvy::dotenv().ok();
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set; skipping integration test");
                return None;
            }
        };
        let pool = db::init_pool(&url).await.ok()?;
        db::init_database(&pool).await.ok()?;
        Some(pool)
    }

    fn claims(role: &str) -> Claims {
        Claims {
            sub: format!("test-{}", role),
            email: format!("{}@integration.test", role),
            role: role.to_string(),
            sid: Uuid::new_v4().to_string(),
            exp: usize::MAX,
        }
    }

    async fn seed_robot(pool: &DbPool, client: &str, site: &str, rbt_id: &str) {
        sqlx::query("INSERT INTO clients (client) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(client)
            .execute(pool)
            .await
            .expect("seed client");
        sqlx::query("INSERT INTO sites (client, site) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(client)
            .bind(site)
            .execute(pool)
            .await
            .expect("seed site");
        sqlx::query(
            "INSERT INTO robots (client, site, rbt_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(client)
        .bind(site)
        .bind(rbt_id)
        .execute(pool)
        .await
        .expect("seed robot");
    }

    async fn cleanup_client(pool: &DbPool, client: &str) {
        for table in [
            "part_issues",
            "robot_history",
            "robots",
            "sites",
            "clients",
        ] {
            let sql = format!("DELETE FROM {} WHERE client = $1", table);
            let _ = sqlx::query(&sql).bind(client).execute(pool).await;
        }
        let _ = sqlx::query("DELETE FROM rbt_logs WHERE client = $1")
            .bind(client)
            .execute(pool)
            .await;
    }

    async fn fetch_robot(pool: &DbPool, client: &str, site: &str, rbt_id: &str) -> RobotRow {
        sqlx::query_as("SELECT * FROM robots WHERE client = $1 AND site = $2 AND rbt_id = $3")
            .bind(client)
            .bind(site)
            .bind(rbt_id)
            .fetch_one(pool)
            .await
            .expect("fetch robot")
    }

    async fn log_count(pool: &DbPool, client: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rbt_logs WHERE client = $1")
            .bind(client)
            .fetch_one(pool)
            .await
            .expect("count logs");
        count
    }

    #[tokio::test]
    async fn status_change_writes_entity_history_and_log() {
        let Some(pool) = test_pool().await else { return };
        let client = format!("it-juniper-{}", Uuid::new_v4());
        seed_robot(&pool, &client, "Parola", "RBT3").await;

        let state = AppState { pool: pool.clone() };
        let request = StatusChangeRequest {
            rbt: RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT3".to_string(),
            },
            field: "running_status".to_string(),
            value: "Manual".to_string(),
            target_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        };
        update_status(State(state.clone()), Extension(claims("admin")), Json(request))
            .await
            .expect("status change");

        let row = fetch_robot(&pool, &client, "Parola", "RBT3").await;
        assert_eq!(row.running_status, "Manual");
        assert_eq!(row.breakdown_status, "Running With Issue");
        assert!(row.running_manual_at.is_some());
        assert!(row.running_not_running_at.is_none());

        // running_status, breakdown_status and target_date each get a row.
        assert_eq!(log_count(&pool, &client).await, 3);
        let (history_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM robot_history WHERE client = $1")
                .bind(&client)
                .fetch_one(&pool)
                .await
                .expect("count history");
        assert_eq!(history_count, 1);

        // Back to nominal: both bases clear, breakdown resets, and even after
        // a mid-sequence failure the entity row alone satisfies the invariant.
        let reset = StatusChangeRequest {
            rbt: RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT3".to_string(),
            },
            field: "breakdown_status".to_string(),
            value: "N/A".to_string(),
            target_date: None,
        };
        update_status(State(state), Extension(claims("admin")), Json(reset))
            .await
            .expect("nominal reset");

        let row = fetch_robot(&pool, &client, "Parola", "RBT3").await;
        assert_eq!(row.running_status, "Auto");
        assert_eq!(row.breakdown_status, "N/A");
        assert!(row.running_manual_at.is_none());
        assert!(row.running_not_running_at.is_none());

        cleanup_client(&pool, &client).await;
    }

    #[tokio::test]
    async fn noop_status_change_writes_nothing() {
        let Some(pool) = test_pool().await else { return };
        let client = format!("it-noop-{}", Uuid::new_v4());
        seed_robot(&pool, &client, "Parola", "RBT1").await;

        let before = fetch_robot(&pool, &client, "Parola", "RBT1").await;
        let state = AppState { pool: pool.clone() };
        let request = StatusChangeRequest {
            rbt: RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT1".to_string(),
            },
            field: "running_status".to_string(),
            value: "Auto".to_string(),
            target_date: None,
        };
        update_status(State(state), Extension(claims("admin")), Json(request))
            .await
            .expect("noop change");

        assert_eq!(log_count(&pool, &client).await, 0);
        let (history_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM robot_history WHERE client = $1")
                .bind(&client)
                .fetch_one(&pool)
                .await
                .expect("count history");
        assert_eq!(history_count, 0);
        let after = fetch_robot(&pool, &client, "Parola", "RBT1").await;
        assert_eq!(after.last_updated, before.last_updated);

        cleanup_client(&pool, &client).await;
    }

    #[tokio::test]
    async fn viewer_delete_is_rejected_before_any_write() {
        let Some(pool) = test_pool().await else { return };
        let client = format!("it-viewer-{}", Uuid::new_v4());
        seed_robot(&pool, &client, "Parola", "RBT9").await;

        let state = AppState { pool: pool.clone() };
        let result = delete_robot(
            State(state),
            Extension(claims("viewer")),
            Json(RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT9".to_string(),
            }),
        )
        .await;
        assert!(result.is_err(), "viewer delete must be rejected");

        // Robot survived.
        fetch_robot(&pool, &client, "Parola", "RBT9").await;

        cleanup_client(&pool, &client).await;
    }

    #[tokio::test]
    async fn bulk_upload_stores_partial_part_dates() {
        let Some(pool) = test_pool().await else { return };
        let client = format!("it-import-{}", Uuid::new_v4());

        let csv = "site,rbt_id,part_issue:BATTERY:dispatch_date,part_issue:BATTERY:delivery_date\n\
                   Tembhe,RBT7,2024-01-05,\n";
        let rows = parse_csv(csv.as_bytes()).expect("parse csv");
        let report = import_rows(&pool, &client, rows).await.expect("import");
        assert_eq!(report.robots, 1);
        assert_eq!(report.parts, 1);

        let (selected, dispatch, delivery): (bool, Option<NaiveDate>, Option<NaiveDate>) =
            sqlx::query_as(
                "SELECT selected, dispatch_date, delivery_date FROM part_issues
                 WHERE client = $1 AND site = 'Tembhe' AND rbt_id = 'RBT7' AND part = 'BATTERY'",
            )
            .bind(&client)
            .fetch_one(&pool)
            .await
            .expect("fetch part");
        assert!(selected);
        assert_eq!(dispatch, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(delivery, None);

        cleanup_client(&pool, &client).await;
    }

    #[tokio::test]
    async fn deleting_a_robot_orphans_its_logs() {
        let Some(pool) = test_pool().await else { return };
        let client = format!("it-orphan-{}", Uuid::new_v4());
        seed_robot(&pool, &client, "Parola", "RBT5").await;

        let state = AppState { pool: pool.clone() };
        let request = StatusChangeRequest {
            rbt: RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT5".to_string(),
            },
            field: "running_status".to_string(),
            value: "Not Running".to_string(),
            target_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        };
        update_status(State(state.clone()), Extension(claims("admin")), Json(request))
            .await
            .expect("status change");
        let logs_before = log_count(&pool, &client).await;
        assert!(logs_before > 0);

        delete_robot(
            State(state),
            Extension(claims("super_admin")),
            Json(RobotRef {
                client: client.clone(),
                site: "Parola".to_string(),
                rbt_id: "RBT5".to_string(),
            }),
        )
        .await
        .expect("delete robot");

        // The robot and its parts are gone; logs and history stay behind.
        let (robots,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM robots WHERE client = $1")
            .bind(&client)
            .fetch_one(&pool)
            .await
            .expect("count robots");
        assert_eq!(robots, 0);
        assert_eq!(log_count(&pool, &client).await, logs_before);

        cleanup_client(&pool, &client).await;
    }
}
