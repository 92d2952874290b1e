use std::env;

use fleetboard::commands::maintenance;
use fleetboard::db;

/// Move the legacy flat site layout under a real client:
/// `migrate-sites <client>`. Safe to re-run; a second pass moves nothing.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let Some(client) = env::args().nth(1) else {
        eprintln!("Usage: migrate-sites <client>");
        std::process::exit(2);
    };

    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::error!("DATABASE_URL must be set");
            std::process::exit(1);
        }
    };

    let result = async {
        let pool = db::init_pool(&database_url).await?;
        db::init_database(&pool).await?;
        maintenance::migrate_sites(&pool, client.trim()).await
    }
    .await;

    match result {
        Ok(report) => {
            tracing::info!(
                "Migration complete: {} sites, {} robots, {} part rows, {} history rows, {} log rows",
                report.sites,
                report.robots,
                report.parts,
                report.history,
                report.logs
            );
        }
        Err(e) => {
            tracing::error!("Migration failed: {}", e);
            std::process::exit(1);
        }
    }
}
