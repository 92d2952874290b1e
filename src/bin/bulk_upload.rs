use std::env;
use std::fs::File;

use fleetboard::commands::maintenance;
use fleetboard::{db, importer};

/// Bulk robot upload: `bulk-upload <csv-path> [client]`. Without a client
/// the rows land in the legacy flat layout and can be moved later with
/// `migrate-sites`.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: bulk-upload <csv-path> [client]");
        std::process::exit(2);
    };
    let client = args.next().unwrap_or_default();

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

        let file = File::open(&path)?;
        let rows = importer::parse_csv(file)?;
        tracing::info!("Parsed {} rows from {}", rows.len(), path);

        maintenance::import_rows(&pool, client.trim(), rows).await
    }
    .await;

    match result {
        Ok(report) => {
            tracing::info!(
                "Bulk upload complete: {} robots, {} part rows",
                report.robots,
                report.parts
            );
        }
        Err(e) => {
            tracing::error!("Bulk upload failed: {}", e);
            std::process::exit(1);
        }
    }
}
