use std::env;
use std::io::{self, BufRead, Write};

use fleetboard::commands::maintenance;
use fleetboard::db;

/// Interactive part-catalog backfill: prompts for a client name, then brings
/// every robot of that client up to the canonical catalog.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    print!("Enter the client name: ");
    io::stdout().flush().expect("stdout flush failed");
    let mut client = String::new();
    io::stdin()
        .lock()
        .read_line(&mut client)
        .expect("stdin read failed");
    let client = client.trim();
    if client.is_empty() {
        eprintln!("No client name given");
        std::process::exit(2);
    }

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
        maintenance::backfill_part_issues(&pool, client).await
    }
    .await;

    match result {
        Ok(report) => {
            tracing::info!(
                "Completed: {} sites, {} RBTs updated for client \"{}\"",
                report.sites,
                report.robots,
                client
            );
        }
        Err(e) => {
            tracing::error!("Backfill failed: {}", e);
            std::process::exit(1);
        }
    }
}
