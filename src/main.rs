use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::Path;

// Use library instead of local modules
use portfolio_sync::{
    setup_database, verify_count, CategorySet, HttpGateway, SyncService, Validator,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_sync=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("sync") => run_sync(),
        Some("list") => run_list(),
        _ => {
            eprintln!("Usage: portfolio-sync <sync|list>");
            eprintln!("  sync   Fetch, reconcile, and persist the current source snapshot");
            eprintln!("  list   Print the persisted entities with their allocation rows");
            eprintln!();
            eprintln!("Environment: SOURCE_API_URL, DB_PATH, SYNC_CATEGORIES");
            std::process::exit(2);
        }
    }
}

fn open_db() -> Result<Connection> {
    let db_path = env::var("DB_PATH").unwrap_or_else(|_| "portfolio.db".to_string());
    let conn = Connection::open(Path::new(&db_path))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn build_validator() -> Validator {
    match env::var("SYNC_CATEGORIES") {
        Ok(csv) => Validator::with_categories(CategorySet::from_csv(&csv)),
        Err(_) => Validator::new(),
    }
}

fn run_sync() -> Result<()> {
    println!("🔄 Portfolio Sync - reconcile and persist");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let source_url =
        env::var("SOURCE_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    // 1. Setup database
    println!("\n🔧 Setting up database...");
    let mut conn = open_db()?;
    println!("✓ Database initialized with WAL mode");

    // 2. Run the sync cycle
    println!("\n📡 Fetching from {} and reconciling...", source_url);
    let gateway = HttpGateway::new(&source_url)?;
    let service = SyncService::with_validator(gateway, build_validator());
    let outcome = service.run_sync(&mut conn)?;

    // 3. Verify persisted count
    println!("\n🔍 Verifying database...");
    let count = verify_count(&conn)?;
    println!("✓ Database contains {} entities", count);

    // 4. Report
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if outcome.is_empty_run() {
        println!("⚠️  {}", outcome.message);
    } else {
        println!("🎉 {}", outcome.message);
        println!("✓ Run id: {}", outcome.run_id);
    }

    Ok(())
}

fn run_list() -> Result<()> {
    let conn = open_db()?;
    let entities = portfolio_sync::fetch_all(&conn)?;

    if entities.is_empty() {
        println!("No entities persisted. Run: portfolio-sync sync");
        return Ok(());
    }

    println!("📊 {} persisted entities\n", entities.len());
    for entity in &entities {
        println!(
            "{} [{}] profit {:.2}, current {:.2}, invested {:.2}",
            entity.id, entity.category, entity.profit, entity.current_amount, entity.invested_amount
        );
        for row in &entity.allocations {
            println!(
                "   {} / {} - {} x{}",
                row.asset_class, row.region, row.isin, row.count
            );
        }
    }

    Ok(())
}
