use dotenvy::dotenv;
use flock_ledger::{Result, config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = config::database::create_connection(&app_config.database)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    for plan in &app_config.plans {
        match plan.max_farmers {
            Some(max) => info!(plan = %plan.name, max_farmers = max, "Dealer plan"),
            None => info!(plan = %plan.name, "Dealer plan (unlimited farmers)"),
        }
    }

    // 5. Release the pool
    db.close().await?;
    info!("Bootstrap complete.");
    Ok(())
}
