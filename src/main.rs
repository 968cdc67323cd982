use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lead_intake::config::Config;
use lead_intake::store::Store;
use lead_intake::{notifier, server, store};

#[rocket::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lead_intake=info,rocket=warn")),
        )
        .init();

    // Missing DB_URL/DB_NAME is fatal; exit non-zero before binding.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Initializing document store...");
    let pool = match store::create_db_pool(&config.database_path()).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("failed to create store pool: {}", e);
            std::process::exit(1);
        }
    };

    let store = Store::new(pool);
    if let Err(e) = store.ping().await {
        error!("store unreachable at startup: {}", e);
        std::process::exit(1);
    }

    let notifier = notifier::from_config(&config);

    info!("✓ lead-intake listening on port {}", config.port);
    if let Err(e) = server::build_rocket(config, store, notifier).launch().await {
        error!("server failed: {}", e);
        std::process::exit(1);
    }
}
