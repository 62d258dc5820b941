use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use avalanche_briefing_service::app::Application;
use avalanche_briefing_service::config::Config;
use avalanche_briefing_service::db::pool::create_pool;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,avalanche_briefing_service=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting avalanche briefing service on {}", config.server_addr());

    info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    info!("Database connection established");

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations completed");

    let application = Application::build(config, pool).await?;
    application.run_until_stopped().await
}
