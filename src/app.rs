use std::sync::Arc;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::db::{PgBriefingRepository, PgForecastRepository, PgWeatherRepository};
use crate::forecast_fetcher::AvalancheOrgFetcher;
use crate::gemini::GeminiClient;
use crate::scheduler;
use crate::services::{BriefingDeps, BriefingPolicy, BriefingService};
use crate::weather_fetcher::OpenMeteoFetcher;

/// Application with its background scheduler and HTTP server.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
    pub forecast_scheduler_handle: JoinHandle<()>,
}

impl Application {
    /// Wire repositories, fetchers, and the briefing service, then spawn
    /// the forecast-refresh scheduler and the HTTP server.
    pub async fn build(config: Config, pool: PgPool) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let briefing_repo = PgBriefingRepository::new(pool.clone());
        let forecast_repo = PgForecastRepository::new(pool.clone());
        let weather_repo = PgWeatherRepository::new(pool.clone());

        let forecast_fetcher = AvalancheOrgFetcher::with_base_url(config.forecast_api_url.clone());
        let weather_fetcher = OpenMeteoFetcher::with_base_url(config.weather_api_url.clone());
        let gemini = GeminiClient::with_base_url(
            config.gemini_api_url.clone(),
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
        );

        let clock = Arc::new(SystemClock);
        let forecast_store = Arc::new(forecast_repo);

        let briefing_service = BriefingService::new(
            BriefingDeps {
                briefing_store: Arc::new(briefing_repo),
                forecast_store: forecast_store.clone(),
                forecast_source: Arc::new(forecast_fetcher.clone()),
                weather_store: Arc::new(weather_repo),
                weather_source: Arc::new(weather_fetcher),
                oracle: Arc::new(gemini),
                clock: clock.clone(),
            },
            BriefingPolicy {
                contract: config.briefing_contract,
                staleness_threshold_hours: config.staleness_threshold_hours,
                weather_cache_hours: config.weather_cache_hours,
            },
        );

        info!("Spawning forecast refresh scheduler");
        let forecast_scheduler_handle = {
            let interval = config.forecast_refresh_interval_minutes;
            let store = forecast_store.clone();
            let clock = clock.clone();
            tokio::spawn(async move {
                scheduler::start_forecast_scheduler(forecast_fetcher, store, clock, interval).await;
            })
        };

        let app_state = AppState { briefing_service };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await
        });

        info!("Application initialized successfully");

        Ok(Self {
            server_handle,
            forecast_scheduler_handle,
        })
    }

    /// Run until the server stops; the scheduler runs indefinitely in the
    /// background.
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
