use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info, instrument};

use crate::clock::Clock;
use crate::db::ForecastStore;
use crate::forecast_fetcher::AvalancheOrgFetcher;

/// Periodically pull the national map layer and warm the forecast cache so
/// briefing requests rarely hit the live API.
#[instrument(skip(fetcher, forecast_store, clock), fields(interval_minutes = %interval_minutes))]
pub async fn start_forecast_scheduler(
    fetcher: AvalancheOrgFetcher,
    forecast_store: Arc<dyn ForecastStore>,
    clock: Arc<dyn Clock>,
    interval_minutes: u64,
) {
    let mut interval = time::interval(Duration::from_secs(interval_minutes * 60));

    info!(
        "Forecast refresh scheduler started with {} minute interval",
        interval_minutes
    );

    loop {
        interval.tick().await;
        debug!("Scheduler tick - refreshing forecasts");

        match refresh_forecasts(&fetcher, forecast_store.as_ref(), clock.as_ref()).await {
            Ok(count) => info!("Refreshed {} zone forecasts", count),
            Err(e) => error!("Forecast refresh failed: {e}"),
        }
    }
}

#[instrument(skip(fetcher, forecast_store, clock))]
async fn refresh_forecasts(
    fetcher: &AvalancheOrgFetcher,
    forecast_store: &dyn ForecastStore,
    clock: &dyn Clock,
) -> Result<usize, Box<dyn std::error::Error>> {
    let today = clock.now().date_naive();
    let records = fetcher.fetch_all_forecasts(today).await?;

    let mut stored = 0;
    for record in &records {
        match forecast_store.upsert(record).await {
            Ok(()) => stored += 1,
            Err(e) => error!("Failed to store forecast for {}: {e}", record.zone),
        }
    }

    debug!("Stored {stored} of {} fetched forecasts", records.len());
    Ok(stored)
}
