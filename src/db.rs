pub mod briefing_repository;
pub mod error;
pub mod forecast_repository;
pub mod models;
pub mod pool;
pub mod weather_repository;

pub use briefing_repository::{BriefingStore, PgBriefingRepository};
pub use error::DbError;
pub use forecast_repository::{ForecastStore, PgForecastRepository};
pub use models::*;
pub use pool::DbPool;
pub use weather_repository::{PgWeatherRepository, WeatherStore};
