use std::env;

use crate::prompt_composer::PromptContract;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub forecast_api_url: String,
    pub weather_api_url: String,
    pub gemini_api_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub briefing_contract: PromptContract,
    pub staleness_threshold_hours: i64,
    pub weather_cache_hours: i64,
    pub forecast_refresh_interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            forecast_api_url: env::var("FORECAST_API_URL")
                .unwrap_or_else(|_| "https://api.avalanche.org/v2/public".to_string()),
            weather_api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1".to_string()),
            gemini_api_url: env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            briefing_contract: PromptContract::from_config(
                &env::var("BRIEFING_CONTRACT").unwrap_or_else(|_| "mentor".to_string()),
            ),
            staleness_threshold_hours: env::var("STALENESS_THRESHOLD_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            weather_cache_hours: env::var("WEATHER_CACHE_HOURS")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .unwrap_or(6),
            forecast_refresh_interval_minutes: env::var("FORECAST_REFRESH_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
