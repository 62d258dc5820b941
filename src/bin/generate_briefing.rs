use std::sync::Arc;

use clap::Parser;

use avalanche_briefing_service::clock::SystemClock;
use avalanche_briefing_service::config::Config;
use avalanche_briefing_service::db::pool::create_pool;
use avalanche_briefing_service::db::{
    PgBriefingRepository, PgForecastRepository, PgWeatherRepository,
};
use avalanche_briefing_service::forecast_fetcher::AvalancheOrgFetcher;
use avalanche_briefing_service::gemini::GeminiClient;
use avalanche_briefing_service::services::{BriefingDeps, BriefingPolicy, BriefingService};
use avalanche_briefing_service::weather_fetcher::OpenMeteoFetcher;

#[derive(Parser)]
#[command(name = "generate-briefing")]
#[command(about = "Run the briefing pipeline once for a zone", long_about = None)]
struct Cli {
    /// Forecast center name, e.g. "Sierra Avalanche Center"
    center: String,

    /// Zone name, e.g. "Central Sierra"
    zone: String,

    /// Delete today's cached briefing first, forcing a fresh generation
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let service = BriefingService::new(
        BriefingDeps {
            briefing_store: Arc::new(PgBriefingRepository::new(pool.clone())),
            forecast_store: Arc::new(PgForecastRepository::new(pool.clone())),
            forecast_source: Arc::new(AvalancheOrgFetcher::with_base_url(
                config.forecast_api_url.clone(),
            )),
            weather_store: Arc::new(PgWeatherRepository::new(pool.clone())),
            weather_source: Arc::new(OpenMeteoFetcher::with_base_url(
                config.weather_api_url.clone(),
            )),
            oracle: Arc::new(GeminiClient::with_base_url(
                config.gemini_api_url.clone(),
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            )),
            clock: Arc::new(SystemClock),
        },
        BriefingPolicy {
            contract: config.briefing_contract,
            staleness_threshold_hours: config.staleness_threshold_hours,
            weather_cache_hours: config.weather_cache_hours,
        },
    );

    if cli.force {
        println!("Clearing today's briefing for {} / {}...", cli.center, cli.zone);
        service.regenerate_briefing(&cli.center, &cli.zone).await?;
    }

    println!("Generating briefing for {} / {}...\n", cli.center, cli.zone);
    let outcome = service.generate_briefing(&cli.center, &cli.zone).await?;

    let briefing = &outcome.briefing;
    println!(
        "Danger level {} | cached: {} | {}",
        briefing.danger_level,
        outcome.cached,
        briefing.forecast_date
    );
    if let Some(warning) = &outcome.staleness_warning {
        println!("\n⚠ {warning}");
    }

    println!("\n{}\n", briefing.briefing_text);

    for (i, problem) in briefing.problems.0.iter().enumerate() {
        println!(
            "{}. {} — {} / {}",
            i + 1,
            problem.name,
            problem.likelihood,
            problem.size
        );
        println!("   {}\n", problem.description);
    }

    if let Some(prompts) = &briefing.field_observation_prompts {
        println!("Field observations to make:");
        for prompt in prompts.0.iter() {
            println!("  - {prompt}");
        }
    }

    if let Some(url) = &briefing.source_url {
        println!("\nSource: {url}");
    }
    if let Some(disclaimer) = &briefing.disclaimer {
        println!("{disclaimer}");
    }

    Ok(())
}
