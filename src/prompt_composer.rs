use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::forecast_fetcher::ForecastRecord;
use crate::staleness::StalenessAssessment;
use crate::utils::strip_markup;
use crate::weather_fetcher::{DailySeries, HourlySeries, WeatherSnapshot};

/// Which behavioral contract the oracle is held to.
///
/// `Friendly` is the earlier conversational briefing prompt. `Mentor` is
/// the stricter successor: every factual claim is cited to its source
/// category, the response must carry a disclaimer and the official source
/// URL, and go/no-go language is forbidden. Mentor is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptContract {
    Friendly,
    Mentor,
}

impl PromptContract {
    pub fn from_config(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "friendly" => PromptContract::Friendly,
            _ => PromptContract::Mentor,
        }
    }
}

/// Everything the composer needs to render one prompt.
pub struct PromptInputs<'a> {
    pub center: &'a str,
    pub zone: &'a str,
    pub forecast: &'a ForecastRecord,
    pub weather: Option<&'a WeatherSnapshot>,
    pub staleness: Option<&'a StalenessAssessment>,
    pub now: DateTime<Utc>,
}

pub fn danger_level_name(level: i32) -> &'static str {
    match level {
        -1 => "No Rating",
        1 => "Low",
        2 => "Moderate",
        3 => "Considerable",
        4 => "High",
        5 => "Extreme",
        _ => "Unknown",
    }
}

/// Render a danger rating for the prompt. A missing rating is "No Data",
/// which is not the same thing as the center assessing "No Rating" (-1).
pub fn danger_text(level: Option<i32>) -> String {
    match level {
        None => "No Data".to_string(),
        Some(l) => format!("{} ({}/5)", danger_level_name(l), l),
    }
}

/// Render the full prompt, deterministically, from typed inputs.
pub fn compose_prompt(contract: PromptContract, inputs: &PromptInputs) -> String {
    let mut context = facts_block(inputs);

    if let Some(staleness) = inputs.staleness {
        if staleness.is_stale {
            context.push_str(&staleness_block(staleness, inputs.forecast));
        }
    }

    if let Some(weather) = inputs.weather {
        context.push_str(&weather_block(weather, inputs.now));
    }

    if inputs.forecast.has_product_data {
        context.push_str(&official_block(inputs.forecast));
    }

    match contract {
        PromptContract::Friendly => friendly_prompt(&context),
        PromptContract::Mentor => mentor_prompt(&context, inputs),
    }
}

fn facts_block(inputs: &PromptInputs) -> String {
    let forecast = inputs.forecast;
    format!(
        "**Location:** {zone}, {center}\n\
         **Overall Danger Level:** {overall}\n\
         **Danger by Elevation:**\n\
         - Above Treeline: {high}\n\
         - Near Treeline: {middle}\n\
         - Below Treeline: {low}\n\
         **Official Travel Advice:** {advice}",
        zone = inputs.zone,
        center = inputs.center,
        overall = danger_text(Some(forecast.danger_overall)),
        high = danger_text(forecast.danger_high),
        middle = danger_text(forecast.danger_middle),
        low = danger_text(forecast.danger_low),
        advice = forecast
            .travel_advice
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("No specific advice provided"),
    )
}

fn staleness_block(staleness: &StalenessAssessment, forecast: &ForecastRecord) -> String {
    let hours = staleness.elapsed_hours.round() as i64;
    let published = forecast
        .published_time
        .map(|t| format!(" (published {})", t.format("%Y-%m-%d %H:%M UTC")))
        .unwrap_or_default();
    format!(
        "\n\n--- DATA FRESHNESS WARNING ---\n\
         This forecast is {hours} hours old{published} and has not been refreshed since.\n\
         State clearly in the briefing that the forecast is more than 24 hours old and that \
         conditions may have changed."
    )
}

fn weather_block(weather: &WeatherSnapshot, now: DateTime<Utc>) -> String {
    let mut block = String::from("\n\n--- WEATHER DATA ---\n");
    let today = now.format("%Y-%m-%d").to_string();

    let today_index = if daily_is_aligned(&weather.daily) {
        find_today_index(&weather.daily, &today)
    } else {
        None
    };

    if let Some(history) = today_index.and_then(|i| history_block(&weather.daily, i)) {
        block.push_str(&history);
    }

    block.push_str(&current_block(weather));

    if let Some(idx) = today_index {
        block.push_str(&today_forecast_block(&weather.daily, idx));
    }

    if hourly_is_aligned(&weather.hourly) {
        if let Some(trends) = next_24h_block(&weather.hourly, now) {
            block.push_str(&trends);
        }
    }

    block
}

/// The 14 days leading up to today. Omitted entirely when today sits at the
/// front of the series (no history was returned).
fn history_block(daily: &DailySeries, today_index: usize) -> Option<String> {
    if today_index == 0 {
        return None;
    }

    let start = today_index.saturating_sub(14);
    let days = &daily.time[start..today_index];
    let snow = &daily.snowfall_sum[start..today_index];
    let temps = &daily.temperature_max[start..today_index];
    let gusts = &daily.wind_gusts_max[start..today_index];

    let total_snow: f64 = snow.iter().sum();
    let avg_high: f64 = temps.iter().sum::<f64>() / temps.len() as f64;
    let max_gust: f64 = gusts.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let snow_days = snow.iter().filter(|&&s| s > 0.5).count();

    let mut block = format!(
        "**Past 14 Days (Recent Weather History):**\n\
         - Total snowfall: {total_snow:.1}\"\n\
         - Average high temperature: {avg_high:.0}\u{b0}F\n\
         - Max wind gusts: {max_gust:.0} mph\n\
         - Snow days: {snow_days} days with >0.5\" snow\n\n\
         **Day-by-day recent history:**"
    );

    let detail = days.len().min(7);
    for i in (days.len() - detail)..days.len() {
        let days_ago = days.len() - i;
        let day_name = format_day(&days[i]);
        block.push_str(&format!(
            "\n- {day_name} ({days_ago}d ago): {snowfall:.1}\" snow, High {high:.0}\u{b0}F, Wind gusts {gust:.0} mph",
            snowfall = snow[i],
            high = temps[i],
            gust = gusts[i],
        ));
    }

    block.push_str("\n\n");
    Some(block)
}

fn current_block(weather: &WeatherSnapshot) -> String {
    let c = &weather.current;
    let precipitation = if c.precipitation > 0.0 {
        format!("{:.2}\"", c.precipitation)
    } else {
        "None".to_string()
    };
    format!(
        "**Current Conditions:**\n\
         - Temperature: {temp:.0}\u{b0}F (Feels like {feels:.0}\u{b0}F)\n\
         - Weather: {description}\n\
         - Wind: {speed:.0} mph {cardinal} (gusts {gusts:.0} mph)\n\
         - Humidity: {humidity:.0}%\n\
         - Cloud Cover: {clouds:.0}%\n\
         - Current Precipitation: {precipitation}\n\
         - Barometric Pressure: {pressure:.0} mb\n",
        temp = c.temperature,
        feels = c.feels_like,
        description = c.weather_description,
        speed = c.wind_speed,
        cardinal = c.wind_direction_cardinal,
        gusts = c.wind_gusts,
        humidity = c.humidity,
        clouds = c.cloud_cover,
        pressure = c.pressure,
    )
}

fn today_forecast_block(daily: &DailySeries, idx: usize) -> String {
    format!(
        "\n**Today's Forecast:**\n\
         - High/Low: {high:.0}\u{b0}F / {low:.0}\u{b0}F\n\
         - Precipitation: {precip:.2}\" ({prob:.0}% chance)\n\
         - Snowfall: {snow:.1}\"\n\
         - Max Wind: {wind:.0} mph (gusts {gusts:.0} mph)\n\
         - UV Index: {uv:.1}\n",
        high = daily.temperature_max[idx],
        low = daily.temperature_min[idx],
        precip = daily.precipitation_sum[idx],
        prob = daily.precipitation_probability_max[idx],
        snow = daily.snowfall_sum[idx],
        wind = daily.wind_speed_max[idx],
        gusts = daily.wind_gusts_max[idx],
        uv = daily.uv_index_max[idx],
    )
}

/// Aggregate the 24 hourly entries starting at the first timestamp at or
/// after now. Omitted when the series holds no future hours.
fn next_24h_block(hourly: &HourlySeries, now: DateTime<Utc>) -> Option<String> {
    let now_naive = now.naive_utc();
    let start = hourly
        .time
        .iter()
        .position(|t| parse_hour(t).map(|h| h >= now_naive).unwrap_or(false))?;

    let end = (start + 24).min(hourly.time.len());
    let temps = &hourly.temperature[start..end];
    let snow = &hourly.snowfall[start..end];
    let wind = &hourly.wind_speed[start..end];
    let precip_prob = &hourly.precipitation_probability[start..end];

    let total_snow: f64 = snow.iter().sum();
    let max_wind = wind.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let min_temp = temps.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_temp = temps.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let max_prob = precip_prob.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    Some(format!(
        "\n**Next 24 Hours Trends:**\n\
         - Temperature range: {min_temp:.0}\u{b0}F - {max_temp:.0}\u{b0}F\n\
         - Expected snow: {total_snow:.1}\"\n\
         - Max wind speed: {max_wind:.0} mph\n\
         - Precipitation probability: {max_prob:.0}%",
    ))
}

fn official_block(forecast: &ForecastRecord) -> String {
    let mut block = String::from("\n\n--- OFFICIAL FORECAST DATA ---\n");

    if let Some(bottom_line) = forecast.bottom_line.as_deref().filter(|s| !s.is_empty()) {
        block.push_str(&format!(
            "\n**Bottom Line (from forecasters):**\n{}\n",
            strip_markup(bottom_line)
        ));
    }

    if let Some(hazard) = forecast
        .hazard_discussion
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        block.push_str(&format!(
            "\n**Hazard Discussion:**\n{}\n",
            strip_markup(hazard)
        ));
    }

    if let Some(weather) = forecast
        .weather_discussion
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        block.push_str(&format!(
            "\n**Weather Discussion:**\n{}\n",
            strip_markup(weather)
        ));
    }

    if !forecast.problems.is_empty() {
        block.push_str("\n**Official Avalanche Problems:**\n");
        for (index, problem) in forecast.problems.iter().enumerate() {
            block.push_str(&format!(
                "\n{}. {}\n",
                index + 1,
                problem.name.as_deref().unwrap_or("Unknown Problem")
            ));
            block.push_str(&format!(
                "   Likelihood: {}\n",
                problem.likelihood.as_deref().unwrap_or("Not specified")
            ));
            block.push_str(&format!(
                "   Size: {} to {}\n",
                problem.min_size.as_deref().unwrap_or("Small"),
                problem.max_size.as_deref().unwrap_or("Large")
            ));
            if let Some(discussion) = problem.discussion.as_deref().filter(|s| !s.is_empty()) {
                block.push_str(&format!("   Discussion: {}\n", strip_markup(discussion)));
            }
            if !problem.location.is_empty() {
                block.push_str(&format!(
                    "   Affected Areas: {}\n",
                    problem.location.join(", ")
                ));
            }
        }
    }

    if !forecast.media.is_empty() {
        block.push_str(&format!(
            "\n**Field Photos Available:** {} photos with observations\n",
            forecast.media.len()
        ));
        for (index, photo) in forecast.media.iter().enumerate() {
            if let Some(caption) = photo.caption.as_deref().filter(|s| !s.is_empty()) {
                block.push_str(&format!("  Photo {}: {}\n", index + 1, strip_markup(caption)));
            }
        }
    }

    block
}

fn friendly_prompt(context: &str) -> String {
    format!(
        "You are a backcountry avalanche safety expert who teaches recreational skiers and \
         snowboarders about avalanche conditions in a clear, educational way.\n\n\
         Create a briefing for the following avalanche forecast:\n\n\
         {context}\n\n\
         Your response must be valid JSON in this exact format:\n\
         {{\n\
         \x20 \"briefing\": \"2-3 paragraph briefing text here\",\n\
         \x20 \"problems\": [\n\
         \x20   {{\n\
         \x20     \"name\": \"Problem name (e.g., Wind Slabs, Persistent Slab, Wet Snow)\",\n\
         \x20     \"description\": \"1-2 paragraph educational explanation of this problem. Explain what it is, why it's happening, what terrain to avoid, and what signs to look for.\",\n\
         \x20     \"likelihood\": \"Possible/Likely/Very Likely/Almost Certain\",\n\
         \x20     \"size\": \"Small/Medium/Large/Very Large\"\n\
         \x20   }}\n\
         \x20 ]\n\
         }}\n\n\
         For the briefing field:\n\
         1. Explain what the danger level means in practical terms (what can you do safely?)\n\
         2. Teach WHY these conditions exist (weather patterns, snowpack structure, etc.)\n\
         3. Analyze the past 14 days of weather history to understand HOW the current snowpack was built: \
         storm cycles and snow loading, wind events that loaded specific aspects, temperature swings that \
         created crusts or facets, and breaks between storms where weak layers formed.\n\
         4. Explain the relationship between PAST weather and CURRENT avalanche problems.\n\
         5. Connect current conditions and the near-term forecast to the existing snowpack structure.\n\
         6. Provide terrain selection advice based on the forecast, weather history, and current conditions.\n\
         7. Use analogies or simple explanations to help beginners understand.\n\
         8. If official forecast data is provided above, USE IT as your primary source of information and \
         translate it into accessible language.\n\n\
         For the problems array:\n\
         - If official avalanche problems are provided above, use those as your base and translate their \
         discussions into educational, beginner-friendly language.\n\
         - If no official problems are provided, identify 1-3 most likely problems for these conditions.\n\
         - Be specific about terrain features, aspects, and elevations, and describe warning signs \
         (collapsing, cracking, recent avalanches).\n\n\
         Keep it conversational, like a knowledgeable friend giving advice. Avoid jargon unless you \
         explain it.\n\n\
         IMPORTANT: When official forecast data is available, your briefing should be based on that \
         professional analysis, not speculation.\n\n\
         IMPORTANT: Return ONLY valid JSON, no additional text before or after."
    )
}

fn mentor_prompt(context: &str, inputs: &PromptInputs) -> String {
    let source_url = inputs
        .forecast
        .forecast_url
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("the official forecast page URL");
    format!(
        "You are Pocket Mentor, a calm and objective backcountry avalanche mentor. You summarize \
         and cite official avalanche forecasts and weather data for recreational skiers and \
         snowboarders. You never make a go/no-go decision for the reader; terrain choices stay \
         with them.\n\n\
         Create a briefing for the following avalanche forecast:\n\n\
         {context}\n\n\
         Your response must be valid JSON in this exact format:\n\
         {{\n\
         \x20 \"briefing\": \"2-3 paragraph briefing text here\",\n\
         \x20 \"sourceUrl\": \"{source_url}\",\n\
         \x20 \"sourceCenter\": \"{center}\",\n\
         \x20 \"disclaimer\": \"One or two sentences reminding the reader that this is an educational summary of official sources, not professional avalanche advice.\",\n\
         \x20 \"problems\": [\n\
         \x20   {{\n\
         \x20     \"name\": \"Problem name (e.g., Wind Slabs, Persistent Slab, Wet Snow)\",\n\
         \x20     \"description\": \"1-2 paragraph educational explanation of this problem with its evidence cited.\",\n\
         \x20     \"likelihood\": \"Possible/Likely/Very Likely/Almost Certain\",\n\
         \x20     \"size\": \"Small/Medium/Large/Very Large\",\n\
         \x20     \"officialSource\": true\n\
         \x20   }}\n\
         \x20 ],\n\
         \x20 \"fieldObservationPrompts\": [\n\
         \x20   \"A short question prompting the rider to check one specific sign in the field\"\n\
         \x20 ]\n\
         }}\n\n\
         Authoring rules:\n\
         1. Explain what the danger level means in practical terms without telling the reader what \
         to do; describe consequences and uncertainty, never permission.\n\
         2. Connect the past 14 days of weather history causally to today's avalanche problems: \
         which storms loaded which layers, which wind events built slabs, which temperature swings \
         created crusts or facets.\n\
         3. Cite every factual claim to its source category: append \"(official forecast)\" to \
         claims taken from the forecast center and \"(weather data)\" to claims derived from the \
         weather feed. Do not state uncited facts.\n\
         4. Never use prescriptive go/no-go language such as \"you should go\", \"it's safe to \
         ski\", or \"avoid the backcountry today\". Describe conditions; let the reader decide.\n\
         5. Translate official jargon (e.g. \"propagation\", \"wind loading\", \"persistent weak \
         layer\") into plain language the first time it appears.\n\
         6. Use \"sourceUrl\" and \"sourceCenter\" exactly as given above, and set \
         \"officialSource\": true only on problems restated from the official forecast.\n\
         7. If a DATA FRESHNESS WARNING appears above, open the briefing by stating the age of \
         the forecast.\n\
         8. fieldObservationPrompts must be 2-4 short, concrete questions tied to today's specific \
         problems.\n\n\
         IMPORTANT: Return ONLY valid JSON, no additional text before or after.",
        center = inputs.center,
    )
}

fn daily_is_aligned(daily: &DailySeries) -> bool {
    let n = daily.time.len();
    daily.temperature_max.len() == n
        && daily.temperature_min.len() == n
        && daily.precipitation_sum.len() == n
        && daily.snowfall_sum.len() == n
        && daily.precipitation_probability_max.len() == n
        && daily.wind_speed_max.len() == n
        && daily.wind_gusts_max.len() == n
        && daily.uv_index_max.len() == n
}

fn hourly_is_aligned(hourly: &HourlySeries) -> bool {
    let n = hourly.time.len();
    hourly.temperature.len() == n
        && hourly.precipitation_probability.len() == n
        && hourly.snowfall.len() == n
        && hourly.wind_speed.len() == n
}

/// Exact calendar-date string match, not a range check.
fn find_today_index(daily: &DailySeries, today: &str) -> Option<usize> {
    daily
        .time
        .iter()
        .position(|t| t.get(..10).unwrap_or(t.as_str()) == today)
}

fn parse_hour(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

fn format_day(date: &str) -> String {
    match NaiveDate::parse_from_str(date.get(..10).unwrap_or(date), "%Y-%m-%d") {
        Ok(d) => d.format("%a %b %-d").to_string(),
        Err(_) => date.to_string(),
    }
}
