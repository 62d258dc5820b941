use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::briefing_payload::BriefingProblem;

/// A synthesized briefing as persisted. Exactly one row may exist per
/// (center, zone, forecast_date); the table's unique key enforces it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Briefing {
    pub id: i64,
    pub center: String,
    pub zone: String,
    pub forecast_date: NaiveDate,
    pub danger_level: i32,
    pub briefing_text: String,
    #[schema(value_type = Vec<BriefingProblem>)]
    pub problems: Json<Vec<BriefingProblem>>,
    pub source_url: Option<String>,
    pub source_center: Option<String>,
    pub disclaimer: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub field_observation_prompts: Option<Json<Vec<String>>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a briefing; the store assigns id and created_at.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBriefing {
    pub center: String,
    pub zone: String,
    pub forecast_date: NaiveDate,
    pub danger_level: i32,
    pub briefing_text: String,
    pub problems: Vec<BriefingProblem>,
    pub source_url: Option<String>,
    pub source_center: Option<String>,
    pub disclaimer: Option<String>,
    pub field_observation_prompts: Option<Vec<String>>,
}
