use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use utoipa::OpenApi;

use crate::db::Briefing;
use crate::services::{BriefingError, BriefingService};

#[derive(Clone)]
pub struct AppState {
    pub briefing_service: BriefingService,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct BriefingQuery {
    pub center: Option<String>,
    pub zone: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct BriefingKeyRequest {
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

/// Response envelope shared by the lookup and generate endpoints.
/// `dataAge` is milliseconds since the underlying data was produced.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BriefingEnvelope {
    pub success: bool,
    pub briefing: Option<Briefing>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/briefings", get(get_briefing))
        .route("/briefings/generate", post(generate_briefing))
        .route("/briefings/regenerate", post(regenerate_briefing))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}

fn error_response(e: &BriefingError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        BriefingError::InvalidRequest => StatusCode::BAD_REQUEST,
        BriefingError::ForecastUnavailable { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: e.to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/briefings",
    params(BriefingQuery),
    responses(
        (status = 200, description = "Today's briefing for the zone, if one exists", body = BriefingEnvelope),
        (status = 400, description = "Missing center or zone", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
async fn get_briefing(
    State(state): State<AppState>,
    Query(params): Query<BriefingQuery>,
) -> Result<Json<BriefingEnvelope>, (StatusCode, Json<ErrorResponse>)> {
    let center = params.center.unwrap_or_default();
    let zone = params.zone.unwrap_or_default();
    debug!("Fetching briefing for {zone} ({center})");

    let lookup = state
        .briefing_service
        .get_briefing(&center, &zone)
        .await
        .map_err(|e| {
            error!("Failed to fetch briefing for {zone} ({center}): {e}");
            error_response(&e)
        })?;

    let message = lookup
        .briefing
        .is_none()
        .then(|| "No briefing found for this location and date".to_string());

    if lookup.briefing.is_some() {
        info!("Returned stored briefing for {zone}");
    } else {
        warn!("No briefing stored for {zone} ({center}) today");
    }

    Ok(Json(BriefingEnvelope {
        success: true,
        briefing: lookup.briefing,
        cached: lookup.cached,
        stale_data: lookup.stale_data,
        data_age: lookup.data_age_ms,
        staleness_warning: lookup.staleness_warning,
        message,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/briefings/generate",
    request_body = BriefingKeyRequest,
    responses(
        (status = 200, description = "Briefing generated or served from cache", body = BriefingEnvelope),
        (status = 400, description = "Missing center or zone", body = ErrorResponse),
        (status = 404, description = "No forecast available for the zone", body = ErrorResponse),
        (status = 500, description = "Generation or persistence failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
async fn generate_briefing(
    State(state): State<AppState>,
    Json(request): Json<BriefingKeyRequest>,
) -> Result<Json<BriefingEnvelope>, (StatusCode, Json<ErrorResponse>)> {
    let center = request.center.unwrap_or_default();
    let zone = request.zone.unwrap_or_default();
    debug!("Generating briefing for {zone} ({center})");

    let outcome = state
        .briefing_service
        .generate_briefing(&center, &zone)
        .await
        .map_err(|e| {
            error!("Failed to generate briefing for {zone} ({center}): {e}");
            error_response(&e)
        })?;

    info!(
        "Briefing for {zone} ready (cached: {}, danger level {})",
        outcome.cached, outcome.briefing.danger_level
    );

    Ok(Json(BriefingEnvelope {
        success: true,
        briefing: Some(outcome.briefing),
        cached: outcome.cached,
        stale_data: outcome.stale_data,
        data_age: outcome.data_age_ms,
        staleness_warning: outcome.staleness_warning,
        message: None,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/briefings/regenerate",
    request_body = BriefingKeyRequest,
    responses(
        (status = 200, description = "Cached briefing cleared", body = MessageResponse),
        (status = 400, description = "Missing center or zone", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
async fn regenerate_briefing(
    State(state): State<AppState>,
    Json(request): Json<BriefingKeyRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let center = request.center.unwrap_or_default();
    let zone = request.zone.unwrap_or_default();
    debug!("Regenerating briefing for {zone} ({center})");

    state
        .briefing_service
        .regenerate_briefing(&center, &zone)
        .await
        .map_err(|e| {
            error!("Failed to clear briefing for {zone} ({center}): {e}");
            error_response(&e)
        })?;

    info!("Cleared cached briefing for {zone}");

    Ok(Json(MessageResponse {
        success: true,
        message: "Old briefing deleted. Generate again for a fresh one.".to_string(),
    }))
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_briefing, generate_briefing, regenerate_briefing),
    components(schemas(
        HealthResponse,
        BriefingEnvelope,
        BriefingKeyRequest,
        MessageResponse,
        ErrorResponse,
        Briefing,
        crate::briefing_payload::BriefingProblem
    ))
)]
struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
