use serde::{Deserialize, Serialize};

use crate::prompt_composer::PromptContract;

/// One avalanche problem as narrated in a briefing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct BriefingProblem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub likelihood: String,
    #[serde(default)]
    pub size: String,
    /// Set when the problem restates an official forecast problem rather
    /// than one inferred from conditions.
    #[serde(rename = "officialSource", skip_serializing_if = "Option::is_none")]
    pub official_source: Option<bool>,
}

/// Validated fields extracted from the oracle's JSON response.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefingPayload {
    pub briefing: String,
    pub problems: Vec<BriefingProblem>,
    pub source_url: Option<String>,
    pub source_center: Option<String>,
    pub disclaimer: Option<String>,
    pub field_observation_prompts: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("response is not valid JSON: {0}")]
    Malformed(String),
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Remove an optional markdown code fence around the oracle's response.
///
/// Accepts a leading ```` ```json ```` (any case) or bare ```` ``` ```` and
/// a trailing ```` ``` ````. Already-clean text passes through unchanged.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    let lowered = text.to_ascii_lowercase();
    if lowered.starts_with("```json") {
        text = text["```json".len()..].trim_start();
    } else if text.starts_with("```") {
        text = text["```".len()..].trim_start();
    }

    if let Some(stripped) = text.strip_suffix("```") {
        text = stripped.trim_end();
    }

    text
}

/// Parse the oracle's raw text into a typed payload.
///
/// The oracle is only instructed, never forced, to emit the contract JSON,
/// so every field is checked explicitly. The Mentor contract additionally
/// requires the liability fields (disclaimer, sourceUrl) to be present.
pub fn parse_briefing_payload(
    raw: &str,
    contract: PromptContract,
) -> Result<BriefingPayload, PayloadError> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| PayloadError::Malformed(e.to_string()))?;

    let briefing = value
        .get("briefing")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(PayloadError::MissingField("briefing"))?
        .to_string();

    let problems = match value.get("problems") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value::<Vec<BriefingProblem>>(v.clone())
            .map_err(|e| PayloadError::Malformed(format!("problems: {e}")))?,
    };

    let source_url = non_empty_string(&value, "sourceUrl");
    let source_center = non_empty_string(&value, "sourceCenter");
    let disclaimer = non_empty_string(&value, "disclaimer");

    let field_observation_prompts = match value.get("fieldObservationPrompts") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<Vec<String>>(v.clone())
                .map_err(|e| PayloadError::Malformed(format!("fieldObservationPrompts: {e}")))?,
        ),
    };

    if contract == PromptContract::Mentor {
        if disclaimer.is_none() {
            return Err(PayloadError::MissingField("disclaimer"));
        }
        if source_url.is_none() {
            return Err(PayloadError::MissingField("sourceUrl"));
        }
    }

    Ok(BriefingPayload {
        briefing,
        problems,
        source_url,
        source_center,
        disclaimer,
        field_observation_prompts,
    })
}

fn non_empty_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
