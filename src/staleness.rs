use chrono::{DateTime, Utc};

/// Default freshness threshold for both forecast publish times and cached
/// briefings. The two call sites must share this logic so the API never
/// reports a briefing as fresh while flagging its forecast stale (or the
/// reverse) from divergent arithmetic.
pub const DEFAULT_STALENESS_THRESHOLD_HOURS: i64 = 24;

/// Age of a record relative to "now".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessAssessment {
    /// Elapsed time in milliseconds (the unit the API reports as `dataAge`).
    pub age_ms: i64,
    /// Elapsed time in fractional hours.
    pub elapsed_hours: f64,
    /// True when the age strictly exceeds the threshold.
    pub is_stale: bool,
}

/// Evaluate how old `reference` is at `now` against a threshold in hours.
///
/// Exactly at the threshold counts as fresh; one second past it is stale.
pub fn assess(
    reference: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_hours: i64,
) -> StalenessAssessment {
    let age_ms = (now - reference).num_milliseconds();
    StalenessAssessment {
        age_ms,
        elapsed_hours: age_ms as f64 / 3_600_000.0,
        is_stale: age_ms > threshold_hours * 3_600_000,
    }
}

/// Human-readable warning for stale data, or None when fresh.
pub fn staleness_warning(assessment: &StalenessAssessment) -> Option<String> {
    if !assessment.is_stale {
        return None;
    }
    Some(format!(
        "This forecast data is {} hours old and may no longer reflect current conditions. \
         Check the avalanche center for updates before heading out.",
        assessment.elapsed_hours.round() as i64
    ))
}
