//! Defensive handling of advisory responses.
//!
//! Model output is untrusted: it may be wrapped in markdown fences, may not
//! be JSON at all, or may not match the advisory schema. None of that is an
//! error for the caller; a fallback advisory is substituted instead.

use thiserror::Error;
use tracing::warn;

use crate::model::{AdvisoryQuery, HeatAdvisory, Recommendation, RiskLevel};

/// Number of recommendations every advisory carries.
pub const RECOMMENDATION_COUNT: usize = 5;

const FALLBACK_CONFIDENCE: f64 = 0.6;
const CONSERVATIVE_CONFIDENCE: f64 = 0.3;

/// Why an advisory response was rejected.
#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("advisory is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected 5 recommendations, got {0}")]
    RecommendationCount(usize),

    #[error("confidence score {0} is outside 0..=1")]
    Confidence(f64),

    #[error("advisory field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Check an advisory against the response schema.
pub fn validate(advisory: &HeatAdvisory) -> Result<(), AdvisoryError> {
    if advisory.recommendations.len() != RECOMMENDATION_COUNT {
        return Err(AdvisoryError::RecommendationCount(
            advisory.recommendations.len(),
        ));
    }
    if !(0.0..=1.0).contains(&advisory.confidence_score) {
        return Err(AdvisoryError::Confidence(advisory.confidence_score));
    }
    if advisory.predicted_heat_summary.trim().is_empty() {
        return Err(AdvisoryError::EmptyField("predictedHeatSummary"));
    }
    if advisory.rationale.trim().is_empty() {
        return Err(AdvisoryError::EmptyField("rationale"));
    }
    if advisory.recommendations.iter().any(|r| r.text.trim().is_empty()) {
        return Err(AdvisoryError::EmptyField("recommendations.text"));
    }
    Ok(())
}

/// Body of the first ```` ```json ```` block, else of the first bare fenced
/// block, else the whole text.
///
/// # Example
/// ```
/// use heatline::advisory::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
/// ```
pub fn strip_code_fence(content: &str) -> &str {
    fenced_body(content, "```json")
        .or_else(|| fenced_body(content, "```"))
        .unwrap_or(content)
        .trim()
}

fn fenced_body<'a>(content: &'a str, opening: &str) -> Option<&'a str> {
    let start = content.find(opening)? + opening.len();
    let body = &content[start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Parse and validate an advisory body.
pub fn parse_advisory(content: &str) -> Result<HeatAdvisory, AdvisoryError> {
    let advisory: HeatAdvisory = serde_json::from_str(strip_code_fence(content))?;
    validate(&advisory)?;
    Ok(advisory)
}

/// Parse an advisory, substituting [`fallback_advisory`] on any problem.
pub fn parse_or_fallback(content: &str, query: &AdvisoryQuery) -> HeatAdvisory {
    match parse_advisory(content) {
        Ok(advisory) => advisory,
        Err(e) => {
            warn!(error = %e, location = %query.location, "Malformed advisory response, using fallback");
            fallback_advisory(query)
        }
    }
}

/// Guideline-based advisory derived from the query's readings alone.
pub fn fallback_advisory(query: &AdvisoryQuery) -> HeatAdvisory {
    HeatAdvisory {
        risk_level: RiskLevel::from_heat_index(query.heat_index()),
        predicted_heat_summary: format!(
            "Heat index of {}°C expected with {}% humidity.",
            query.heat_index(),
            query.humidity()
        ),
        recommendations: vec![
            Recommendation::new(1, "Stay hydrated by drinking water every 20 minutes when outdoors.", "💧"),
            Recommendation::new(2, "Limit outdoor activities during peak heat hours (10 AM - 4 PM).", "🕐"),
            Recommendation::new(3, "Seek shade or air-conditioned spaces when possible.", "🏠"),
            Recommendation::new(4, "Wear lightweight, light-colored, loose-fitting clothing.", "👕"),
            Recommendation::new(5, "Monitor for heat illness symptoms: dizziness, nausea, rapid heartbeat.", "🚨"),
        ],
        rationale: "These recommendations follow official CDC and WHO heat safety guidelines to minimize heat-related illness risk.".to_string(),
        confidence_score: FALLBACK_CONFIDENCE,
        used_fallback: true,
        error: None,
    }
}

/// Advisory used when the upstream call failed outright.
pub fn conservative_advisory(error: impl Into<String>) -> HeatAdvisory {
    HeatAdvisory {
        risk_level: RiskLevel::Moderate,
        predicted_heat_summary:
            "Unable to generate detailed forecast. Using conservative safety recommendations."
                .to_string(),
        recommendations: vec![
            Recommendation::new(1, "Stay hydrated and drink water regularly.", "💧"),
            Recommendation::new(2, "Avoid prolonged outdoor exposure during midday.", "🕐"),
            Recommendation::new(3, "Rest in cool, shaded areas when possible.", "🏠"),
            Recommendation::new(4, "Wear appropriate protective clothing.", "👕"),
            Recommendation::new(5, "Seek medical help if you feel unwell.", "🚨"),
        ],
        rationale: "Conservative recommendations applied due to incomplete data.".to_string(),
        confidence_score: CONSERVATIVE_CONFIDENCE,
        used_fallback: true,
        error: Some(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LocationType;
    use serde_json::json;

    fn advisory_json(recommendations: usize, confidence: f64) -> String {
        let recs: Vec<_> = (1..=recommendations)
            .map(|i| json!({"id": i, "text": format!("Tip {i}"), "icon": "💧"}))
            .collect();
        json!({
            "riskLevel": "EXTREME",
            "predictedHeatSummary": "Heat index peaks at 51°C around 2 PM.",
            "recommendations": recs,
            "rationale": "Dense pavement and humidity trap heat.",
            "confidenceScore": confidence,
            "usedFallback": false
        })
        .to_string()
    }

    fn query() -> AdvisoryQuery {
        AdvisoryQuery::new("Downtown", LocationType::Urban).with_readings(38.0, 72.0, 48.0)
    }

    #[test]
    fn test_parse_plain_and_fenced() {
        let body = advisory_json(5, 0.87);
        let plain = parse_advisory(&body).unwrap();
        assert_eq!(plain.risk_level, RiskLevel::Extreme);
        assert!(!plain.used_fallback);

        let fenced = parse_advisory(&format!("Here you go:\n```json\n{}\n```", body)).unwrap();
        assert_eq!(fenced, plain);

        let bare_fence = parse_advisory(&format!("```\n{}\n```", body)).unwrap();
        assert_eq!(bare_fence, plain);
    }

    #[test]
    fn test_json_fence_preferred_over_earlier_fence() {
        let body = advisory_json(5, 0.87);
        let content = format!(
            "Heat index formula:\n```\nHI = T + 0.5555 * (e - 10)\n```\nAdvisory:\n```json\n{}\n```",
            body
        );

        assert_eq!(strip_code_fence(&content), body.trim());
        assert_eq!(parse_advisory(&content).unwrap(), parse_advisory(&body).unwrap());
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    #[test]
    fn test_schema_violations() {
        assert!(matches!(
            parse_advisory(&advisory_json(4, 0.5)),
            Err(AdvisoryError::RecommendationCount(4))
        ));
        assert!(matches!(
            parse_advisory(&advisory_json(5, 1.5)),
            Err(AdvisoryError::Confidence(_))
        ));
        assert!(matches!(
            parse_advisory("I cannot help with that."),
            Err(AdvisoryError::Json(_))
        ));
        assert!(matches!(
            parse_advisory(r#"{"riskLevel":"SCORCHING"}"#),
            Err(AdvisoryError::Json(_))
        ));
    }

    #[test]
    fn test_fallback_substitution() {
        let advisory = parse_or_fallback("not json", &query());

        assert!(advisory.used_fallback);
        assert_eq!(advisory.risk_level, RiskLevel::Extreme);
        assert_eq!(advisory.confidence_score, 0.6);
        assert_eq!(advisory.recommendations.len(), RECOMMENDATION_COUNT);
        assert_eq!(
            advisory.predicted_heat_summary,
            "Heat index of 48°C expected with 72% humidity."
        );
        assert!(validate(&advisory).is_ok());
    }

    #[test]
    fn test_fallback_uses_default_readings() {
        let advisory = fallback_advisory(&AdvisoryQuery::new("Somewhere", LocationType::Rural));
        assert_eq!(advisory.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_conservative_advisory() {
        let advisory = conservative_advisory("AI gateway error: 500");

        assert_eq!(advisory.risk_level, RiskLevel::Moderate);
        assert_eq!(advisory.confidence_score, 0.3);
        assert!(advisory.used_fallback);
        assert_eq!(advisory.error.as_deref(), Some("AI gateway error: 500"));
        assert!(validate(&advisory).is_ok());
    }
}
