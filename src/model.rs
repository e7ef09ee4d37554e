//! Data models for chat turns, zone context and advisories.

use std::fmt;
use std::str::FromStr;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Unique per message; used by the UI for reconciliation.
    pub id: String,
    pub role: Role,
    pub content: String,
    /// True while an assistant reply is still receiving deltas.
    pub streaming: bool,
}

const PENDING_PREFIX: &str = "pending-";

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            streaming: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            streaming: false,
        }
    }

    /// Empty assistant message with a transient id, to be filled by deltas.
    pub fn pending_assistant() -> Self {
        Self {
            id: format!("{}{}", PENDING_PREFIX, Uuid::new_v4()),
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.starts_with(PENDING_PREFIX)
    }

    /// Stop streaming and replace the transient id with a permanent one.
    pub fn finalize(&mut self) {
        self.streaming = false;
        if self.is_pending() {
            self.id = Uuid::new_v4().to_string();
        }
    }

    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A `(role, content)` pair replayed to the remote model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Heat risk category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    /// Categorise a heat index in °C.
    ///
    /// # Example
    /// ```
    /// use heatline::model::RiskLevel;
    ///
    /// assert_eq!(RiskLevel::from_heat_index(26.9), RiskLevel::Low);
    /// assert_eq!(RiskLevel::from_heat_index(27.0), RiskLevel::Moderate);
    /// assert_eq!(RiskLevel::from_heat_index(32.0), RiskLevel::High);
    /// assert_eq!(RiskLevel::from_heat_index(41.0), RiskLevel::Extreme);
    /// ```
    pub fn from_heat_index(heat_index: f64) -> Self {
        if heat_index >= 41.0 {
            RiskLevel::Extreme
        } else if heat_index >= 32.0 {
            RiskLevel::High
        } else if heat_index >= 27.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// One-line guidance shown next to the level.
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Conditions are safe for most outdoor activities.",
            RiskLevel::Moderate => "Take precautions, especially if sensitive to heat.",
            RiskLevel::High => "Significant risk of heat-related illness. Limit exposure.",
            RiskLevel::Extreme => "Dangerous heat conditions. Avoid outdoor activities.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a selected zone's readings, sent alongside a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneContext {
    pub name: String,
    pub temperature: f64,
    pub humidity: f64,
    pub heat_index: f64,
    pub risk_level: RiskLevel,
    pub predicted_peak: f64,
    pub peak_time: String,
}

/// Request body of the chat stream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Full history in chronological order, ending with the new user turn.
    pub messages: NonEmpty<ConversationTurn>,

    #[serde(
        rename = "zoneContext",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub zone_context: Option<ZoneContext>,
}

impl ChatRequest {
    /// Single-turn request.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            messages: NonEmpty::new(ConversationTurn {
                role: Role::User,
                content: content.into(),
            }),
            zone_context: None,
        }
    }

    pub fn with_zone(mut self, zone: ZoneContext) -> Self {
        self.zone_context = Some(zone);
        self
    }
}

/// Kind of place an advisory is requested for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Urban,
    Residential,
    Campus,
    Rural,
    Coastal,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Urban => "urban",
            LocationType::Residential => "residential",
            LocationType::Campus => "campus",
            LocationType::Rural => "rural",
            LocationType::Coastal => "coastal",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urban" => Ok(LocationType::Urban),
            "residential" => Ok(LocationType::Residential),
            "campus" => Ok(LocationType::Campus),
            "rural" => Ok(LocationType::Rural),
            "coastal" => Ok(LocationType::Coastal),
            other => Err(format!("unknown location type: {}", other)),
        }
    }
}

pub const DEFAULT_TEMPERATURE: f64 = 35.0;
pub const DEFAULT_HUMIDITY: f64 = 65.0;
pub const DEFAULT_HEAT_INDEX: f64 = 40.0;

/// Request body of the advisory endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryQuery {
    pub location: String,
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat_index: Option<f64>,
}

impl AdvisoryQuery {
    pub fn new(location: impl Into<String>, location_type: LocationType) -> Self {
        Self {
            location: location.into(),
            location_type,
            temperature: None,
            humidity: None,
            heat_index: None,
        }
    }

    pub fn with_readings(mut self, temperature: f64, humidity: f64, heat_index: f64) -> Self {
        self.temperature = Some(temperature);
        self.humidity = Some(humidity);
        self.heat_index = Some(heat_index);
        self
    }

    /// Copy with every missing reading replaced by its default.
    pub fn resolved(&self) -> Self {
        Self {
            location: self.location.clone(),
            location_type: self.location_type,
            temperature: Some(self.temperature()),
            humidity: Some(self.humidity()),
            heat_index: Some(self.heat_index()),
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn humidity(&self) -> f64 {
        self.humidity.unwrap_or(DEFAULT_HUMIDITY)
    }

    pub fn heat_index(&self) -> f64 {
        self.heat_index.unwrap_or(DEFAULT_HEAT_INDEX)
    }
}

/// One actionable recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: u32,
    pub text: String,
    pub icon: String,
}

impl Recommendation {
    pub fn new(id: u32, text: &str, icon: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Heat advisory for a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatAdvisory {
    pub risk_level: RiskLevel,
    pub predicted_heat_summary: String,
    pub recommendations: Vec<Recommendation>,
    pub rationale: String,
    /// Between 0 and 1.
    pub confidence_score: f64,
    #[serde(default)]
    pub used_fallback: bool,
    /// Upstream failure reported alongside a conservative advisory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
