//! Direct client for an OpenAI-compatible chat completions gateway.
//!
//! This does what the hosted functions do server side: it prepends the heat
//! safety system prompt and the zone context to the conversation, and asks
//! for structured advisories.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::advisory::{conservative_advisory, parse_or_fallback};
use crate::client::{ByteStream, Client, ClientError, StreamingClient};
use crate::http::{
    authorized_post, base_url, body_stream, build_http_client, error_from_response,
    with_deadline, QUOTA_MESSAGE, RATE_LIMIT_MESSAGE,
};
use crate::model::{AdvisoryQuery, ChatRequest, HeatAdvisory, Role, ZoneContext};
use crate::options::{ModelOptions, Settings, TransportOptions};

pub const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-3-flash-preview";

const CHAT_TEMPERATURE: f32 = 0.5;
const ADVISORY_TEMPERATURE: f32 = 0.3;

pub const CHAT_SYSTEM_PROMPT: &str = r#"You are a friendly, helpful AI assistant specializing in heat safety and urban heat island effects. You provide accurate, actionable advice grounded in official health guidelines.

Your knowledge includes:

# Official Heat Safety Guidelines for AI Chat Context

## Heat Index Categories
- LOW: Below 27°C (80°F) - Safe conditions
- MODERATE: 27-32°C (80-90°F) - Caution advised
- HIGH: 32-41°C (90-105°F) - Danger, limit exposure
- EXTREME: Above 41°C (105°F) - Extreme danger, avoid outdoors

## Hydration Guidelines
- Drink 8-12 oz water every 20 minutes during outdoor activity
- Don't wait until thirsty - thirst indicates dehydration has begun
- Avoid caffeine and alcohol during heat events
- Sports drinks can replace electrolytes during prolonged exposure

## Activity Timing
- Safest hours: Before 10 AM, after 6 PM
- Peak danger: 11 AM - 4 PM
- Schedule strenuous activities for cooler periods
- Take 10-15 minute breaks every hour in shade

## Heat Illness Recognition
Heat Exhaustion: Heavy sweating, weakness, pale skin, nausea
Heat Stroke: High temp (103°F+), hot red dry skin, confusion, rapid pulse
Heat Stroke is a medical emergency - call 911 immediately

## Special Populations
- Elderly: More vulnerable, check on them regularly
- Children: Cannot regulate temperature well, need supervision
- Outdoor workers: Mandatory breaks and hydration
- Athletes: Gradual acclimatization over 10-14 days

Guidelines for responses:
1. Be concise but thorough - aim for 2-4 sentences per point
2. Always ground advice in official guidelines (WHO, CDC)
3. Use emojis sparingly to highlight key points
4. If asked about a specific zone, tailor advice to that location
5. For symptoms questions, always recommend seeking medical help when in doubt
6. Never provide medical diagnoses - only general safety guidance
7. Acknowledge uncertainty when data is incomplete

If the user provides zone context, incorporate that information into your response."#;

pub const ADVISORY_SYSTEM_PROMPT: &str = r#"You are an AI heat safety advisor that provides personalized heat risk advisories based on weather data and official guidelines.

Given location and weather data, you MUST generate advisories following this EXACT structure:

1. Determine the Heat Risk Level: LOW, MODERATE, HIGH, or EXTREME based on heat index
2. Summarize predicted conditions in one sentence
3. Provide exactly 5 actionable recommendations with emoji icons
4. Explain the rationale briefly
5. Assign a confidence score (0-1)

Use ONLY the official guidelines provided. Never hallucinate or invent safety rules.


# Official Heat Safety Guidelines

## Heat Index Risk Categories (WHO & CDC Guidelines)

### LOW RISK (Heat Index below 27°C / 80°F)
- Conditions generally safe for most outdoor activities
- Standard hydration practices recommended
- No special precautions required for healthy individuals

### MODERATE RISK (Heat Index 27-32°C / 80-90°F)
- Fatigue possible with prolonged exposure and physical activity
- Drink water every 30 minutes during outdoor activity
- Take breaks in shade or air conditioning
- Sensitive groups (elderly, children, chronic conditions) should limit exposure

### HIGH RISK (Heat Index 32-41°C / 90-105°F)
- Heat cramps and heat exhaustion likely
- Limit strenuous outdoor activities to morning/evening
- Drink 8-12 oz water every 15-20 minutes
- Never leave children or pets in vehicles
- Check on vulnerable neighbors and family members
- Wear lightweight, light-colored, loose-fitting clothing

### EXTREME RISK (Heat Index above 41°C / 105°F)
- Heat stroke highly likely without protective measures
- Avoid all non-essential outdoor activities
- Stay in air-conditioned environments
- If outdoors, take breaks every 15 minutes minimum
- Drink water continuously, do not wait until thirsty
- Know heat stroke warning signs: confusion, hot dry skin, rapid pulse
- This is a medical emergency situation

## Special Population Guidelines

### Outdoor Workers
- Mandatory rest breaks: 10 min/hour in HIGH, 15 min/hour in EXTREME
- Employer must provide water, shade, and cooling stations
- Buddy system required for monitoring heat illness symptoms

### Elderly (65+)
- Higher risk due to reduced sweating and medications
- Check indoor temperatures - should not exceed 26°C / 78°F
- Social check-ins every 2-4 hours during heat events
- Avoid caffeine and alcohol which increase dehydration

### Children
- Cannot regulate body temperature as efficiently as adults
- Never leave in parked vehicles - temperatures rise 20°F in 10 minutes
- Limit outdoor play during peak hours (10 AM - 4 PM)
- Encourage water breaks every 20 minutes during play

### Athletes & Active Individuals
- Acclimatization takes 10-14 days of gradual exposure
- Weigh before/after exercise - drink 16-24 oz per pound lost
- Cancel outdoor practices/games when Heat Index exceeds 40°C
- Watch for early signs: muscle cramps, excessive sweating, nausea

## Heat Illness Recognition and Response

### Heat Exhaustion
Symptoms: Heavy sweating, weakness, cold/pale/clammy skin, fast weak pulse, nausea
Action: Move to cool location, lie down, loosen clothing, apply cool wet cloths, sip water

### Heat Stroke (EMERGENCY)
Symptoms: High body temperature (103°F+), hot red dry skin, rapid strong pulse, confusion
Action: Call 911 immediately, move to cool area, reduce body temperature with cool cloths, DO NOT give fluids


Response must be valid JSON matching this structure:
{
  "riskLevel": "LOW" | "MODERATE" | "HIGH" | "EXTREME",
  "predictedHeatSummary": "string",
  "recommendations": [
    { "id": 1, "text": "string", "icon": "emoji" },
    { "id": 2, "text": "string", "icon": "emoji" },
    { "id": 3, "text": "string", "icon": "emoji" },
    { "id": 4, "text": "string", "icon": "emoji" },
    { "id": 5, "text": "string", "icon": "emoji" }
  ],
  "rationale": "string",
  "confidenceScore": number,
  "usedFallback": boolean
}"#;

/// Gateway client using HTTP transport.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    model_options: ModelOptions,
    transport_options: TransportOptions,
    http_client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(
        model_options: ModelOptions,
        transport_options: TransportOptions,
    ) -> Result<Self, ClientError> {
        let http_client = build_http_client(&transport_options)?;
        Ok(Self {
            model_options,
            transport_options,
            http_client,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        Self::new(settings.model_options(), settings.gateway_transport()?)
    }

    pub fn model_options(&self) -> &ModelOptions {
        &self.model_options
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            base_url(&self.transport_options, DEFAULT_BASE_URL)
        )
    }

    fn completion_request(
        &self,
        messages: Vec<GatewayMessage>,
        default_temperature: f32,
        stream: bool,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self
                .model_options
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            messages,
            temperature: self.model_options.temperature.unwrap_or(default_temperature),
            max_tokens: self.model_options.max_tokens,
            stream,
        }
    }

    fn post(&self) -> Result<RequestBuilder, ClientError> {
        authorized_post(&self.http_client, &self.completions_url(), &self.transport_options)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await?;

        if response.status().is_success() {
            return Ok(response);
        }

        // Users see the same wording whichever backend they talk to.
        Err(match error_from_response(response).await {
            ClientError::RateLimited(_) => ClientError::RateLimited(RATE_LIMIT_MESSAGE.to_string()),
            ClientError::QuotaExhausted(_) => ClientError::QuotaExhausted(QUOTA_MESSAGE.to_string()),
            other => other,
        })
    }

    async fn complete_advisory(&self, query: &AdvisoryQuery) -> Result<String, ClientError> {
        let messages = vec![
            GatewayMessage::new(GatewayRole::System, ADVISORY_SYSTEM_PROMPT),
            GatewayMessage::new(GatewayRole::User, advisory_prompt(query)),
        ];
        let body = self.completion_request(messages, ADVISORY_TEMPERATURE, false);

        let request = with_deadline(self.post()?, &self.transport_options).json(&body);
        let completion: CompletionResponse = self.send(request).await?.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClientError::MissingBody)
    }
}

/// System message describing the selected zone's readings.
pub fn zone_message(zone: &ZoneContext) -> String {
    format!(
        "Current zone context - The user is viewing: {}. Current conditions: Temperature {}°C, Humidity {}%, Heat Index {}°C, Risk Level: {}. Expected peak: {}°C at {}.",
        zone.name,
        zone.temperature,
        zone.humidity,
        zone.heat_index,
        zone.risk_level,
        zone.predicted_peak,
        zone.peak_time,
    )
}

/// User message asking for an advisory. `query` should be resolved.
pub fn advisory_prompt(query: &AdvisoryQuery) -> String {
    let location = if query.location.trim().is_empty() {
        "Unknown location"
    } else {
        query.location.as_str()
    };

    [
        "Generate a heat risk advisory for:".to_string(),
        format!("- Location: {}", location),
        format!("- Location Type: {}", query.location_type),
        format!("- Current Temperature: {}°C", query.temperature()),
        format!("- Humidity: {}%", query.humidity()),
        format!("- Heat Index: {}°C", query.heat_index()),
        String::new(),
        format!(
            "Consider the location type ({}) when making recommendations. Urban areas retain more heat, coastal areas may have sea breezes, campuses have outdoor walking, etc.",
            query.location_type
        ),
        String::new(),
        "Provide personalized recommendations based on these specific conditions.".to_string(),
    ]
    .iter()
    .join("\n")
}

/// Upstream message list: system prompt, zone context, then the history.
fn chat_messages(request: &ChatRequest) -> Vec<GatewayMessage> {
    let mut messages = vec![GatewayMessage::new(GatewayRole::System, CHAT_SYSTEM_PROMPT)];
    if let Some(zone) = &request.zone_context {
        messages.push(GatewayMessage::new(GatewayRole::System, zone_message(zone)));
    }
    messages.extend(
        request
            .messages
            .iter()
            .map(|turn| GatewayMessage::new(turn.role.into(), turn.content.clone())),
    );
    messages
}

#[async_trait]
impl Client for GatewayClient {
    /// Gateway failures other than rate limit, quota and configuration are
    /// reported inside a conservative advisory rather than as errors.
    async fn request_advisory(&self, query: &AdvisoryQuery) -> Result<HeatAdvisory, ClientError> {
        let query = query.resolved();

        match self.complete_advisory(&query).await {
            Ok(content) => Ok(parse_or_fallback(&content, &query)),
            Err(e) if e.is_rate_limited() || matches!(e, ClientError::Config(_)) => Err(e),
            Err(e) => {
                error!(error = %e, location = %query.location, "Advisory request failed");
                let reason = match e.status() {
                    Some(status) => format!("AI gateway error: {}", status),
                    None => e.to_string(),
                };
                Ok(conservative_advisory(reason))
            }
        }
    }
}

#[async_trait]
impl StreamingClient for GatewayClient {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let body = self.completion_request(chat_messages(request), CHAT_TEMPERATURE, true);
        debug!(model = %body.model, messages = body.messages.len(), "Opening gateway stream");

        let response = self.send(self.post()?.json(&body)).await?;
        if response.content_length() == Some(0) {
            return Err(ClientError::MissingBody);
        }
        Ok(body_stream(response))
    }
}

// --- Gateway API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<GatewayMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum GatewayRole {
    System,
    User,
    Assistant,
}

impl From<Role> for GatewayRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => GatewayRole::User,
            Role::Assistant => GatewayRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GatewayMessage {
    role: GatewayRole,
    content: String,
}

impl GatewayMessage {
    fn new(role: GatewayRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LocationType;
    use crate::options::HttpTransport;
    use crate::zones::zone_by_id;
    use serde_json::json;

    fn client(model_options: ModelOptions) -> GatewayClient {
        GatewayClient::new(model_options, TransportOptions::new(HttpTransport::new("key"))).unwrap()
    }

    #[test]
    fn test_zone_message() {
        let zone = ZoneContext::from(zone_by_id("zone-3").unwrap());
        assert_eq!(
            zone_message(&zone),
            "Current zone context - The user is viewing: Residential North. Current conditions: Temperature 33°C, Humidity 65%, Heat Index 38°C, Risk Level: MODERATE. Expected peak: 41°C at 2:30 PM."
        );
    }

    #[test]
    fn test_chat_request_body() {
        let request = ChatRequest::new("Can I run at noon?")
            .with_zone(ZoneContext::from(zone_by_id("zone-1").unwrap()));
        let body = client(ModelOptions::default()).completion_request(
            chat_messages(&request),
            CHAT_TEMPERATURE,
            true,
        );
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["temperature"], json!(0.5));
        assert_eq!(value["stream"], json!(true));
        assert!(value.get("max_tokens").is_none());

        let roles: Vec<_> = value["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "system", "user"]);
        assert_eq!(value["messages"][0]["content"], CHAT_SYSTEM_PROMPT);
        assert_eq!(value["messages"][2]["content"], "Can I run at noon?");
    }

    #[test]
    fn test_model_options_override_defaults() {
        let options = ModelOptions::default()
            .with_model("google/gemini-2.5-flash".to_string())
            .with_temperature(0.9);
        let body = client(options).completion_request(Vec::new(), ADVISORY_TEMPERATURE, false);
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "google/gemini-2.5-flash");
        assert!((value["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!(value.get("stream").is_none());
    }

    #[test]
    fn test_advisory_prompt() {
        let query = AdvisoryQuery::new("Marikina", LocationType::Residential).resolved();
        let prompt = advisory_prompt(&query);

        assert!(prompt.starts_with("Generate a heat risk advisory for:\n- Location: Marikina\n"));
        assert!(prompt.contains("- Location Type: residential"));
        assert!(prompt.contains("- Heat Index: 40°C"));
        assert!(prompt.contains("Consider the location type (residential)"));
    }

    #[test]
    fn test_advisory_system_prompt_carries_full_guidelines() {
        for line in [
            "- No special precautions required for healthy individuals",
            "- Take breaks in shade or air conditioning",
            "- Social check-ins every 2-4 hours during heat events",
            "- Avoid caffeine and alcohol which increase dehydration",
            "- Buddy system required for monitoring heat illness symptoms",
            "reduce body temperature with cool cloths, DO NOT give fluids",
        ] {
            assert!(ADVISORY_SYSTEM_PROMPT.contains(line), "missing: {}", line);
        }
        assert!(ADVISORY_SYSTEM_PROMPT.ends_with("\"usedFallback\": boolean\n}"));
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            client(ModelOptions::default()).completions_url(),
            "https://ai.gateway.lovable.dev/v1/chat/completions"
        );
        let custom = GatewayClient::new(
            ModelOptions::default(),
            TransportOptions::new(HttpTransport::new("key").with_base_url("http://localhost:9/v1/".to_string())),
        )
        .unwrap();
        assert_eq!(custom.completions_url(), "http://localhost:9/v1/chat/completions");
    }

    #[test]
    fn test_completion_response_shape() {
        let completion: CompletionResponse = serde_json::from_value(json!({
            "id": "gen-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{}"}}]
        }))
        .unwrap();
        assert_eq!(completion.choices[0].message.content.as_deref(), Some("{}"));
    }
}
