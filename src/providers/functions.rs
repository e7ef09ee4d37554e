//! Client for the hosted `heat-chat` and `heat-advisory` functions.
//!
//! The functions hold the model credentials and prompts; this client only
//! sends the conversation or the advisory query and reads the result.

use async_trait::async_trait;
use tracing::debug;

use crate::advisory::parse_or_fallback;
use crate::client::{ByteStream, Client, ClientError, StreamingClient};
use crate::http::{
    authorized_post, body_stream, build_http_client, error_from_response, with_deadline,
};
use crate::model::{AdvisoryQuery, ChatRequest, HeatAdvisory};
use crate::options::{Settings, TransportOptions};

const CHAT_FUNCTION: &str = "heat-chat";
const ADVISORY_FUNCTION: &str = "heat-advisory";

/// Functions backend client using HTTP transport.
///
/// `base_url` is the functions root, e.g.
/// `https://<project>.supabase.co/functions/v1`, and `api_key` the
/// publishable key sent as the bearer token.
#[derive(Debug, Clone)]
pub struct FunctionsClient {
    transport_options: TransportOptions,
    http_client: reqwest::Client,
}

impl FunctionsClient {
    pub fn new(transport_options: TransportOptions) -> Result<Self, ClientError> {
        let http_client = build_http_client(&transport_options)?;
        Ok(Self {
            transport_options,
            http_client,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        Self::new(settings.functions_transport()?)
    }

    fn function_url(&self, name: &str) -> Result<String, ClientError> {
        let base = self
            .transport_options
            .http
            .base_url
            .as_deref()
            .ok_or_else(|| ClientError::Config("functions base url is required".to_string()))?;
        Ok(format!("{}/{}", base.trim_end_matches('/'), name))
    }
}

#[async_trait]
impl Client for FunctionsClient {
    async fn request_advisory(&self, query: &AdvisoryQuery) -> Result<HeatAdvisory, ClientError> {
        let url = self.function_url(ADVISORY_FUNCTION)?;
        let query = query.resolved();

        let request = authorized_post(&self.http_client, &url, &self.transport_options)?;
        let response = with_deadline(request, &self.transport_options)
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        debug!(location = %query.location, len = body.len(), "Advisory received");
        Ok(parse_or_fallback(&body, &query))
    }
}

#[async_trait]
impl StreamingClient for FunctionsClient {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let url = self.function_url(CHAT_FUNCTION)?;

        let response = authorized_post(&self.http_client, &url, &self.transport_options)?
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        if response.content_length() == Some(0) {
            return Err(ClientError::MissingBody);
        }

        debug!(status = response.status().as_u16(), "Chat stream opened");
        Ok(body_stream(response))
    }
}
