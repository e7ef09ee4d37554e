//! HTTP client utilities shared by the backends.
//!
//! Client construction, extra headers and the mapping from non-success
//! responses to [`ClientError`].

use futures::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::client::{ByteStream, ClientError};
use crate::options::TransportOptions;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const QUOTA_MESSAGE: &str = "AI credits exhausted. Please add credits to continue.";

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies. The timeout
/// bounds connecting and each body read, not the whole exchange, so a chat
/// reply may stream for as long as bytes keep arriving.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.connect_timeout(timeout).read_timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.http.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ClientError::Config(format!("Invalid proxy url: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    transport_options: &TransportOptions,
) -> RequestBuilder {
    if let Some(headers) = &transport_options.http.extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// JSON POST to `url` with bearer auth and the configured extra headers.
pub fn authorized_post(
    http_client: &Client,
    url: &str,
    transport_options: &TransportOptions,
) -> Result<RequestBuilder, ClientError> {
    let api_key = transport_options
        .http
        .api_key
        .as_ref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ClientError::Config("API key is required".to_string()))?;

    let request = http_client
        .post(url)
        .header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()))
        .header(CONTENT_TYPE, "application/json");

    Ok(add_extra_headers(request, transport_options))
}

/// Bound a one-shot request by the configured timeout from send to the end
/// of its body.
pub fn with_deadline(request: RequestBuilder, transport_options: &TransportOptions) -> RequestBuilder {
    match transport_options.timeout {
        Some(timeout) => request.timeout(timeout),
        None => request,
    }
}

/// Response body as a [`ByteStream`].
pub fn body_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(response.bytes_stream().map_err(ClientError::from))
}

/// Base URL from the transport options, or `default` when unset.
pub fn base_url(transport_options: &TransportOptions, default: &str) -> String {
    transport_options
        .http
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

/// Functions return `{"error": "..."}`, OpenAI-style gateways
/// `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detailed { message: String },
}

/// Classify a non-success response.
///
/// 429 and 402 become [`ClientError::RateLimited`] and
/// [`ClientError::QuotaExhausted`]. Anything else uses the `error` field of a
/// JSON body when present, or a message built from the status code.
pub fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let reported = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| match b.error {
            ErrorField::Text(text) => text,
            ErrorField::Detailed { message } => message,
        })
        .filter(|message| !message.is_empty());

    warn!(status = status.as_u16(), body_len = body.len(), "Request failed");

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            ClientError::RateLimited(reported.unwrap_or_else(|| RATE_LIMIT_MESSAGE.to_string()))
        }
        StatusCode::PAYMENT_REQUIRED => {
            ClientError::QuotaExhausted(reported.unwrap_or_else(|| QUOTA_MESSAGE.to_string()))
        }
        _ => ClientError::Status {
            status: status.as_u16(),
            message: reported.unwrap_or_else(|| format!("HTTP error: {}", status.as_u16())),
        },
    }
}

/// Read the body of a failed response and classify it.
pub async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_for_status(status, &body)
}
