//! Options structures for transport, model and endpoint configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::client::ClientError;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Transport options shared by every backend.
///
/// # Example
/// ```rust
/// use heatline::options::{TransportOptions, HttpTransport};
/// use std::time::Duration;
///
/// let options = TransportOptions::new(
///     HttpTransport::new("publishable-key").with_base_url("https://example.functions.dev".to_string()),
/// )
/// .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Connect and read timeout. A body read that waits longer fails the
    /// stream with a network error. Advisory calls also use it as a deadline
    /// for the whole request.
    pub timeout: Option<Duration>,

    pub http: HttpTransport,
}

impl TransportOptions {
    pub fn new(http: HttpTransport) -> Self {
        Self {
            timeout: None,
            http,
        }
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP-specific transport options.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    /// Bearer token for authentication
    pub api_key: Option<SecretString>,

    /// Base URL for API endpoints
    pub base_url: Option<String>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpTransport {
    /// Create new HTTP transport options with an API key.
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Model behaviour parameters for backends that call the model directly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelOptions {
    /// Model identifier (e.g., "google/gemini-3-flash-preview")
    pub model: Option<String>,

    /// Sampling temperature; overrides the per-call defaults when set
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ModelOptions {
    /// Set the model identifier.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// URL and key for one backend.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSettings {
    pub url: String,
    pub api_key: SecretString,
}

/// Endpoint configuration loaded from the environment or a TOML file.
///
/// ```toml
/// timeout_secs = 60
/// model = "google/gemini-3-flash-preview"
///
/// [functions]
/// url = "https://project.functions.example.dev/functions/v1"
/// api_key = "publishable-key"
///
/// [gateway]
/// url = "https://ai.gateway.example.dev/v1"
/// api_key = "secret"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub functions: Option<EndpointSettings>,

    #[serde(default)]
    pub gateway: Option<EndpointSettings>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

pub const ENV_FUNCTIONS_URL: &str = "HEATLINE_FUNCTIONS_URL";
pub const ENV_FUNCTIONS_KEY: &str = "HEATLINE_FUNCTIONS_KEY";
pub const ENV_GATEWAY_URL: &str = "HEATLINE_GATEWAY_URL";
pub const ENV_GATEWAY_KEY: &str = "HEATLINE_GATEWAY_KEY";
pub const ENV_MODEL: &str = "HEATLINE_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "HEATLINE_TIMEOUT_SECS";

impl Settings {
    /// Load settings from `HEATLINE_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load settings from a TOML file. Keys in the environment replace the
    /// ones in the file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Config(format!("Failed to read config file: {}", e)))?;
        let mut settings = Self::from_toml(&contents)?;
        settings.apply_secret_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ClientError> {
        toml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let endpoint = |url_key: &str, key_key: &str| {
            var(url_key).map(|url| EndpointSettings {
                url,
                api_key: SecretString::new(var(key_key).unwrap_or_default()),
            })
        };

        let timeout_secs = var(ENV_TIMEOUT_SECS)
            .map(|v| {
                v.parse::<u64>().map_err(|e| {
                    ClientError::Config(format!("Invalid {} value: {}", ENV_TIMEOUT_SECS, e))
                })
            })
            .transpose()?;

        Ok(Settings {
            functions: endpoint(ENV_FUNCTIONS_URL, ENV_FUNCTIONS_KEY),
            gateway: endpoint(ENV_GATEWAY_URL, ENV_GATEWAY_KEY),
            model: var(ENV_MODEL),
            timeout_secs,
        })
    }

    fn apply_secret_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let (Some(functions), Some(key)) = (self.functions.as_mut(), var(ENV_FUNCTIONS_KEY)) {
            functions.api_key = SecretString::new(key);
        }
        if let (Some(gateway), Some(key)) = (self.gateway.as_mut(), var(ENV_GATEWAY_KEY)) {
            gateway.api_key = SecretString::new(key);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.functions.is_none() && self.gateway.is_none() {
            return Err(ClientError::Config(
                "No endpoint configured (set functions or gateway)".to_string(),
            ));
        }

        for (name, endpoint) in [("functions", &self.functions), ("gateway", &self.gateway)] {
            if let Some(endpoint) = endpoint {
                if endpoint.url.is_empty() {
                    return Err(ClientError::Config(format!("{} url is empty", name)));
                }
                if endpoint.api_key.is_empty() {
                    return Err(ClientError::Config(format!("{} api key is empty", name)));
                }
            }
        }

        if self.timeout_secs == Some(0) {
            return Err(ClientError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Transport options for the hosted functions backend.
    pub fn functions_transport(&self) -> Result<TransportOptions, ClientError> {
        let endpoint = self
            .functions
            .as_ref()
            .ok_or_else(|| ClientError::Config("functions endpoint not configured".to_string()))?;
        Ok(self.transport_for(endpoint))
    }

    /// Transport options for the model gateway backend.
    pub fn gateway_transport(&self) -> Result<TransportOptions, ClientError> {
        let endpoint = self
            .gateway
            .as_ref()
            .ok_or_else(|| ClientError::Config("gateway endpoint not configured".to_string()))?;
        Ok(self.transport_for(endpoint))
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            model: self.model.clone(),
            ..ModelOptions::default()
        }
    }

    fn transport_for(&self, endpoint: &EndpointSettings) -> TransportOptions {
        TransportOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            http: HttpTransport {
                api_key: Some(endpoint.api_key.clone()),
                base_url: Some(endpoint.url.clone()),
                proxy: None,
                extra_headers: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::from("sk-live");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "sk-live");
    }

    #[test]
    fn test_settings_from_vars() {
        let settings = Settings::from_vars(vars(&[
            (ENV_FUNCTIONS_URL, "https://fn.example.dev/functions/v1"),
            (ENV_FUNCTIONS_KEY, "anon"),
            (ENV_TIMEOUT_SECS, "45"),
        ]))
        .unwrap();

        assert!(settings.gateway.is_none());
        assert!(settings.validate().is_ok());

        let transport = settings.functions_transport().unwrap();
        assert_eq!(transport.timeout, Some(Duration::from_secs(45)));
        assert_eq!(
            transport.http.base_url.as_deref(),
            Some("https://fn.example.dev/functions/v1")
        );
        assert!(settings.gateway_transport().is_err());
    }

    #[test]
    fn test_invalid_timeout() {
        let result = Settings::from_vars(vars(&[(ENV_TIMEOUT_SECS, "soon")]));
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_settings_validation() {
        assert!(Settings::default().validate().is_err());

        let missing_key = Settings::from_vars(vars(&[(ENV_GATEWAY_URL, "https://gw.example.dev/v1")]))
            .unwrap();
        assert!(missing_key.validate().is_err());

        let zero_timeout = Settings::from_vars(vars(&[
            (ENV_GATEWAY_URL, "https://gw.example.dev/v1"),
            (ENV_GATEWAY_KEY, "secret"),
            (ENV_TIMEOUT_SECS, "0"),
        ]))
        .unwrap();
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_settings_from_toml_with_overrides() {
        let mut settings = Settings::from_toml(
            r#"
            timeout_secs = 20
            model = "google/gemini-2.5-flash"

            [gateway]
            url = "https://gw.example.dev/v1"
            api_key = "from-file"
            "#,
        )
        .unwrap();
        settings.apply_secret_overrides(vars(&[(ENV_GATEWAY_KEY, "from-env")]));

        let transport = settings.gateway_transport().unwrap();
        assert_eq!(
            transport.http.api_key.unwrap().expose_secret(),
            "from-env"
        );
        assert_eq!(
            settings.model_options().model.as_deref(),
            Some("google/gemini-2.5-flash")
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Settings::from_toml("[gateway\nurl="),
            Err(ClientError::Config(_))
        ));
    }
}
