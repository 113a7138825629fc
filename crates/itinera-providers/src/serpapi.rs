//! SerpApi search client

use std::time::Duration;

use itinera_config::SerpApiSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::check_status;
use crate::traits::ProviderResult;
use crate::ProviderError;

/// Thin wrapper over `GET /search.json`.
pub struct SerpApiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(settings: &SerpApiSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("API key required for SerpApi".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run `engine` with `params` and return the raw JSON body.
    ///
    /// SerpApi reports "no results" and similar conditions as an `error`
    /// field on a 200 response; those become [`ProviderError::Upstream`].
    pub async fn search(&self, engine: &str, params: &[(&str, &str)]) -> ProviderResult<Value> {
        let url = format!("{}/search.json", self.base_url);

        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 2);
        query.push(("engine", engine));
        query.extend_from_slice(params);
        query.push(("api_key", self.api_key.expose_secret()));

        tracing::debug!(engine, "serpapi request");
        let response = self.client.get(&url).query(&query).send().await?;
        let response = check_status(response, "serpapi").await?;
        let body: Value = response.json().await?;

        if let Some(message) = body.get("error").and_then(Value::as_str) {
            return Err(ProviderError::Upstream {
                provider: "serpapi".to_string(),
                message: message.to_string(),
            });
        }
        Ok(body)
    }
}
