use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{FailureClass, FetchError},
    model::{WeatherRecord, WeatherRequest},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the OpenWeather `/weather` (current conditions) endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

pub struct OpenWeatherProviderBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherProviderBuilder {
    /// Base URL without the trailing `/weather`, e.g. a mock server's URI.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherProvider> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(OpenWeatherProvider {
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl OpenWeatherProvider {
    pub fn builder(api_key: String) -> OpenWeatherProviderBuilder {
        OpenWeatherProviderBuilder {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/weather", self.base_url)
    }

    #[instrument(skip(self), fields(lat = request.coordinates.latitude, lon = request.coordinates.longitude, units = %request.units))]
    async fn fetch_current(&self, request: &WeatherRequest) -> Result<WeatherRecord, FetchError> {
        let res = self
            .http
            .get(self.endpoint())
            .query(&[
                ("lat", request.coordinates.latitude.to_string()),
                ("lon", request.coordinates.longitude.to_string()),
                ("units", request.units.as_str().to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "weather request got no response");
                FetchError::Transport(e)
            })?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            error!(error = %e, "failed to read weather response body");
            FetchError::Transport(e)
        })?;

        if !status.is_success() {
            let err = FetchError::status(status, truncate_body(&body));
            match err.class() {
                Some(FailureClass::MalformedRequest) => warn!(%status, "bad request"),
                Some(FailureClass::NotFound) => warn!(%status, "not found"),
                _ => warn!(%status, "generic error"),
            }
            return Err(err);
        }

        let record: WeatherRecord = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "weather response did not parse");
            FetchError::Parse(e)
        })?;

        info!(name = %record.name, country = %record.sys.country, "weather received");
        Ok(record)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherRecord, FetchError> {
        self.fetch_current(request).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|&i| body.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}
