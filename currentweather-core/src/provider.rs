use crate::{
    Config, WeatherRecord, WeatherRequest, error::FetchError,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

pub mod openweather;

/// A source of current weather for a position.
///
/// Implementations issue exactly one request per call and never retry or
/// consult the cache. Callers check connectivity first.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherRecord, FetchError>;
}

/// Construct the OpenWeather client from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.require_api_key()?;

    let provider = OpenWeatherProvider::builder(api_key.to_owned())
        .base_url(config.base_url())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    Ok(Box::new(provider))
}
