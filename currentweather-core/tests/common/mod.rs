#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use currentweather_core::{
    MemoryStore, OpenWeatherProvider, StaticProbe, Units, WeatherCache, WeatherPipeline,
};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const API_KEY: &str = "test-key";

/// A `/weather` body shaped like the live API's, for the given position.
pub fn weather_body(lat: f64, lon: f64, name: &str, temp: f64) -> Value {
    json!({
        "coord": { "lon": lon, "lat": lat },
        "weather": [
            { "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }
        ],
        "base": "stations",
        "main": {
            "temp": temp,
            "feels_like": temp - 0.6,
            "temp_min": temp - 1.2,
            "temp_max": temp + 0.8,
            "pressure": 1012,
            "humidity": 60
        },
        "visibility": 10000,
        "wind": { "speed": 3.1, "deg": 240 },
        "clouds": { "all": 0 },
        "dt": 1700020000,
        "sys": { "country": "GB", "sunrise": 1700000000, "sunset": 1700040000 },
        "timezone": 0,
        "id": 2643743,
        "name": name,
        "cod": 200
    })
}

pub fn provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::builder(API_KEY.to_string())
        .base_url(server.uri())
        .timeout(Duration::from_secs(2))
        .build()
        .expect("client builds")
}

pub fn pipeline(server: &MockServer, probe: StaticProbe) -> WeatherPipeline<MemoryStore> {
    WeatherPipeline::new(
        Arc::new(probe),
        Arc::new(provider(server)),
        Arc::new(WeatherCache::new(MemoryStore::new())),
        Units::Metric,
    )
}
