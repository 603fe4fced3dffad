//! Core library for the `currentweather` client.
//!
//! This crate defines:
//! - Connectivity checks and push-style location updates
//! - The OpenWeather current-conditions client
//! - A single-slot cache of the last successful response
//! - The pipeline wiring them together, and display/speech formatting
//!
//! It is used by `currentweather-cli`, but can also be embedded in other front ends.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod presentation;
pub mod provider;

pub use cache::{FileStore, KeyValueStore, MemoryStore, WeatherCache};
pub use config::Config;
pub use connectivity::{ConnectivityProbe, SysfsProbe, StaticProbe, is_network_available};
pub use error::{FailureClass, FetchError, LocationError, StoreError};
pub use location::{LocationProvider, LocationRequest, LocationServices, LocationUpdates, Priority};
pub use model::{Coordinates, Fix, Units, WeatherRecord, WeatherRequest};
pub use pipeline::{FetchOutcome, OrderingPolicy, PipelineEvent, WeatherPipeline};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider};
