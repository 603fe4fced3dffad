use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::{fmt, str::FromStr};

/// A latitude/longitude pair, named the way the OpenWeather `coord` object names it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components are finite and inside the usual geographic ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinates {
    type Err = anyhow::Error;

    /// Parses `"<lat>,<lon>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("Expected coordinates as 'LAT,LON', got '{s}'"))?;

        let coords = Coordinates::new(
            lat.trim().parse().map_err(|_| anyhow::anyhow!("Invalid latitude '{lat}'"))?,
            lon.trim().parse().map_err(|_| anyhow::anyhow!("Invalid longitude '{lon}'"))?,
        );

        if !coords.is_valid() {
            anyhow::bail!("Coordinates out of range: {s}");
        }

        Ok(coords)
    }
}

/// Unit system sent as the `units` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
    /// Kelvin and metres per second.
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial, Units::Standard]
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            "standard" => Ok(Units::Standard),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial, standard."
            )),
        }
    }
}

/// Input of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherRequest {
    pub coordinates: Coordinates,
    pub units: Units,
}

/// A single position report from a location source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub coordinates: Coordinates,
    pub received_at: DateTime<Utc>,
}

impl Fix {
    pub fn now(coordinates: Coordinates) -> Self {
        Self { coordinates, received_at: Utc::now() }
    }
}

/// One entry of the `weather` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    /// Category name, e.g. "Clear" or "Rain".
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<f64>,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<u32>,
    pub humidity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sea_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grnd_level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deg: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

/// Rain or snow volume over the last one and three hours.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default, skip_serializing_if = "Option::is_none")]
    pub last_hour: Option<f64>,
    #[serde(rename = "3h", default, skip_serializing_if = "Option::is_none")]
    pub last_three_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sys {
    /// Absent for positions outside any country, e.g. at sea.
    #[serde(default)]
    pub country: String,
    /// Unix epoch seconds.
    pub sunrise: i64,
    /// Unix epoch seconds.
    pub sunset: i64,
}

/// Parsed body of a `/weather` response.
///
/// Field names follow the API so that the serialized form stored in the
/// cache has the same shape as what the server returned. `weather` is never
/// empty; deserialization rejects an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub coord: Coordinates,
    #[serde(deserialize_with = "non_empty_conditions")]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub base: String,
    pub main: MainReadings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    pub wind: Wind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rain: Option<Precipitation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snow: Option<Precipitation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<Clouds>,
    /// Time of the observation, Unix epoch seconds.
    #[serde(default)]
    pub dt: i64,
    pub sys: Sys,
    /// Shift from UTC in seconds.
    #[serde(default)]
    pub timezone: i32,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cod: u16,
}

impl WeatherRecord {
    /// The entry summary displays use. Always `Some` for parsed records.
    pub fn primary_condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }
}

fn non_empty_conditions<'de, D>(deserializer: D) -> Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let conditions = Vec::<Condition>::deserialize(deserializer)?;
    if conditions.is_empty() {
        return Err(de::Error::invalid_length(0, &"at least one weather condition"));
    }
    Ok(conditions)
}
