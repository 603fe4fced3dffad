//! Display strings, icons and spoken phrases for a [`WeatherRecord`].

use chrono::{DateTime, FixedOffset, Utc};

use crate::model::{Units, WeatherRecord};

/// Regions that report temperatures in Fahrenheit.
const IMPERIAL_REGIONS: &[&str] = &["US", "LR", "MM"];

/// Extract an ISO 3166 region code from a locale string such as `en_US`,
/// `en-US.UTF-8`, `en_US@euro` or plain `US`.
pub fn region_from_locale(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next().unwrap_or(locale).trim();
    let candidate = match base.split_once(['_', '-']) {
        Some((_, rest)) => rest.rsplit(['_', '-']).next().unwrap_or(rest),
        None if base.len() == 2 && base.chars().all(|c| c.is_ascii_uppercase()) => base,
        None => return None,
    };

    (candidate.len() == 2 && candidate.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| candidate.to_ascii_uppercase())
}

/// `°F` for regions using imperial units, `°C` otherwise.
pub fn unit_suffix(region: Option<&str>) -> &'static str {
    match region {
        Some(r) if IMPERIAL_REGIONS.iter().any(|i| i.eq_ignore_ascii_case(r)) => "°F",
        _ => "°C",
    }
}

/// Units to request when none are configured.
pub fn default_units_for_region(region: Option<&str>) -> Units {
    if unit_suffix(region) == "°F" { Units::Imperial } else { Units::Metric }
}

/// Temperature suffix matching the units the record was fetched with.
pub fn temperature_suffix(units: Units) -> &'static str {
    match units {
        Units::Metric => "°C",
        Units::Imperial => "°F",
        Units::Standard => "K",
    }
}

fn speed_words(units: Units) -> &'static str {
    match units {
        Units::Imperial => "miles per hour",
        Units::Metric | Units::Standard => "metres per second",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherIcon {
    Sunny,
    Cloud,
    Rain,
    Storm,
    Snowflake,
}

impl WeatherIcon {
    pub fn from_code(code: &str) -> Option<Self> {
        let icon = match code {
            "01d" => WeatherIcon::Sunny,
            "02d" | "03d" | "04d" | "04n" | "01n" | "02n" | "03n" | "10n" => WeatherIcon::Cloud,
            "10d" | "11n" => WeatherIcon::Rain,
            "11d" => WeatherIcon::Storm,
            "13d" | "13n" => WeatherIcon::Snowflake,
            _ => return None,
        };
        Some(icon)
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            WeatherIcon::Sunny => "☀",
            WeatherIcon::Cloud => "☁",
            WeatherIcon::Rain => "🌧",
            WeatherIcon::Storm => "⛈",
            WeatherIcon::Snowflake => "❄",
        }
    }
}

/// Which of the sunrise/sunset indicators is highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunHighlight {
    Sunrise,
    Sunset,
}

impl SunHighlight {
    pub fn at(now: DateTime<Utc>, sunset: i64) -> Self {
        if now.timestamp() < sunset { SunHighlight::Sunrise } else { SunHighlight::Sunset }
    }
}

/// `HH:MM` of a Unix timestamp in the given offset; empty for out-of-range input.
pub fn clock_time(epoch_secs: i64, offset: FixedOffset) -> String {
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|t| t.with_timezone(&offset).format("%H:%M").to_string())
        .unwrap_or_default()
}

/// Everything a screen shows for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayModel {
    pub main: String,
    pub description: String,
    pub temperature: String,
    pub humidity: String,
    pub min: String,
    pub max: String,
    pub wind_speed: String,
    pub name: String,
    pub country: String,
    pub sunrise: String,
    pub sunset: String,
    pub icon: Option<WeatherIcon>,
}

impl DisplayModel {
    pub fn from_record(record: &WeatherRecord, units: Units, offset: FixedOffset) -> Self {
        let suffix = temperature_suffix(units);
        let (main, description, icon) = match record.primary_condition() {
            Some(c) => (c.main.clone(), c.description.clone(), WeatherIcon::from_code(&c.icon)),
            None => ("Unknown".to_string(), "Unknown".to_string(), None),
        };

        Self {
            main,
            description,
            temperature: format!("{}{suffix}", record.main.temp),
            humidity: format!("{} per cent", record.main.humidity),
            min: format!("{} min", record.main.temp_min),
            max: format!("{} max", record.main.temp_max),
            wind_speed: record.wind.speed.to_string(),
            name: record.name.clone(),
            country: record.sys.country.clone(),
            sunrise: clock_time(record.sys.sunrise, offset),
            sunset: clock_time(record.sys.sunset, offset),
            icon,
        }
    }
}

/// Sentences read aloud when a card is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenPhrases {
    pub condition: String,
    pub temperature: String,
    pub min_max: String,
    pub wind: String,
    pub sun: String,
}

impl SpokenPhrases {
    pub fn from_record(record: &WeatherRecord, units: Units, offset: FixedOffset) -> Self {
        let suffix = temperature_suffix(units);
        let description =
            record.primary_condition().map(|c| c.description.as_str()).unwrap_or("unknown");

        Self {
            condition: format!("The weather condition is {description}"),
            temperature: format!(
                "The weather temperature is {}{suffix} with humidity of {} per cent",
                record.main.temp, record.main.humidity
            ),
            min_max: format!(
                "The minimum temperature is {}{suffix} and the maximum is {}{suffix}",
                record.main.temp_min, record.main.temp_max
            ),
            wind: format!(
                "The current wind speed is {} {}",
                record.wind.speed,
                speed_words(units)
            ),
            sun: format!(
                "The sun rises at {} while the sun sets at {}",
                clock_time(record.sys.sunrise, offset),
                clock_time(record.sys.sunset, offset)
            ),
        }
    }

    pub fn all(&self) -> [&str; 5] {
        [&self.condition, &self.temperature, &self.min_max, &self.wind, &self.sun]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn london() -> WeatherRecord {
        serde_json::from_value(json!({
            "coord": { "lat": 51.5074, "lon": -0.1278 },
            "weather": [{ "description": "clear sky", "id": 800, "main": "Clear", "icon": "01d" }],
            "main": { "temp": 15.2, "humidity": 60, "temp_min": 14.0, "temp_max": 16.0 },
            "wind": { "speed": 3.1 },
            "sys": { "country": "GB", "sunrise": 1700000000, "sunset": 1700040000 },
            "name": "London"
        }))
        .expect("valid record")
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("zero offset")
    }

    #[test]
    fn region_parsing() {
        assert_eq!(region_from_locale("en_US").as_deref(), Some("US"));
        assert_eq!(region_from_locale("en-GB.UTF-8").as_deref(), Some("GB"));
        assert_eq!(region_from_locale("zh_Hant_TW").as_deref(), Some("TW"));
        assert_eq!(region_from_locale("my_MM@calendar").as_deref(), Some("MM"));
        assert_eq!(region_from_locale("LR").as_deref(), Some("LR"));
        assert_eq!(region_from_locale("C"), None);
        assert_eq!(region_from_locale("en"), None);
    }

    #[test]
    fn imperial_regions_get_fahrenheit() {
        for region in ["US", "LR", "MM", "us"] {
            assert_eq!(unit_suffix(Some(region)), "°F");
        }
        assert_eq!(unit_suffix(Some("GB")), "°C");
        assert_eq!(unit_suffix(None), "°C");

        assert_eq!(default_units_for_region(Some("US")), Units::Imperial);
        assert_eq!(default_units_for_region(Some("DE")), Units::Metric);
    }

    #[test]
    fn icon_codes() {
        assert_eq!(WeatherIcon::from_code("01d"), Some(WeatherIcon::Sunny));
        assert_eq!(WeatherIcon::from_code("01n"), Some(WeatherIcon::Cloud));
        assert_eq!(WeatherIcon::from_code("10d"), Some(WeatherIcon::Rain));
        assert_eq!(WeatherIcon::from_code("11d"), Some(WeatherIcon::Storm));
        assert_eq!(WeatherIcon::from_code("11n"), Some(WeatherIcon::Rain));
        assert_eq!(WeatherIcon::from_code("13n"), Some(WeatherIcon::Snowflake));
        assert_eq!(WeatherIcon::from_code("50d"), None);
    }

    #[test]
    fn sun_highlight_flips_at_sunset() {
        let before = DateTime::from_timestamp(1_700_039_999, 0).expect("ts");
        let after = DateTime::from_timestamp(1_700_040_000, 0).expect("ts");
        assert_eq!(SunHighlight::at(before, 1_700_040_000), SunHighlight::Sunrise);
        assert_eq!(SunHighlight::at(after, 1_700_040_000), SunHighlight::Sunset);
    }

    #[test]
    fn display_model_for_london() {
        let model = DisplayModel::from_record(&london(), Units::Metric, utc());

        assert_eq!(model.main, "Clear");
        assert_eq!(model.description, "clear sky");
        assert_eq!(model.temperature, "15.2°C");
        assert_eq!(model.humidity, "60 per cent");
        assert_eq!(model.min, "14 min");
        assert_eq!(model.max, "16 max");
        assert_eq!(model.wind_speed, "3.1");
        assert_eq!(model.country, "GB");
        assert_eq!(model.sunrise, "22:13");
        assert_eq!(model.sunset, "09:20");
        assert_eq!(model.icon, Some(WeatherIcon::Sunny));
    }

    #[test]
    fn spoken_phrases_follow_units() {
        let metric = SpokenPhrases::from_record(&london(), Units::Metric, utc());
        assert_eq!(metric.condition, "The weather condition is clear sky");
        assert_eq!(
            metric.temperature,
            "The weather temperature is 15.2°C with humidity of 60 per cent"
        );
        assert_eq!(metric.wind, "The current wind speed is 3.1 metres per second");
        assert_eq!(metric.sun, "The sun rises at 22:13 while the sun sets at 09:20");

        let imperial = SpokenPhrases::from_record(&london(), Units::Imperial, utc());
        assert_eq!(
            imperial.min_max,
            "The minimum temperature is 14°F and the maximum is 16°F"
        );
        assert!(imperial.wind.ends_with("miles per hour"));
    }
}
