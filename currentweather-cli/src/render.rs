use std::fmt::Write;

use chrono::{FixedOffset, Local, Utc};
use currentweather_core::{
    Units, WeatherRecord,
    presentation::{DisplayModel, SpokenPhrases, SunHighlight},
};

fn speed_unit(units: Units) -> &'static str {
    match units {
        Units::Imperial => "mph",
        Units::Metric | Units::Standard => "m/s",
    }
}

/// Multi-line summary of a record in the local time zone.
pub fn weather(record: &WeatherRecord, units: Units, speak: bool) -> String {
    format_weather(record, units, *Local::now().offset(), speak)
}

fn format_weather(record: &WeatherRecord, units: Units, offset: FixedOffset, speak: bool) -> String {
    let m = DisplayModel::from_record(record, units, offset);
    let icon = m.icon.map(|i| i.glyph()).unwrap_or(" ");
    let (rise_mark, set_mark) = match SunHighlight::at(Utc::now(), record.sys.sunset) {
        SunHighlight::Sunrise => ("*", " "),
        SunHighlight::Sunset => (" ", "*"),
    };

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{icon} {} / {}", m.main, m.description);
    let _ = match (m.name.is_empty(), m.country.is_empty()) {
        (true, _) => writeln!(out, "  {}", record.coord),
        (false, true) => writeln!(out, "  {}", m.name),
        (false, false) => writeln!(out, "  {}, {}", m.name, m.country),
    };
    let _ = writeln!(out, "  Temperature  {}  ({} / {})", m.temperature, m.min, m.max);
    let _ = writeln!(out, "  Humidity     {}", m.humidity);
    let _ = writeln!(out, "  Wind         {} {}", m.wind_speed, speed_unit(units));
    let _ = writeln!(out, " {rise_mark}Sunrise      {}", m.sunrise);
    let _ = writeln!(out, " {set_mark}Sunset       {}", m.sunset);

    if speak {
        let phrases = SpokenPhrases::from_record(record, units, offset);
        let _ = writeln!(out);
        for phrase in phrases.all() {
            let _ = writeln!(out, "  \"{phrase}\"");
        }
    }

    out
}
