use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use currentweather_core::{
    Config, Coordinates, FetchOutcome, FileStore, KeyValueStore, LocationProvider,
    LocationRequest, StaticProbe, SysfsProbe, Units, WeatherCache, WeatherPipeline,
    connectivity::ConnectivityProbe,
    location::StaticLocationProvider,
    pipeline::OrderingPolicy,
    presentation::region_from_locale,
    provider::provider_from_config,
};
use inquire::{Password, Select, Text};
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "currentweather", version, about = "Current weather for your position")]
pub struct Cli {
    /// Increase log output (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key, units and region.
    Configure,

    /// Fetch weather once for a position and cache it.
    Fetch {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// metric, imperial or standard; defaults to the configured units.
        #[arg(long, value_parser = parse_units)]
        units: Option<Units>,

        /// Behave as if no network were available.
        #[arg(long)]
        offline: bool,
    },

    /// Feed a sequence of fixes through the pipeline, one fetch per fix.
    Watch {
        /// A position as LAT,LON; repeat for several fixes.
        #[arg(long = "fix", required = true, allow_hyphen_values = true)]
        fixes: Vec<Coordinates>,

        /// Delay between fixes.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Drop responses that complete after a response to a newer fix.
        #[arg(long)]
        guard: bool,

        #[arg(long, value_parser = parse_units)]
        units: Option<Units>,
    },

    /// Show the cached weather.
    Show {
        /// Also print the spoken phrases.
        #[arg(long)]
        speak: bool,
    },

    /// Forget the cached weather.
    Clear,
}

fn parse_units(s: &str) -> Result<Units, String> {
    Units::try_from(s).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Fetch { lat, lon, units, offline } => {
                let coordinates = Coordinates::new(lat, lon);
                if !coordinates.is_valid() {
                    return Err(anyhow!("Coordinates out of range: {coordinates}"));
                }
                fetch(coordinates, units, offline).await
            }
            Command::Watch { fixes, interval_ms, guard, units } => {
                watch(fixes, Duration::from_millis(interval_ms), guard, units).await
            }
            Command::Show { speak } => show(speak),
            Command::Clear => {
                open_cache()?.clear().context("Failed to clear cached weather")?;
                println!("Cached weather cleared.");
                Ok(())
            }
        }
    }
}

fn load_config() -> anyhow::Result<Config> {
    let mut cfg = Config::load()?;
    if cfg.region.is_none() {
        cfg.region = detect_region();
        debug!(region = ?cfg.region, "region taken from locale");
    }
    Ok(cfg)
}

/// Region from the usual locale variables, most specific first.
fn detect_region() -> Option<String> {
    ["LC_ALL", "LC_MEASUREMENT", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|locale| region_from_locale(&locale))
}

fn open_cache() -> anyhow::Result<WeatherCache<FileStore>> {
    Ok(WeatherCache::new(FileStore::new(Config::cache_file_path()?)))
}

fn build_pipeline(
    cfg: &Config,
    units: Units,
    offline: bool,
    ordering: OrderingPolicy,
) -> anyhow::Result<WeatherPipeline<FileStore>> {
    let provider = provider_from_config(cfg)?;
    let probe: Arc<dyn ConnectivityProbe> =
        if offline { Arc::new(StaticProbe::offline()) } else { Arc::new(SysfsProbe::default()) };

    Ok(WeatherPipeline::new(probe, Arc::from(provider), Arc::new(open_cache()?), units)
        .with_ordering(ordering))
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !key.trim().is_empty() {
        cfg.api_key = Some(key.trim().to_string());
    }

    let units = Select::new("Units:", Units::all().to_vec()).prompt()?;
    cfg.units = Some(units);

    let default_region = cfg.region.clone().or_else(detect_region).unwrap_or_default();
    let region = Text::new("Region (two-letter code, optional):")
        .with_default(&default_region)
        .prompt()?;
    cfg.region = match region.trim() {
        "" => None,
        r => Some(r.to_ascii_uppercase()),
    };

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn fetch(coordinates: Coordinates, units: Option<Units>, offline: bool) -> anyhow::Result<()> {
    let cfg = load_config()?;
    let units = units.unwrap_or_else(|| cfg.effective_units());
    let pipeline = build_pipeline(&cfg, units, offline, cfg.ordering)?;

    match pipeline.refresh(coordinates).await {
        FetchOutcome::Success(record) => {
            print!("{}", render::weather(&record, units, false));
            Ok(())
        }
        FetchOutcome::Offline => Err(anyhow!(
            "No internet connection.\nHint: check your connection and run the command again."
        )),
        other => Err(anyhow!("Weather update failed: {other}")),
    }
}

async fn watch(
    fixes: Vec<Coordinates>,
    interval: Duration,
    guard: bool,
    units: Option<Units>,
) -> anyhow::Result<()> {
    let cfg = load_config()?;
    let units = units.unwrap_or_else(|| cfg.effective_units());
    let ordering = if guard { OrderingPolicy::LatestRequestWins } else { cfg.ordering };
    let pipeline = build_pipeline(&cfg, units, false, ordering)?;

    let updates = StaticLocationProvider::new(fixes)
        .request_location_updates(LocationRequest { priority: cfg.priority, interval })?;

    let mut events = pipeline.run(updates);
    while let Some(event) = events.recv().await {
        println!("#{} {} -> {}", event.sequence, event.fix.coordinates, event.outcome);
    }

    match cached_summary(pipeline.cache(), units, false) {
        Some(summary) => print!("{summary}"),
        None => println!("No weather cached."),
    }
    Ok(())
}

fn show(speak: bool) -> anyhow::Result<()> {
    let cfg = load_config()?;
    match cached_summary(&open_cache()?, cfg.effective_units(), speak) {
        Some(summary) => print!("{summary}"),
        None => println!("No weather cached yet.\nHint: run `currentweather fetch --lat <LAT> --lon <LON>`."),
    }
    Ok(())
}

/// The cached record rendered in the units it was fetched in. `fallback`
/// applies to caches written before units were stored.
fn cached_summary<S: KeyValueStore>(
    cache: &WeatherCache<S>,
    fallback: Units,
    speak: bool,
) -> Option<String> {
    let record = cache.load()?;
    let units = cache.load_units().unwrap_or(fallback);
    Some(render::weather(&record, units, speak))
}
