//! Fix → connectivity gate → fetch → cache.
//!
//! Each fix starts its own fetch. Fetches run concurrently and cannot be
//! cancelled once issued. Which response ends up in the cache is governed by
//! [`OrderingPolicy`].

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    cache::{KeyValueStore, WeatherCache},
    connectivity::{ConnectivityProbe, is_network_available},
    error::{FailureClass, FetchError, StoreError},
    location::LocationUpdates,
    model::{Coordinates, Fix, Units, WeatherRecord, WeatherRequest},
    provider::WeatherProvider,
};

/// Which of several overlapping fetches may write the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Every successful response is written as it completes, so a slow
    /// response to an older fix can overwrite a newer one.
    #[default]
    LastCompletedWins,
    /// A response is written only if no response to a newer fix has been
    /// written already.
    LatestRequestWins,
}

/// Result of one fetch attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Fetched and cached.
    Success(Box<WeatherRecord>),
    /// No usable network; no request was issued.
    Offline,
    /// The server answered with a non-success status.
    ClientError {
        class: FailureClass,
        status: StatusCode,
        body: String,
    },
    /// No response was received.
    TransportError(reqwest::Error),
    /// A success status with a body that is not a weather record.
    InvalidResponse(serde_json::Error),
    /// Fetched, but a response to a newer fix was already cached.
    Superseded(Box<WeatherRecord>),
    /// Fetched, but the cache write failed.
    CacheWriteFailed {
        record: Box<WeatherRecord>,
        error: StoreError,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// The fetched record, whether or not it was cached.
    pub fn record(&self) -> Option<&WeatherRecord> {
        match self {
            FetchOutcome::Success(record)
            | FetchOutcome::Superseded(record)
            | FetchOutcome::CacheWriteFailed { record, .. } => Some(&**record),
            _ => None,
        }
    }
}

impl From<FetchError> for FetchOutcome {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Status { class, status, body } => {
                FetchOutcome::ClientError { class, status, body }
            }
            FetchError::Transport(cause) => FetchOutcome::TransportError(cause),
            FetchError::Parse(cause) => FetchOutcome::InvalidResponse(cause),
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(r) => write!(f, "updated: {}, {}", r.name, r.sys.country),
            FetchOutcome::Offline => f.write_str("no internet connection"),
            FetchOutcome::ClientError { class, status, .. } => {
                write!(f, "request failed: {status} ({class})")
            }
            FetchOutcome::TransportError(e) => write!(f, "could not reach weather service: {e}"),
            FetchOutcome::InvalidResponse(e) => write!(f, "unexpected response: {e}"),
            FetchOutcome::Superseded(r) => write!(f, "discarded stale response for {}", r.name),
            FetchOutcome::CacheWriteFailed { error, .. } => write!(f, "could not cache: {error}"),
        }
    }
}

/// One completed attempt from [`WeatherPipeline::run`].
#[derive(Debug)]
pub struct PipelineEvent {
    /// Issue order of the fetch, starting at 1.
    pub sequence: u64,
    pub fix: Fix,
    pub outcome: FetchOutcome,
}

pub struct WeatherPipeline<S> {
    probe: Arc<dyn ConnectivityProbe>,
    provider: Arc<dyn WeatherProvider>,
    cache: Arc<WeatherCache<S>>,
    units: Units,
    ordering: OrderingPolicy,
    issued: Arc<AtomicU64>,
    /// Sequence of the newest response written to the cache.
    committed: Arc<Mutex<u64>>,
}

impl<S> Clone for WeatherPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            provider: Arc::clone(&self.provider),
            cache: Arc::clone(&self.cache),
            units: self.units,
            ordering: self.ordering,
            issued: Arc::clone(&self.issued),
            committed: Arc::clone(&self.committed),
        }
    }
}

impl<S: KeyValueStore + 'static> WeatherPipeline<S> {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<WeatherCache<S>>,
        units: Units,
    ) -> Self {
        Self {
            probe,
            provider,
            cache,
            units,
            ordering: OrderingPolicy::default(),
            issued: Arc::new(AtomicU64::new(0)),
            committed: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn cache(&self) -> &WeatherCache<S> {
        &self.cache
    }

    /// One fetch for `coordinates`: the path behind a manual "try again".
    pub async fn refresh(&self, coordinates: Coordinates) -> FetchOutcome {
        let sequence = self.next_sequence();
        self.attempt(sequence, coordinates)
            .instrument(info_span!("refresh", sequence))
            .await
    }

    /// Start one fetch per delivered fix and report each completion.
    ///
    /// The returned stream closes once `updates` has ended and every fetch
    /// it started has completed. Dropping it does not cancel fetches.
    pub fn run(&self, mut updates: LocationUpdates) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(16);
        let pipeline = self.clone();

        tokio::spawn(async move {
            while let Some(fix) = updates.next().await {
                let sequence = pipeline.next_sequence();
                info!(
                    sequence,
                    latitude = fix.coordinates.latitude,
                    longitude = fix.coordinates.longitude,
                    "fix received"
                );

                let pipeline = pipeline.clone();
                let tx = tx.clone();
                tokio::spawn(
                    async move {
                        let outcome = pipeline.attempt(sequence, fix.coordinates).await;
                        if tx.send(PipelineEvent { sequence, fix, outcome }).await.is_err() {
                            debug!(sequence, "pipeline events dropped");
                        }
                    }
                    .instrument(info_span!("fetch", sequence)),
                );
            }
            debug!("location updates ended");
        });

        rx
    }

    fn next_sequence(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn attempt(&self, sequence: u64, coordinates: Coordinates) -> FetchOutcome {
        if !is_network_available(self.probe.as_ref()) {
            warn!("no internet connection; fetch skipped");
            return FetchOutcome::Offline;
        }

        let request = WeatherRequest { coordinates, units: self.units };
        match self.provider.get_weather(&request).await {
            Ok(record) => self.commit_blocking(sequence, record).await,
            Err(err) => err.into(),
        }
    }

    /// Runs [`Self::commit`] off the async workers; the store may do file I/O.
    async fn commit_blocking(&self, sequence: u64, record: WeatherRecord) -> FetchOutcome {
        let pipeline = self.clone();
        let kept = record.clone();
        match tokio::task::spawn_blocking(move || pipeline.commit(sequence, record)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "cache write task failed");
                FetchOutcome::CacheWriteFailed { record: Box::new(kept), error: e.into() }
            }
        }
    }

    fn commit(&self, sequence: u64, record: WeatherRecord) -> FetchOutcome {
        let record = Box::new(record);
        // Held across the write so the sequence check and the write are one step.
        let mut committed = self.committed.lock();

        if self.ordering == OrderingPolicy::LatestRequestWins && sequence < *committed {
            info!(sequence, newest = *committed, "discarding stale weather response");
            return FetchOutcome::Superseded(record);
        }

        match self.cache.save(&record, self.units) {
            Ok(()) => {
                *committed = (*committed).max(sequence);
                FetchOutcome::Success(record)
            }
            Err(error) => {
                error!(error = %error, "failed to cache weather record");
                FetchOutcome::CacheWriteFailed { record, error }
            }
        }
    }
}
