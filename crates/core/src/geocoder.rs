use crate::config::GeocoderConfig;
use crate::error::GeocodeError;
use crate::metadata::{Coordinates, Place};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Coordinate to place-name lookup. `Ok(None)` means the service answered
/// but knows no place there.
pub trait ReverseGeocoder {
    fn reverse(&mut self, coordinates: Coordinates) -> Result<Option<Place>, GeocodeError>;
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    language: String,
    retry: RetryPolicy,
    throttle: Throttle,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("HTTPクライアントを初期化できませんでした")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                initial_backoff: Duration::from_millis(config.retry_backoff_ms),
            },
            throttle: Throttle::new(Duration::from_millis(config.min_interval_ms)),
        })
    }

    fn request(&mut self, coordinates: Coordinates) -> Result<Option<Place>, GeocodeError> {
        self.throttle.wait();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
                ("addressdetails", "1".to_string()),
                ("accept-language", self.language.clone()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(GeocodeError::Transient(status.to_string()));
        }
        if !status.is_success() {
            return Err(GeocodeError::Http(status.to_string()));
        }

        let body: ReverseResponse = response.json()?;
        Ok(body.into_place())
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&mut self, coordinates: Coordinates) -> Result<Option<Place>, GeocodeError> {
        let policy = self.retry;
        policy.run(|| self.request(coordinates))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    error: Option<String>,
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    village: Option<String>,
    hamlet: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    city_district: Option<String>,
    city: Option<String>,
    town: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    province: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

impl ReverseResponse {
    fn into_place(self) -> Option<Place> {
        if let Some(error) = self.error {
            debug!("ジオコーディング結果なし: {error}");
            return None;
        }
        let place = self.address?.into_place();
        (!place.is_empty()).then_some(place)
    }
}

impl Address {
    fn into_place(self) -> Place {
        Place {
            place: first_present([
                self.village,
                self.hamlet,
                self.suburb,
                self.neighbourhood,
                self.city_district,
            ]),
            city: first_present([self.city, self.town, self.municipality]),
            state: first_present([self.state, self.province, self.region]),
            country: first_present([self.country]),
        }
    }
}

fn first_present<const N: usize>(values: [Option<String>; N]) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-retryable error, or has
    /// used `max_retries` extra attempts. The backoff doubles per attempt.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, GeocodeError>,
    ) -> Result<T, GeocodeError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, "{err}、再試行します");
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Keeps consecutive requests at least `min_interval` apart.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Per-run memo of lookups. Borrowed coordinates are exact copies of the
/// donor's, so most heuristic hits are answered here.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<(i64, i64), Option<Place>>,
}

impl GeocodeCache {
    pub fn lookup(
        &mut self,
        geocoder: &mut dyn ReverseGeocoder,
        coordinates: Coordinates,
    ) -> Result<Option<Place>, GeocodeError> {
        let key = cache_key(coordinates);
        if let Some(hit) = self.entries.get(&key) {
            debug!(?key, "ジオコーディングキャッシュを使用します");
            return Ok(hit.clone());
        }
        let place = geocoder.reverse(coordinates)?;
        self.entries.insert(key, place.clone());
        Ok(place)
    }
}

fn cache_key(coordinates: Coordinates) -> (i64, i64) {
    (
        (coordinates.latitude * 1e5).round() as i64,
        (coordinates.longitude * 1e5).round() as i64,
    )
}
