use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{config::GeocodingConfig, error::DependencyError};

const GEOCODE_PATH: &str = "/maps/api/geocode/json";
const TEXT_SEARCH_PATH: &str = "/maps/api/place/textsearch/json";
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// True iff the address resolves to at least one result.
    async fn validate_location(&self, location: &str) -> Result<bool, DependencyError>;
    async fn search_places(&self, query: &str) -> Result<Vec<Place>, DependencyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: Option<String>,
    pub formatted_address: String,
    pub place_id: String,
    pub location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    results: Vec<ApiResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    place_id: String,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

impl From<ApiResult> for Place {
    fn from(r: ApiResult) -> Self {
        Self {
            name: r.name,
            formatted_address: r.formatted_address,
            place_id: r.place_id,
            location: r.geometry.map(|g| g.location),
        }
    }
}

enum Failure {
    Timeout,
    Retryable(String),
    Fatal(String),
}

/// Google Geocoding / Places Text Search over HTTP.
pub struct GoogleMapsClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    max_retries: u32,
    backoff: Duration,
}

impl GoogleMapsClient {
    pub fn new(cfg: &GeocodingConfig) -> anyhow::Result<Self> {
        Self::from_parts(
            &cfg.base_url,
            SecretString::new(cfg.api_key.clone()),
            Duration::from_secs(cfg.timeout_secs),
            cfg.max_retries,
        )
    }

    pub fn from_parts(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build geocoding http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Exponential delay before retry number `attempt + 1`, plus up to half a step of jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(1 << attempt.min(6));
        let half_step = self.backoff.as_millis() as u64 / 2;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=half_step))
    }

    async fn attempt(&self, url: &str, param: &str, value: &str) -> Result<Vec<ApiResult>, Failure> {
        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                Failure::Timeout
            } else {
                Failure::Retryable(e.without_url().to_string())
            }
        };

        let resp = self
            .http
            .get(url)
            .query(&[(param, value), ("key", self.api_key.expose_secret().as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(Failure::Retryable(format!("upstream returned {status}")));
        }
        if !status.is_success() {
            return Err(Failure::Fatal(format!("upstream returned {status}")));
        }

        let body: ApiResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                Failure::Timeout
            } else {
                Failure::Fatal(format!("undecodable response: {}", e.without_url()))
            }
        })?;

        match body.status.as_str() {
            "OK" => Ok(body.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            "UNKNOWN_ERROR" => Err(Failure::Retryable("UNKNOWN_ERROR".into())),
            other => Err(Failure::Fatal(match body.error_message {
                Some(msg) => format!("{other}: {msg}"),
                None => other.to_string(),
            })),
        }
    }

    async fn call(
        &self,
        path: &str,
        param: &str,
        value: &str,
    ) -> Result<Vec<ApiResult>, DependencyError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            let reason = match self.attempt(&url, param, value).await {
                Ok(results) => {
                    debug!(path, results = results.len(), "geocoding call ok");
                    return Ok(results);
                }
                Err(Failure::Fatal(reason)) => {
                    warn!(path, reason = %reason, "geocoding call rejected");
                    return Err(DependencyError::Geocoding(reason));
                }
                Err(Failure::Timeout) => None,
                Err(Failure::Retryable(reason)) => Some(reason),
            };

            if attempt >= self.max_retries {
                warn!(path, attempts = attempt + 1, "geocoding call gave up");
                return Err(match reason {
                    None => DependencyError::Timeout("geocoding"),
                    Some(reason) => DependencyError::Geocoding(reason),
                });
            }

            let delay = self.delay_for(attempt);
            warn!(
                path,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                reason = reason.as_deref().unwrap_or("timeout"),
                "geocoding call failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn validate_location(&self, location: &str) -> Result<bool, DependencyError> {
        let results = self.call(GEOCODE_PATH, "address", location).await?;
        Ok(!results.is_empty())
    }

    #[instrument(skip(self))]
    async fn search_places(&self, query: &str) -> Result<Vec<Place>, DependencyError> {
        let results = self.call(TEXT_SEARCH_PATH, "query", query).await?;
        Ok(results.into_iter().map(Place::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn client(server: &MockServer, timeout: Duration, retries: u32) -> GoogleMapsClient {
        GoogleMapsClient::from_parts(
            &server.uri(),
            SecretString::new("test-key".to_string()),
            timeout,
            retries,
        )
        .unwrap()
        .with_backoff(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn validate_location_true_when_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GEOCODE_PATH))
            .and(query_param("address", "1600 Amphitheatre Pkwy"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [{
                    "formatted_address": "1600 Amphitheatre Pkwy, Mountain View, CA",
                    "place_id": "abc",
                    "geometry": {"location": {"lat": 37.42, "lng": -122.08}}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ok = client(&server, Duration::from_secs(2), 0)
            .validate_location("1600 Amphitheatre Pkwy")
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn zero_results_is_invalid_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GEOCODE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ZERO_RESULTS", "results": []})),
            )
            .mount(&server)
            .await;

        let ok = client(&server, Duration::from_secs(2), 0)
            .validate_location("Nowhere, Fakeland, 99999")
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEXT_SEARCH_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(TEXT_SEARCH_PATH))
            .and(query_param("query", "hotels in lisbon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "OK",
                "results": [{
                    "name": "Hotel Avenida",
                    "formatted_address": "Av. da Liberdade, Lisboa",
                    "place_id": "p1",
                    "geometry": {"location": {"lat": 38.72, "lng": -9.14}}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let places = client(&server, Duration::from_secs(2), 2)
            .search_places("hotels in lisbon")
            .await
            .unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name.as_deref(), Some("Hotel Avenida"));
        assert_eq!(places[0].location, Some(LatLng { lat: 38.72, lng: -9.14 }));
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(2), 2)
            .validate_location("anywhere")
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Geocoding(_)));
    }

    #[tokio::test]
    async fn denied_requests_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_secs(2), 3)
            .validate_location("anywhere")
            .await
            .unwrap_err();
        match err {
            DependencyError::Geocoding(msg) => {
                assert!(msg.starts_with("REQUEST_DENIED"));
                assert!(!msg.contains("test-key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "OK", "results": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = client(&server, Duration::from_millis(50), 1)
            .validate_location("anywhere")
            .await
            .unwrap_err();
        assert!(matches!(err, DependencyError::Timeout("geocoding")));
    }
}
