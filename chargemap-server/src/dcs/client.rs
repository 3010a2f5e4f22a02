//! DCS map API HTTP client.
//!
//! Provides async methods for the cluster, status and price queries.
//! Routing quirk of the API: the two query endpoints share one URL and are
//! distinguished by a `rest-api-path` request header.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::{BoundingBox, ChargePointId, ChargePointState, Station, TariffId};

use super::error::DcsError;
use super::types::{
    ClusterQueryRequest, ClusterQueryResponse, PriceDto, PriceRequestDto, StatusQueryRequest,
    StatusQueryResponse,
};
use super::{PriceReading, PriceRequest, StationApi, StatusReading};

/// Default base URL of the production map API.
const DEFAULT_BASE_URL: &str = "https://chargemyhyundai.com/api/map/v1";

/// Default market code (path segment of every call).
const DEFAULT_MARKET: &str = "de";

/// Configuration for the DCS client.
#[derive(Debug, Clone)]
pub struct DcsConfig {
    /// Base URL of the map API.
    pub base_url: String,
    /// Market code, e.g. `de`.
    pub market: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl DcsConfig {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            market: DEFAULT_MARKET.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the market code.
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for DcsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// DCS map API client.
#[derive(Debug, Clone)]
pub struct DcsClient {
    http: reqwest::Client,
    base_url: String,
    market: String,
}

impl DcsClient {
    /// Create a new client with the given configuration.
    pub fn new(config: DcsConfig) -> Result<Self, DcsError> {
        // The API fronts a public web map and answers browser-shaped
        // clients; these are the headers its own front end sends.
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(
            "Origin",
            HeaderValue::from_static("https://chargemyhyundai.com"),
        );
        headers.insert(
            "Referer",
            HeaderValue::from_static("https://chargemyhyundai.com/web/de/hyundai-de/map"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            )
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            market: config.market,
        })
    }

    fn market_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.market, path)
    }

    /// POST a JSON body and decode the JSON response, triaging the status
    /// code into typed errors first.
    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        rest_api_path: Option<&'static str>,
        body: &B,
    ) -> Result<R, DcsError> {
        let mut request = self.http.post(url).json(body);
        if let Some(path) = rest_api_path {
            request = request.header("rest-api-path", path);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(DcsError::Throttled {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DcsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| DcsError::Decode {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }
}

#[async_trait]
impl StationApi for DcsClient {
    async fn query_region(&self, bbox: &BoundingBox) -> Result<Vec<Station>, DcsError> {
        let url = self.market_url("query");
        let request = ClusterQueryRequest::for_bbox(bbox);

        let response: ClusterQueryResponse =
            self.post_json(&url, Some("clusters"), &request).await?;

        let mut stations = Vec::new();
        for pool in response.pools.unwrap_or_default() {
            match pool.into_station() {
                Ok(station) => stations.push(station),
                Err(reason) => warn!(reason, "dropping malformed pool from cluster response"),
            }
        }
        Ok(stations)
    }

    async fn charge_point_status(
        &self,
        ids: &[ChargePointId],
    ) -> Result<Vec<StatusReading>, DcsError> {
        let url = self.market_url("query");
        let request = StatusQueryRequest::for_charge_points(ids);

        let response: StatusQueryResponse =
            self.post_json(&url, Some("charge-points"), &request).await?;

        let fetched_at = Utc::now();
        let mut readings = Vec::new();
        for item in response.responses.unwrap_or_default() {
            let Some(id) = item
                .dcs_charge_point_id
                .and_then(|s| ChargePointId::parse(s).ok())
            else {
                warn!("dropping status item without a charge point id");
                continue;
            };
            let state = item
                .operational_state_cp
                .as_deref()
                .map(ChargePointState::from_upstream)
                .unwrap_or(ChargePointState::Unknown);
            let observed_at = item
                .timestamp
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or(fetched_at);
            readings.push(StatusReading {
                charge_point_id: id,
                state,
                observed_at,
            });
        }
        Ok(readings)
    }

    async fn tariff_prices(
        &self,
        tariff: &TariffId,
        requests: &[PriceRequest],
    ) -> Result<Vec<PriceReading>, DcsError> {
        let url = self.market_url(&format!("tariffs/{}/prices", tariff));
        let body: Vec<PriceRequestDto> = requests
            .iter()
            .map(|r| PriceRequestDto {
                charge_point: r.charge_point_id.as_str().to_string(),
                power_type: r.power_type.as_str().to_string(),
                power: r.power_kw,
            })
            .collect();

        let response: Vec<PriceDto> = self.post_json(&url, None, &body).await?;

        let mut readings = Vec::new();
        for item in response {
            match item.into_reading() {
                Ok(reading) => readings.push(reading),
                Err(reason) => warn!(reason, %tariff, "dropping malformed price item"),
            }
        }
        Ok(readings)
    }
}
