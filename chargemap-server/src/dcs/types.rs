//! DCS map API wire types.
//!
//! These map directly to the JSON the map API speaks. Response types use
//! `Option` liberally: the API omits fields rather than sending null, and
//! its vocabulary is reverse-engineered, not documented. Conversion into
//! domain types drops malformed items individually instead of failing the
//! whole response.

use serde::{Deserialize, Serialize};

use crate::domain::{BoundingBox, ChargePointId, PoolId, PowerType, Station};

use super::PriceReading;

/// Query precision: 6..=10, higher unpacks clusters into more detail. We
/// always query at full detail since we want concrete pools.
const QUERY_PRECISION: u8 = 10;

// ---- cluster query ----

/// Body of the cluster query (`rest-api-path: clusters`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQueryRequest {
    pub search_criteria: SearchCriteria,
    pub with_charge_point_ids: bool,
    pub filter_criteria: FilterCriteria,
}

impl ClusterQueryRequest {
    pub fn for_bbox(bbox: &BoundingBox) -> Self {
        Self {
            search_criteria: SearchCriteria {
                latitude_nw: bbox.lat_nw(),
                longitude_nw: bbox.lng_nw(),
                latitude_se: bbox.lat_se(),
                longitude_se: bbox.lng_se(),
                precision: QUERY_PRECISION,
                unpack_solitude_cluster: true,
                unpack_clusters_with_single_pool: true,
            },
            with_charge_point_ids: true,
            filter_criteria: FilterCriteria::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(rename = "latitudeNW")]
    pub latitude_nw: f64,
    #[serde(rename = "longitudeNW")]
    pub longitude_nw: f64,
    #[serde(rename = "latitudeSE")]
    pub latitude_se: f64,
    #[serde(rename = "longitudeSE")]
    pub longitude_se: f64,
    pub precision: u8,
    pub unpack_solitude_cluster: bool,
    pub unpack_clusters_with_single_pool: bool,
}

/// Filter block the API requires even when nothing is filtered.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    pub authentication_methods: Vec<String>,
    pub cable_attached_types: Vec<String>,
    pub payment_methods: Vec<String>,
    pub plug_types: Vec<String>,
    pub pool_location_types: Vec<String>,
    pub value_added_services: Vec<String>,
    pub dcs_tcpo_ids: Vec<String>,
}

/// Response of the cluster query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQueryResponse {
    pub pools: Option<Vec<PoolDto>>,
    /// Aggregated clusters; empty at full precision with unpacking on.
    pub pool_clusters: Option<Vec<serde_json::Value>>,
}

/// A pool as returned by the cluster query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDto {
    /// Pool id; some endpoints call the same field `dcsPoolId`.
    pub id: Option<String>,
    pub dcs_pool_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub charge_point_count: Option<u32>,
    /// Technical charge point operator id.
    pub dcs_tcpo_id: Option<String>,
    pub charge_points: Option<Vec<ChargePointDto>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePointDto {
    pub id: Option<String>,
    pub power_type: Option<String>,
}

impl PoolDto {
    /// Convert into a domain station, or `None` (with the reason) when the
    /// pool is missing the essentials.
    pub fn into_station(self) -> Result<Station, &'static str> {
        let pool_id = self
            .id
            .or(self.dcs_pool_id)
            .ok_or("pool without an id")
            .and_then(|s| PoolId::parse(s).map_err(|_| "unparseable pool id"))?;
        let latitude = self.latitude.ok_or("pool without latitude")?;
        let longitude = self.longitude.ok_or("pool without longitude")?;

        let mut ac = Vec::new();
        let mut dc = Vec::new();
        for cp in self.charge_points.unwrap_or_default() {
            let Some(id) = cp.id.and_then(|s| ChargePointId::parse(s).ok()) else {
                continue;
            };
            // Connectors without a recognised power type are assumed AC,
            // matching how the front end classifies them.
            match cp.power_type.as_deref().and_then(PowerType::parse) {
                Some(PowerType::Dc) => dc.push(id),
                _ => ac.push(id),
            }
        }

        let charge_point_count = self
            .charge_point_count
            .unwrap_or((ac.len() + dc.len()) as u32);

        Ok(Station {
            pool_id,
            latitude,
            longitude,
            cpo_id: self.dcs_tcpo_id,
            charge_point_count,
            charge_points_ac: ac,
            charge_points_dc: dc,
        })
    }
}

// ---- dynamic status query ----

/// Body of the status query (`rest-api-path: charge-points`).
#[derive(Debug, Clone, Serialize)]
pub struct StatusQueryRequest {
    #[serde(rename = "DCSChargePointDynStatusRequest")]
    pub requests: Vec<StatusRequestItem>,
}

impl StatusQueryRequest {
    pub fn for_charge_points(ids: &[ChargePointId]) -> Self {
        Self {
            requests: ids
                .iter()
                .map(|id| StatusRequestItem {
                    dcs_charge_point_id: id.as_str().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequestItem {
    pub dcs_charge_point_id: String,
}

/// Response of the status query.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQueryResponse {
    #[serde(rename = "DCSChargePointDynStatusResponse")]
    pub responses: Option<Vec<StatusDto>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDto {
    pub dcs_charge_point_id: Option<String>,
    #[serde(rename = "OperationalStateCP")]
    pub operational_state_cp: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
}

// ---- price query ----

/// One entry of the price query body. The price endpoint speaks
/// snake_case, unlike the query endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PriceRequestDto {
    pub charge_point: String,
    pub power_type: String,
    pub power: u16,
}

/// One entry of the price query response.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceDto {
    pub currency: Option<String>,
    pub price_identifier: Option<PriceIdentifierDto>,
    pub elements: Option<Vec<PriceElementDto>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceIdentifierDto {
    pub charge_point: Option<String>,
    pub power_type: Option<String>,
    pub power: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceElementDto {
    pub price_components: Option<Vec<PriceComponentDto>>,
    pub restrictions: Option<RestrictionsDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceComponentDto {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestrictionsDto {
    /// Minimum duration in seconds before the element applies; the
    /// blocking-fee element uses this as its activation threshold.
    pub min_duration: Option<u32>,
}

impl PriceDto {
    /// Extract a price reading from the component breakdown.
    ///
    /// `ENERGY` is the per-kWh price, `FLAT` the session fee, and a `TIME`
    /// component is the blocking fee, activated after its element's
    /// `min_duration` (seconds, stored as whole minutes). A response with
    /// no `ENERGY` component carries no usable quote.
    pub fn into_reading(self) -> Result<PriceReading, &'static str> {
        let identifier = self.price_identifier.ok_or("price without identifier")?;
        let charge_point_id = identifier
            .charge_point
            .ok_or("price without charge point")
            .and_then(|s| ChargePointId::parse(s).map_err(|_| "unparseable charge point id"))?;
        let power_type = identifier
            .power_type
            .as_deref()
            .and_then(PowerType::parse)
            .ok_or("price without power type")?;
        let power_kw = identifier.power.unwrap_or(power_type.default_power_kw());

        let mut energy_price = None;
        let mut session_fee = None;
        let mut blocking_fee = None;
        let mut blocking_after_mins = None;

        for element in self.elements.unwrap_or_default() {
            let min_duration = element.restrictions.as_ref().and_then(|r| r.min_duration);
            for component in element.price_components.unwrap_or_default() {
                let Some(price) = component.price else {
                    continue;
                };
                match component.kind.as_deref() {
                    Some("ENERGY") => energy_price = Some(price),
                    Some("FLAT") => session_fee = Some(price),
                    Some("TIME") => {
                        blocking_fee = Some(price);
                        blocking_after_mins = min_duration.map(|secs| secs / 60);
                    }
                    _ => {}
                }
            }
        }

        Ok(PriceReading {
            charge_point_id,
            power_type,
            power_kw,
            currency: self.currency.unwrap_or_else(|| "EUR".to_string()),
            energy_price: energy_price.ok_or("price without ENERGY component")?,
            session_fee: session_fee.unwrap_or(0.0),
            blocking_fee,
            blocking_after_mins,
        })
    }
}
