//! Price quotes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ChargePointId, PoolId, PowerType, TariffId};

/// A price quote for charging at a station.
///
/// Keyed by (pool, power type, power level, tariff). Quotes are written
/// whole on every refresh — there is no partial update of individual fee
/// components — and a quote with an older `fetched_at` than what the store
/// already holds is discarded on write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub pool_id: PoolId,
    /// The charge point the quote was obtained for. Pricing is uniform
    /// across a pool's charge points of the same power type; we keep the
    /// concrete one for traceability.
    pub charge_point_id: ChargePointId,
    pub tariff_id: TariffId,
    pub power_type: PowerType,
    /// Power level the quote applies to, in kW.
    pub power_kw: u16,
    /// ISO 4217 currency code, e.g. `EUR`.
    pub currency: String,
    /// Energy price per kWh.
    pub energy_price: f64,
    /// Flat fee per charging session.
    pub session_fee: f64,
    /// Blocking fee per hour, charged after `blocking_after_mins`.
    pub blocking_fee: Option<f64>,
    /// Minutes of charging before the blocking fee starts.
    pub blocking_after_mins: Option<u32>,
    /// When the upstream quoted this price.
    pub fetched_at: DateTime<Utc>,
}
