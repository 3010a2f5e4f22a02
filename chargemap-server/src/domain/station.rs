//! Station (pool) records.

use serde::Serialize;

use super::{ChargePointId, PoolId, PowerType, RegionKey};

/// A charging station: one pool of charge points at a physical location.
///
/// Created on first discovery during a region refresh and updated in place
/// afterwards; coordinates and counts rarely change. Stations are never
/// deleted during normal operation (the optional pruning pass is the only
/// exception).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub pool_id: PoolId,
    pub latitude: f64,
    pub longitude: f64,
    /// Technical charge point operator, when the upstream reports one.
    pub cpo_id: Option<String>,
    pub charge_point_count: u32,
    pub charge_points_ac: Vec<ChargePointId>,
    pub charge_points_dc: Vec<ChargePointId>,
}

impl Station {
    /// The refresh grid cell this station falls in.
    pub fn region_key(&self) -> RegionKey {
        RegionKey::containing(self.latitude, self.longitude)
    }

    /// All charge points of the station, AC first.
    pub fn charge_points(&self) -> impl Iterator<Item = (&ChargePointId, PowerType)> {
        self.charge_points_ac
            .iter()
            .map(|cp| (cp, PowerType::Ac))
            .chain(self.charge_points_dc.iter().map(|cp| (cp, PowerType::Dc)))
    }
}
