//! Geographic bounding boxes and refresh regions.
//!
//! The refresh scheduler does not track staleness per station: it divides
//! the world into fixed-size grid cells and keeps one refresh cursor per
//! cell. A cell is the unit of refresh — small enough that one cell's
//! stations fit in a handful of upstream batches, large enough that a map
//! viewport covers only a few cells.

use std::fmt;

/// Size of a refresh grid cell, in degrees of latitude/longitude.
pub const REGION_CELL_DEG: f64 = 0.5;

/// Error returned when constructing an invalid bounding box.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid bounding box: {reason}")]
pub struct InvalidBoundingBox {
    reason: &'static str,
}

/// Error returned when parsing an invalid region key string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid region key")]
pub struct InvalidRegionKey;

/// A geographic bounding box, addressed the way the upstream map API does:
/// by its north-west and south-east corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    lat_nw: f64,
    lng_nw: f64,
    lat_se: f64,
    lng_se: f64,
}

impl BoundingBox {
    /// Construct a bounding box from NW and SE corners.
    ///
    /// Latitudes must lie in ±90°, longitudes in ±180°, and the NW corner
    /// must be north of and west of the SE corner. Boxes crossing the
    /// antimeridian are not supported.
    pub fn new(lat_nw: f64, lng_nw: f64, lat_se: f64, lng_se: f64) -> Result<Self, InvalidBoundingBox> {
        for lat in [lat_nw, lat_se] {
            if !lat.is_finite() || lat.abs() > 90.0 {
                return Err(InvalidBoundingBox {
                    reason: "latitude out of range",
                });
            }
        }
        for lng in [lng_nw, lng_se] {
            if !lng.is_finite() || lng.abs() > 180.0 {
                return Err(InvalidBoundingBox {
                    reason: "longitude out of range",
                });
            }
        }
        if lat_nw < lat_se {
            return Err(InvalidBoundingBox {
                reason: "NW corner must be north of SE corner",
            });
        }
        if lng_nw > lng_se {
            return Err(InvalidBoundingBox {
                reason: "NW corner must be west of SE corner",
            });
        }
        Ok(Self {
            lat_nw,
            lng_nw,
            lat_se,
            lng_se,
        })
    }

    pub fn lat_nw(&self) -> f64 {
        self.lat_nw
    }

    pub fn lng_nw(&self) -> f64 {
        self.lng_nw
    }

    pub fn lat_se(&self) -> f64 {
        self.lat_se
    }

    pub fn lng_se(&self) -> f64 {
        self.lng_se
    }

    /// Whether a coordinate lies within the box (edges inclusive).
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat <= self.lat_nw && lat >= self.lat_se && lng >= self.lng_nw && lng <= self.lng_se
    }

    /// The grid cells this box intersects, row by row.
    pub fn cells(&self) -> Vec<RegionKey> {
        let lo = RegionKey::containing(self.lat_se, self.lng_nw);
        let hi = RegionKey::containing(self.lat_nw, self.lng_se);

        let mut cells = Vec::new();
        for lat_cell in lo.lat_cell..=hi.lat_cell {
            for lng_cell in lo.lng_cell..=hi.lng_cell {
                cells.push(RegionKey { lat_cell, lng_cell });
            }
        }
        cells
    }
}

/// Key of one refresh grid cell.
///
/// Cells are `REGION_CELL_DEG` × `REGION_CELL_DEG`, aligned to the origin,
/// and identified by their integer cell indices. The string form
/// (`"r<lat_cell>:<lng_cell>"`, e.g. `"r105:26"`) is what the store
/// persists in the refresh cursor table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    lat_cell: i32,
    lng_cell: i32,
}

impl RegionKey {
    /// The cell containing a coordinate.
    ///
    /// Coordinates exactly on a cell edge belong to the cell to their
    /// north-east, by floor division.
    pub fn containing(lat: f64, lng: f64) -> Self {
        Self {
            lat_cell: (lat / REGION_CELL_DEG).floor() as i32,
            lng_cell: (lng / REGION_CELL_DEG).floor() as i32,
        }
    }

    /// The bounding box covering exactly this cell.
    pub fn bbox(&self) -> BoundingBox {
        let lat_lo = self.lat_cell as f64 * REGION_CELL_DEG;
        let lng_lo = self.lng_cell as f64 * REGION_CELL_DEG;
        BoundingBox {
            lat_nw: lat_lo + REGION_CELL_DEG,
            lng_nw: lng_lo,
            lat_se: lat_lo,
            lng_se: lng_lo + REGION_CELL_DEG,
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Result<Self, InvalidRegionKey> {
        let rest = s.strip_prefix('r').ok_or(InvalidRegionKey)?;
        let (lat, lng) = rest.split_once(':').ok_or(InvalidRegionKey)?;
        Ok(Self {
            lat_cell: lat.parse().map_err(|_| InvalidRegionKey)?,
            lng_cell: lng.parse().map_err(|_| InvalidRegionKey)?,
        })
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}:{}", self.lat_cell, self.lng_cell)
    }
}

impl fmt::Debug for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionKey({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_validation() {
        assert!(BoundingBox::new(52.6, 13.3, 52.4, 13.5).is_ok());
        // NW south of SE
        assert!(BoundingBox::new(52.4, 13.3, 52.6, 13.5).is_err());
        // NW east of SE
        assert!(BoundingBox::new(52.6, 13.5, 52.4, 13.3).is_err());
        // out of range
        assert!(BoundingBox::new(91.0, 13.3, 52.4, 13.5).is_err());
        assert!(BoundingBox::new(52.6, -181.0, 52.4, 13.5).is_err());
        assert!(BoundingBox::new(f64::NAN, 13.3, 52.4, 13.5).is_err());
    }

    #[test]
    fn contains_is_edge_inclusive() {
        let bbox = BoundingBox::new(52.6, 13.3, 52.4, 13.5).unwrap();
        assert!(bbox.contains(52.5, 13.4));
        assert!(bbox.contains(52.6, 13.3));
        assert!(bbox.contains(52.4, 13.5));
        assert!(!bbox.contains(52.7, 13.4));
        assert!(!bbox.contains(52.5, 13.6));
    }

    #[test]
    fn key_string_roundtrip() {
        let key = RegionKey::containing(52.52, 13.41);
        let parsed = RegionKey::parse(&key.to_string()).unwrap();
        assert_eq!(key, parsed);

        let negative = RegionKey::containing(-33.87, -70.65);
        assert_eq!(RegionKey::parse(&negative.to_string()).unwrap(), negative);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RegionKey::parse("").is_err());
        assert!(RegionKey::parse("105:26").is_err());
        assert!(RegionKey::parse("r105").is_err());
        assert!(RegionKey::parse("rx:y").is_err());
    }

    #[test]
    fn berlin_cell() {
        // Berlin Alexanderplatz: 52.52 N, 13.41 E. 52.52 / 0.5 = 105.04,
        // 13.41 / 0.5 = 26.82.
        let key = RegionKey::containing(52.52, 13.41);
        assert_eq!(key.to_string(), "r105:26");
    }

    #[test]
    fn bbox_cells_covers_corners() {
        let bbox = BoundingBox::new(52.9, 13.1, 52.1, 13.9).unwrap();
        let cells = bbox.cells();
        assert!(cells.contains(&RegionKey::containing(52.9, 13.1)));
        assert!(cells.contains(&RegionKey::containing(52.1, 13.9)));
        assert!(cells.contains(&RegionKey::containing(52.5, 13.5)));
    }

    #[test]
    fn single_point_bbox_is_one_cell() {
        let bbox = BoundingBox::new(52.52, 13.41, 52.52, 13.41).unwrap();
        assert_eq!(bbox.cells(), vec![RegionKey::containing(52.52, 13.41)]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every coordinate maps to exactly one cell, and that cell's bbox
        /// contains the coordinate.
        #[test]
        fn cell_bbox_contains_coordinate(
            lat in -89.0f64..89.0,
            lng in -179.0f64..179.0,
        ) {
            let key = RegionKey::containing(lat, lng);
            prop_assert!(key.bbox().contains(lat, lng));
        }

        /// The string form roundtrips through parse.
        #[test]
        fn key_roundtrip(lat in -89.0f64..89.0, lng in -179.0f64..179.0) {
            let key = RegionKey::containing(lat, lng);
            prop_assert_eq!(RegionKey::parse(&key.to_string()).unwrap(), key);
        }

        /// Cells of a bbox contain the cell of any point inside it.
        #[test]
        fn cells_cover_interior_points(
            lat_a in -60.0f64..60.0,
            lng_a in -120.0f64..120.0,
            dlat in 0.0f64..2.0,
            dlng in 0.0f64..2.0,
            t in 0.0f64..1.0,
            u in 0.0f64..1.0,
        ) {
            let bbox = BoundingBox::new(lat_a + dlat, lng_a, lat_a, lng_a + dlng).unwrap();
            let lat = lat_a + dlat * t;
            let lng = lng_a + dlng * u;
            let cells = bbox.cells();
            prop_assert!(cells.contains(&RegionKey::containing(lat, lng)));
        }
    }
}
