//! Charge point availability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PoolId;

/// Operational state of a charge point, as reported by the upstream
/// dynamic status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargePointState {
    Available,
    Occupied,
    OutOfService,
    Unknown,
}

impl ChargePointState {
    /// Map an upstream `OperationalStateCP` string to a state.
    ///
    /// The upstream vocabulary is not documented; states we have not seen
    /// map to `Unknown` rather than failing the whole status batch.
    pub fn from_upstream(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "AVAILABLE" => ChargePointState::Available,
            "CHARGING" | "OCCUPIED" => ChargePointState::Occupied,
            "OUT_OF_SERVICE" | "INOPERATIVE" | "OFFLINE" => ChargePointState::OutOfService,
            _ => ChargePointState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargePointState::Available => "AVAILABLE",
            ChargePointState::Occupied => "OCCUPIED",
            ChargePointState::OutOfService => "OUT_OF_SERVICE",
            ChargePointState::Unknown => "UNKNOWN",
        }
    }

    /// Ordering used to aggregate per-charge-point states into one station
    /// state: the most useful-to-a-driver state wins.
    fn rank(&self) -> u8 {
        match self {
            ChargePointState::Available => 3,
            ChargePointState::Occupied => 2,
            ChargePointState::OutOfService => 1,
            ChargePointState::Unknown => 0,
        }
    }

    /// Aggregate the states of a station's charge points.
    ///
    /// A station with any available charge point is available; failing
    /// that, any occupied one makes it occupied, and so on. An empty input
    /// aggregates to `Unknown`.
    pub fn aggregate(states: impl IntoIterator<Item = ChargePointState>) -> Self {
        states
            .into_iter()
            .max_by_key(ChargePointState::rank)
            .unwrap_or(ChargePointState::Unknown)
    }
}

/// Latest observed availability of a station.
///
/// Overwritten on every refresh; no history is kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub pool_id: PoolId,
    pub state: ChargePointState,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_states_parse() {
        assert_eq!(
            ChargePointState::from_upstream("AVAILABLE"),
            ChargePointState::Available
        );
        assert_eq!(
            ChargePointState::from_upstream("CHARGING"),
            ChargePointState::Occupied
        );
        assert_eq!(
            ChargePointState::from_upstream("out_of_service"),
            ChargePointState::OutOfService
        );
    }

    #[test]
    fn unknown_states_are_lenient() {
        assert_eq!(
            ChargePointState::from_upstream("RESERVED"),
            ChargePointState::Unknown
        );
        assert_eq!(ChargePointState::from_upstream(""), ChargePointState::Unknown);
    }

    #[test]
    fn aggregate_prefers_available() {
        use ChargePointState::*;
        assert_eq!(Available, ChargePointState::aggregate([OutOfService, Available, Occupied]));
        assert_eq!(Occupied, ChargePointState::aggregate([OutOfService, Occupied]));
        assert_eq!(OutOfService, ChargePointState::aggregate([Unknown, OutOfService]));
        assert_eq!(Unknown, ChargePointState::aggregate([]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// No upstream string, however malformed, fails status parsing.
        #[test]
        fn from_upstream_is_total(s in ".*") {
            let _ = ChargePointState::from_upstream(&s);
        }
    }
}
