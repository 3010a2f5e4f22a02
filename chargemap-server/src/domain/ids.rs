//! Upstream identifier types.
//!
//! The DCS network addresses everything by opaque strings
//! (e.g. `DE*DCS*P1234`, `DE:DCS:CHARGE_POINT:5678`). We never interpret
//! their structure, but we do reject values that could not have come from
//! the upstream: empty strings, embedded whitespace, or absurd lengths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on identifier length. Observed upstream IDs are well under
/// half of this.
const MAX_ID_LEN: usize = 128;

/// Error returned when parsing an invalid upstream identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {reason}")]
pub struct InvalidId {
    reason: &'static str,
}

fn validate(s: &str) -> Result<(), InvalidId> {
    if s.is_empty() {
        return Err(InvalidId {
            reason: "must not be empty",
        });
    }
    if s.len() > MAX_ID_LEN {
        return Err(InvalidId {
            reason: "too long",
        });
    }
    if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidId {
            reason: "must not contain whitespace or control characters",
        });
    }
    Ok(())
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier from a string.
            pub fn parse(s: impl Into<String>) -> Result<Self, InvalidId> {
                let s = s.into();
                validate(&s)?;
                Ok(Self(s))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(s: String) -> Result<Self, InvalidId> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_type! {
    /// Identifier of a pool: a physical location grouping one or more
    /// charge points.
    PoolId
}

id_type! {
    /// Identifier of a single charge point, the smallest addressable
    /// charging unit.
    ChargePointId
}

id_type! {
    /// Identifier of a tariff plan (e.g. `HYUNDAI_FLEX`) under which
    /// prices are quoted.
    TariffId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert!(PoolId::parse("DE*DCS*P1234").is_ok());
        assert!(ChargePointId::parse("DE:DCS:CHARGE_POINT:5678").is_ok());
        assert!(TariffId::parse("HYUNDAI_FLEX").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(PoolId::parse("").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(PoolId::parse("DE DCS").is_err());
        assert!(ChargePointId::parse("a\tb").is_err());
        assert!(TariffId::parse("FLEX\n").is_err());
    }

    #[test]
    fn reject_overlong() {
        let long = "x".repeat(200);
        assert!(PoolId::parse(long).is_err());
    }

    #[test]
    fn display_and_as_str_roundtrip() {
        let id = PoolId::parse("DE*DCS*P1").unwrap();
        assert_eq!(id.as_str(), "DE*DCS*P1");
        assert_eq!(id.to_string(), "DE*DCS*P1");
    }

    #[test]
    fn debug_names_the_type() {
        let id = TariffId::parse("HYUNDAI_SMART").unwrap();
        assert_eq!(format!("{:?}", id), "TariffId(HYUNDAI_SMART)");
    }
}
