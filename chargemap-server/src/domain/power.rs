//! Charging power classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// AC or DC charging.
///
/// Every charge point connector is one or the other, and the upstream
/// prices the two separately. Serialized with the upstream's wire strings
/// (`"AC"` / `"DC"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerType {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
}

impl PowerType {
    /// Parse from the upstream wire string. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("AC") {
            Some(PowerType::Ac)
        } else if s.eq_ignore_ascii_case("DC") {
            Some(PowerType::Dc)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerType::Ac => "AC",
            PowerType::Dc => "DC",
        }
    }

    /// The power level (kW) prices are quoted at for this type.
    ///
    /// The upstream requires a concrete level in every price request; these
    /// are the levels the map front end always quotes at.
    pub fn default_power_kw(&self) -> u16 {
        match self {
            PowerType::Ac => 11,
            PowerType::Dc => 50,
        }
    }
}

impl fmt::Display for PowerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(PowerType::parse("AC"), Some(PowerType::Ac));
        assert_eq!(PowerType::parse("dc"), Some(PowerType::Dc));
        assert_eq!(PowerType::parse("Ac"), Some(PowerType::Ac));
        assert_eq!(PowerType::parse("HPC"), None);
        assert_eq!(PowerType::parse(""), None);
    }

    #[test]
    fn default_power_levels() {
        assert_eq!(PowerType::Ac.default_power_kw(), 11);
        assert_eq!(PowerType::Dc.default_power_kw(), 50);
    }

    #[test]
    fn serde_uses_wire_strings() {
        assert_eq!(serde_json::to_string(&PowerType::Ac).unwrap(), "\"AC\"");
        let dc: PowerType = serde_json::from_str("\"DC\"").unwrap();
        assert_eq!(dc, PowerType::Dc);
    }
}
