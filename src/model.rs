//! Domain types shared across the pipeline stages.

use geo::Coord;
use serde::Serialize;

/// Transport mode, derived from the GTFS `route_type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Tram,
    Metro,
    Rail,
    Bus,
    Ferry,
    Unknown,
}

impl Mode {
    /// Maps a GTFS `route_type` code (basic or extended European set) to a
    /// mode. Unrecognized codes map to [`Mode::Unknown`], never fail.
    pub fn from_route_type(code: i32) -> Mode {
        match code {
            0 | 900 => Mode::Tram,
            1 | 400 | 401 => Mode::Metro,
            2 | 100 | 101 | 102 | 103 | 106 | 109 => Mode::Rail,
            3 | 700 | 702 | 704 => Mode::Bus,
            4 | 1000 => Mode::Ferry,
            _ => Mode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Tram => "tram",
            Mode::Metro => "metro",
            Mode::Rail => "rail",
            Mode::Bus => "bus",
            Mode::Ferry => "ferry",
            Mode::Unknown => "unknown",
        }
    }
}

/// A transit stop as parsed from one operator's feed. Identifier is raw
/// (per-operator); namespacing happens at merge time.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Stop {
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// One distinct geometric variant of a route's path, before simplification.
#[derive(Debug, Clone)]
pub struct ResolvedPattern {
    pub shape_id: String,
    /// Number of trips that ran over this shape; used for ranking.
    pub trip_count: usize,
    /// Ordered along the direction of travel, always >= 2 points.
    pub points: Vec<Coord<f64>>,
    /// Stop ids visited, ordered along the polyline. Empty when the feed
    /// carries no stop_times table.
    pub stop_ids: Vec<String>,
}

/// A route with its retained patterns, before geometry building.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub id: String,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    /// Raw GTFS route_type code, kept for unknown-code reporting.
    pub route_type: i32,
    pub mode: Mode,
    pub patterns: Vec<ResolvedPattern>,
}

impl ResolvedRoute {
    /// Display name: short name when present, long name otherwise.
    pub fn display_name(&self) -> &str {
        match (&self.short_name, &self.long_name) {
            (Some(s), _) if !s.is_empty() => s,
            (_, Some(l)) if !l.is_empty() => l,
            _ => &self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_route_types() {
        assert_eq!(Mode::from_route_type(0), Mode::Tram);
        assert_eq!(Mode::from_route_type(1), Mode::Metro);
        assert_eq!(Mode::from_route_type(2), Mode::Rail);
        assert_eq!(Mode::from_route_type(3), Mode::Bus);
        assert_eq!(Mode::from_route_type(4), Mode::Ferry);
    }

    #[test]
    fn test_extended_route_types_normalize() {
        assert_eq!(Mode::from_route_type(109), Mode::Rail);
        assert_eq!(Mode::from_route_type(401), Mode::Metro);
        assert_eq!(Mode::from_route_type(702), Mode::Bus);
        assert_eq!(Mode::from_route_type(900), Mode::Tram);
        assert_eq!(Mode::from_route_type(1000), Mode::Ferry);
    }

    #[test]
    fn test_unrecognized_route_type_is_unknown() {
        assert_eq!(Mode::from_route_type(7), Mode::Unknown);
        assert_eq!(Mode::from_route_type(715), Mode::Unknown);
        assert_eq!(Mode::from_route_type(-1), Mode::Unknown);
    }

    #[test]
    fn test_display_name_prefers_short_name() {
        let route = ResolvedRoute {
            id: "r1".to_string(),
            short_name: Some("12".to_string()),
            long_name: Some("Airport Express".to_string()),
            route_type: 3,
            mode: Mode::Bus,
            patterns: vec![],
        };
        assert_eq!(route.display_name(), "12");
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let route = ResolvedRoute {
            id: "r1".to_string(),
            short_name: Some(String::new()),
            long_name: None,
            route_type: 3,
            mode: Mode::Bus,
            patterns: vec![],
        };
        assert_eq!(route.display_name(), "r1");
    }
}
