//! Entity Merger: combines per-operator outputs into one global dataset.
//!
//! Identifiers are namespaced with the operator code. Stops from different
//! operators are never merged, even at identical coordinates: feeds carry no
//! reliable cross-operator stop-equivalence key, so each operator's stop
//! stays a distinct entity.

use std::collections::{BTreeMap, BTreeSet};

use geo::LineString;
use tracing::warn;

use crate::geometry::BuiltRoute;
use crate::model::{Mode, Stop};

/// Everything one operator's chain produced, before namespacing.
#[derive(Debug)]
pub struct OperatorBuild {
    pub operator: String,
    pub stops: BTreeMap<String, Stop>,
    pub routes: Vec<BuiltRoute>,
}

#[derive(Debug, Clone)]
pub struct MergedPattern {
    pub geometry_id: String,
    pub line: LineString<f64>,
    /// Namespaced stop ids, ordered along the polyline.
    pub stop_ids: Vec<String>,
    pub trip_count: usize,
}

#[derive(Debug, Clone)]
pub struct MergedRoute {
    pub id: String,
    pub operator: String,
    pub name: String,
    pub mode: Mode,
    pub patterns: Vec<MergedPattern>,
    /// Union of pattern stop lists, in order of first appearance.
    pub stop_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergedStop {
    pub id: String,
    pub operator: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub route_ids: BTreeSet<String>,
    pub modes: BTreeSet<Mode>,
}

/// The unified dataset handed to the emitter.
#[derive(Debug, Default)]
pub struct Dataset {
    /// Keyed by namespaced stop id; only stops served by an emitted route.
    pub stops: BTreeMap<String, MergedStop>,
    /// Sorted by namespaced route id.
    pub routes: Vec<MergedRoute>,
}

fn namespaced(operator: &str, id: &str) -> String {
    format!("{operator}:{id}")
}

/// Merges all operator builds. Unrecognized route_type codes are re-checked
/// here and reported once per distinct code across the whole run.
pub fn merge(mut builds: Vec<OperatorBuild>) -> Dataset {
    builds.sort_by(|a, b| a.operator.cmp(&b.operator));

    let mut dataset = Dataset::default();
    let mut unknown_codes: BTreeMap<i32, usize> = BTreeMap::new();

    for build in builds {
        for route in build.routes {
            if route.mode == Mode::Unknown {
                *unknown_codes.entry(route.route_type).or_default() += 1;
            }

            let route_id = namespaced(&build.operator, &route.id);
            let mut route_stop_ids = Vec::new();
            let mut seen = BTreeSet::new();

            let patterns: Vec<MergedPattern> = route
                .patterns
                .into_iter()
                .map(|pattern| {
                    let stop_ids: Vec<String> = pattern
                        .stop_ids
                        .iter()
                        .map(|raw| namespaced(&build.operator, raw))
                        .collect();
                    for (raw, id) in pattern.stop_ids.iter().zip(&stop_ids) {
                        if seen.insert(id.clone()) {
                            route_stop_ids.push(id.clone());
                        }
                        if let Some(stop) = build.stops.get(raw) {
                            let entry = dataset.stops.entry(id.clone()).or_insert_with(|| {
                                MergedStop {
                                    id: id.clone(),
                                    operator: build.operator.clone(),
                                    name: stop.name.clone(),
                                    lat: stop.lat,
                                    lon: stop.lon,
                                    route_ids: BTreeSet::new(),
                                    modes: BTreeSet::new(),
                                }
                            });
                            entry.route_ids.insert(route_id.clone());
                            entry.modes.insert(route.mode);
                        }
                    }
                    MergedPattern {
                        geometry_id: pattern.geometry_id,
                        line: pattern.line,
                        stop_ids,
                        trip_count: pattern.trip_count,
                    }
                })
                .collect();

            dataset.routes.push(MergedRoute {
                id: route_id,
                operator: build.operator.clone(),
                name: route.name,
                mode: route.mode,
                patterns,
                stop_ids: route_stop_ids,
            });
        }
    }

    dataset.routes.sort_by(|a, b| a.id.cmp(&b.id));

    for (code, route_count) in unknown_codes {
        warn!(
            code,
            route_count, "Unrecognized route_type code mapped to unknown mode"
        );
    }

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BuiltPattern;

    fn stop(id: &str, name: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lon,
        }
    }

    fn pattern(geometry_id: &str, stop_ids: &[&str]) -> BuiltPattern {
        BuiltPattern {
            geometry_id: geometry_id.to_string(),
            line: LineString::from(vec![
                geo::Coord { x: 4.35, y: 50.84 },
                geo::Coord { x: 4.36, y: 50.85 },
            ]),
            stop_ids: stop_ids.iter().map(|s| s.to_string()).collect(),
            trip_count: 1,
        }
    }

    fn build(operator: &str, stops: &[Stop], routes: Vec<BuiltRoute>) -> OperatorBuild {
        OperatorBuild {
            operator: operator.to_string(),
            stops: stops.iter().map(|s| (s.id.clone(), s.clone())).collect(),
            routes,
        }
    }

    fn bus_route(id: &str, patterns: Vec<BuiltPattern>) -> BuiltRoute {
        BuiltRoute {
            id: id.to_string(),
            name: id.to_string(),
            mode: Mode::Bus,
            route_type: 3,
            patterns,
        }
    }

    #[test]
    fn test_same_stop_from_two_operators_stays_distinct() {
        let central = stop("s1", "Central Station", 50.845, 4.357);
        let a = build(
            "stib",
            &[central.clone()],
            vec![bus_route("r1", vec![pattern("stib:g0", &["s1"])])],
        );
        let b = build(
            "delijn",
            &[central],
            vec![bus_route("r9", vec![pattern("delijn:g0", &["s1"])])],
        );

        let dataset = merge(vec![a, b]);

        assert_eq!(dataset.stops.len(), 2);
        assert!(dataset.stops.contains_key("stib:s1"));
        assert!(dataset.stops.contains_key("delijn:s1"));
    }

    #[test]
    fn test_stop_not_served_by_any_route_is_dropped() {
        let a = build(
            "stib",
            &[
                stop("s1", "Used", 50.845, 4.357),
                stop("s2", "Unused", 50.850, 4.360),
            ],
            vec![bus_route("r1", vec![pattern("stib:g0", &["s1"])])],
        );

        let dataset = merge(vec![a]);

        assert_eq!(dataset.stops.len(), 1);
        assert!(dataset.stops.contains_key("stib:s1"));
    }

    #[test]
    fn test_route_stop_union_preserves_first_appearance_order() {
        let stops = [
            stop("s1", "A", 50.84, 4.35),
            stop("s2", "B", 50.85, 4.36),
            stop("s3", "C", 50.86, 4.37),
        ];
        let a = build(
            "stib",
            &stops,
            vec![bus_route(
                "r1",
                vec![
                    pattern("stib:g0", &["s1", "s2"]),
                    pattern("stib:g1", &["s2", "s3"]),
                ],
            )],
        );

        let dataset = merge(vec![a]);

        assert_eq!(
            dataset.routes[0].stop_ids,
            vec!["stib:s1", "stib:s2", "stib:s3"]
        );
    }

    #[test]
    fn test_routes_sorted_by_namespaced_id() {
        let a = build(
            "zz",
            &[stop("s1", "A", 50.84, 4.35)],
            vec![bus_route("r1", vec![pattern("zz:g0", &["s1"])])],
        );
        let b = build(
            "aa",
            &[stop("s1", "A", 50.84, 4.35)],
            vec![bus_route("r1", vec![pattern("aa:g0", &["s1"])])],
        );

        let dataset = merge(vec![a, b]);

        let ids: Vec<&str> = dataset.routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aa:r1", "zz:r1"]);
    }

    #[test]
    fn test_stop_collects_serving_routes_and_modes() {
        let mut tram = bus_route("r2", vec![pattern("stib:g1", &["s1"])]);
        tram.mode = Mode::Tram;
        let a = build(
            "stib",
            &[stop("s1", "A", 50.84, 4.35)],
            vec![bus_route("r1", vec![pattern("stib:g0", &["s1"])]), tram],
        );

        let dataset = merge(vec![a]);

        let merged = &dataset.stops["stib:s1"];
        assert!(merged.route_ids.contains("stib:r1"));
        assert!(merged.route_ids.contains("stib:r2"));
        assert_eq!(merged.modes.len(), 2);
    }
}
