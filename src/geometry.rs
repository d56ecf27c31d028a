//! Geometry Builder: simplifies pattern polylines and deduplicates shared
//! corridors within an operator.
//!
//! Deduplication works on quantized coordinate fingerprints: two patterns
//! whose points land on the same tolerance grid share one serialized
//! geometry, and the later one only carries a reference to it.

use std::collections::BTreeMap;

use geo::{Coord, LineString, Simplify};

use crate::config::PipelineOptions;
use crate::model::{Mode, ResolvedRoute};
use crate::summary::OperatorSummary;

/// A pattern with final geometry. Patterns sharing a corridor share a
/// `geometry_id`; the emitter serializes each geometry id once per partition
/// and emits references for the rest.
#[derive(Debug, Clone)]
pub struct BuiltPattern {
    pub geometry_id: String,
    pub line: LineString<f64>,
    pub stop_ids: Vec<String>,
    pub trip_count: usize,
}

/// A route ready for merging, all geometry built.
#[derive(Debug, Clone)]
pub struct BuiltRoute {
    pub id: String,
    pub name: String,
    pub mode: Mode,
    pub route_type: i32,
    pub patterns: Vec<BuiltPattern>,
}

/// Per-operator registry of already-built geometries, keyed by quantized
/// coordinate fingerprint.
pub struct GeometryRegistry {
    operator: String,
    grid: f64,
    entries: BTreeMap<Vec<(i64, i64)>, String>,
    next: usize,
}

impl GeometryRegistry {
    pub fn new(operator: &str, epsilon: f64) -> Self {
        GeometryRegistry {
            operator: operator.to_string(),
            // Matching tolerance follows the simplification tolerance, with
            // a floor so an epsilon of zero still compares exact coordinates.
            grid: epsilon.max(1e-9),
            entries: BTreeMap::new(),
            next: 0,
        }
    }

    fn fingerprint(&self, line: &LineString<f64>) -> Vec<(i64, i64)> {
        line.coords()
            .map(|c| {
                (
                    (c.x / self.grid).round() as i64,
                    (c.y / self.grid).round() as i64,
                )
            })
            .collect()
    }

    /// Registers a geometry, returning its id and whether this call was the
    /// first use. Ids are assigned in registration order, so they are
    /// deterministic for a deterministic input ordering.
    pub fn register(&mut self, line: &LineString<f64>) -> (String, bool) {
        let key = self.fingerprint(line);
        if let Some(id) = self.entries.get(&key) {
            return (id.clone(), false);
        }
        let id = format!("{}:g{}", self.operator, self.next);
        self.next += 1;
        self.entries.insert(key, id.clone());
        (id, true)
    }
}

/// Ramer-Douglas-Peucker simplification. Endpoints always survive and the
/// result never drops below 2 points.
pub fn simplify_points(points: &[Coord<f64>], epsilon: f64) -> LineString<f64> {
    let line = LineString::from(points.to_vec());
    if points.len() <= 2 || epsilon <= 0.0 {
        return line;
    }
    line.simplify(&epsilon)
}

/// Builds final geometry for every pattern of every resolved route.
pub fn build_geometry(
    operator: &str,
    routes: Vec<ResolvedRoute>,
    options: &PipelineOptions,
    summary: &mut OperatorSummary,
) -> Vec<BuiltRoute> {
    let mut registry = GeometryRegistry::new(operator, options.simplify_epsilon_degrees);
    routes
        .into_iter()
        .map(|route| {
            let name = route.display_name().to_string();
            let patterns = route
                .patterns
                .into_iter()
                .map(|pattern| {
                    let line = simplify_points(&pattern.points, options.simplify_epsilon_degrees);
                    let (geometry_id, first_use) = registry.register(&line);
                    summary.patterns_emitted += 1;
                    if !first_use {
                        summary.patterns_deduplicated += 1;
                    }
                    BuiltPattern {
                        geometry_id,
                        line,
                        stop_ids: pattern.stop_ids,
                        trip_count: pattern.trip_count,
                    }
                })
                .collect();
            BuiltRoute {
                id: route.id,
                name,
                mode: route.mode,
                route_type: route.route_type,
                patterns,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coord(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    #[test]
    fn test_simplify_preserves_endpoints() {
        let points = vec![
            coord(0.0, 0.0),
            coord(0.5, 0.0001),
            coord(1.0, 0.3),
            coord(2.0, 0.0),
        ];
        let line = simplify_points(&points, 0.001);

        let first = line.coords().next().unwrap();
        let last = line.coords().last().unwrap();
        assert_relative_eq!(first.x, 0.0);
        assert_relative_eq!(first.y, 0.0);
        assert_relative_eq!(last.x, 2.0);
        assert_relative_eq!(last.y, 0.0);
    }

    #[test]
    fn test_simplify_drops_near_collinear_points() {
        let points = vec![
            coord(0.0, 0.0),
            coord(1.0, 0.000001),
            coord(2.0, 0.0),
        ];
        let line = simplify_points(&points, 0.001);
        assert_eq!(line.coords().count(), 2);
    }

    #[test]
    fn test_simplify_never_below_two_points() {
        let points = vec![coord(0.0, 0.0), coord(0.0, 0.0)];
        // Identical endpoints and a huge tolerance still yield 2 points.
        let line = simplify_points(&points, 10.0);
        assert_eq!(line.coords().count(), 2);
    }

    #[test]
    fn test_simplify_zero_epsilon_keeps_everything() {
        let points = vec![coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0)];
        let line = simplify_points(&points, 0.0);
        assert_eq!(line.coords().count(), 3);
    }

    #[test]
    fn test_registry_deduplicates_identical_lines() {
        let mut registry = GeometryRegistry::new("stib", 1e-5);
        let line = LineString::from(vec![coord(4.35, 50.84), coord(4.36, 50.85)]);

        let (id_a, first_a) = registry.register(&line);
        let (id_b, first_b) = registry.register(&line);

        assert_eq!(id_a, "stib:g0");
        assert!(first_a);
        assert_eq!(id_b, id_a);
        assert!(!first_b);
    }

    #[test]
    fn test_registry_matches_within_tolerance_grid() {
        let mut registry = GeometryRegistry::new("stib", 1e-5);
        let line = LineString::from(vec![coord(4.35, 50.84), coord(4.36, 50.85)]);
        let nudged = LineString::from(vec![
            coord(4.350000001, 50.84),
            coord(4.36, 50.850000001),
        ]);

        let (id_a, _) = registry.register(&line);
        let (id_b, first_b) = registry.register(&nudged);

        assert_eq!(id_a, id_b);
        assert!(!first_b);
    }

    #[test]
    fn test_registry_distinguishes_different_lines() {
        let mut registry = GeometryRegistry::new("stib", 1e-5);
        let a = LineString::from(vec![coord(4.35, 50.84), coord(4.36, 50.85)]);
        let b = LineString::from(vec![coord(4.35, 50.84), coord(4.40, 50.90)]);

        let (id_a, _) = registry.register(&a);
        let (id_b, first_b) = registry.register(&b);

        assert_ne!(id_a, id_b);
        assert!(first_b);
        assert_eq!(id_b, "stib:g1");
    }

    #[test]
    fn test_build_geometry_shares_corridor_across_routes() {
        use crate::model::ResolvedPattern;

        let corridor = vec![coord(4.35, 50.84), coord(4.36, 50.85)];
        let mk_route = |id: &str| ResolvedRoute {
            id: id.to_string(),
            short_name: Some(id.to_string()),
            long_name: None,
            route_type: 3,
            mode: Mode::Bus,
            patterns: vec![ResolvedPattern {
                shape_id: format!("shp_{id}"),
                trip_count: 1,
                points: corridor.clone(),
                stop_ids: vec![],
            }],
        };

        let mut summary = OperatorSummary::new("stib");
        let built = build_geometry(
            "stib",
            vec![mk_route("r1"), mk_route("r2")],
            &PipelineOptions::default(),
            &mut summary,
        );

        assert_eq!(
            built[0].patterns[0].geometry_id,
            built[1].patterns[0].geometry_id
        );
        assert_eq!(summary.patterns_emitted, 2);
        assert_eq!(summary.patterns_deduplicated, 1);
    }
}
