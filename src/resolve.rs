//! Shape Resolver: determines each route's pattern(s).
//!
//! A route's trips are grouped by the shape they reference; each distinct
//! shape backed by real points becomes a candidate pattern. Only the
//! patterns used by the most trips are retained, capped per route, so minor
//! branch variants don't bloat the output with near-duplicate geometry.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use geo::Coord;
use tracing::warn;

use crate::config::PipelineOptions;
use crate::feed::Feed;
use crate::feed::records::TripRecord;
use crate::model::{Mode, ResolvedPattern, ResolvedRoute};
use crate::summary::OperatorSummary;

/// Strategy for positioning a stop along a pattern polyline.
///
/// Feeds rarely carry explicit distance-along-shape data, so the default is
/// an approximation; this seam exists so exact data can be plugged in when
/// available.
pub trait StopLocator {
    /// Index of the polyline vertex closest to the stop coordinate.
    fn locate(&self, polyline: &[Coord<f64>], stop: Coord<f64>) -> usize;
}

/// Nearest polyline vertex by squared coordinate distance.
pub struct NearestVertexLocator;

impl StopLocator for NearestVertexLocator {
    fn locate(&self, polyline: &[Coord<f64>], stop: Coord<f64>) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, pt) in polyline.iter().enumerate() {
            let dx = pt.x - stop.x;
            let dy = pt.y - stop.y;
            let dist = dx * dx + dy * dy;
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best
    }
}

/// Resolves every route in `feed` to its retained patterns.
///
/// Routes with no resolvable shape are dropped with a warning and counted,
/// never a failure.
pub fn resolve_routes(
    feed: &Feed,
    options: &PipelineOptions,
    locator: &dyn StopLocator,
    summary: &mut OperatorSummary,
) -> Vec<ResolvedRoute> {
    let mut trips_by_route: BTreeMap<&str, Vec<&TripRecord>> = BTreeMap::new();
    for trip in &feed.trips {
        trips_by_route
            .entry(trip.route_id.as_str())
            .or_default()
            .push(trip);
    }

    let mut resolved = Vec::new();

    for (route_id, record) in &feed.routes {
        let trips = trips_by_route
            .get(route_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut trips_by_shape: BTreeMap<&str, Vec<&TripRecord>> = BTreeMap::new();
        for &trip in trips {
            if let Some(shape_id) = trip.shape_id.as_deref() {
                trips_by_shape.entry(shape_id).or_default().push(trip);
            }
        }

        // Candidates need at least 2 real shape points.
        let mut candidates: Vec<(&str, &Vec<&TripRecord>)> = trips_by_shape
            .iter()
            .map(|(shape_id, trips)| (*shape_id, trips))
            .filter(|(shape_id, _)| feed.shapes.get(*shape_id).is_some_and(|pts| pts.len() >= 2))
            .collect();

        if candidates.is_empty() {
            warn!(route_id = %route_id, "Route has no resolvable shape, dropped");
            summary.routes_dropped_no_shape += 1;
            continue;
        }

        // Majority shapes first; ties broken by shape id for determinism.
        candidates.sort_by(|a, b| {
            (Reverse(a.1.len()), a.0).cmp(&(Reverse(b.1.len()), b.0))
        });
        candidates.truncate(options.max_patterns_per_route);

        let patterns: Vec<ResolvedPattern> = candidates
            .into_iter()
            .map(|(shape_id, trips)| {
                let points = feed.shapes[shape_id].clone();
                let stop_ids = pattern_stops(feed, trips, &points, locator);
                ResolvedPattern {
                    shape_id: shape_id.to_string(),
                    trip_count: trips.len(),
                    points,
                    stop_ids,
                }
            })
            .collect();

        let route_type = record.route_type.unwrap_or(3);
        let mode = Mode::from_route_type(route_type);
        if mode == Mode::Unknown {
            summary.unknown_mode_codes.insert(route_type);
        }

        summary.routes_emitted += 1;
        resolved.push(ResolvedRoute {
            id: route_id.clone(),
            short_name: record.route_short_name.clone(),
            long_name: record.route_long_name.clone(),
            route_type,
            mode,
            patterns,
        });
    }

    resolved
}

/// Stop ids visited by a pattern, ordered along the polyline.
///
/// Uses the stop_times of the trip with the most stops among the pattern's
/// trips, then positions each stop on the shape via the locator. Stops
/// missing from stops.txt are omitted.
fn pattern_stops(
    feed: &Feed,
    trips: &[&TripRecord],
    polyline: &[Coord<f64>],
    locator: &dyn StopLocator,
) -> Vec<String> {
    let mut best: Option<&Vec<(u32, String)>> = None;
    let mut trip_ids: Vec<&str> = trips.iter().map(|t| t.trip_id.as_str()).collect();
    trip_ids.sort_unstable();
    for trip_id in trip_ids {
        if let Some(times) = feed.stop_times.get(trip_id) {
            if best.is_none_or(|b| times.len() > b.len()) {
                best = Some(times);
            }
        }
    }
    let Some(times) = best else {
        return Vec::new();
    };

    let mut located: Vec<(usize, &str)> = times
        .iter()
        .filter_map(|(_, stop_id)| {
            feed.stops
                .get(stop_id)
                .map(|stop| (locator.locate(polyline, stop.coord()), stop_id.as_str()))
        })
        .collect();
    // Stable sort keeps stop_sequence order for stops snapping to the same
    // vertex.
    located.sort_by_key(|(idx, _)| *idx);
    located.into_iter().map(|(_, id)| id.to_string()).collect()
}
