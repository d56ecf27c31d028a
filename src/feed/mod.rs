//! Feed Reader: parses one operator's GTFS bundle into typed in-memory
//! tables keyed by their natural identifiers.

pub mod records;
mod source;

pub use source::{DirSource, TableSource, ZipSource, open_source};

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use geo::Coord;
use tracing::debug;

use crate::error::FeedError;
use crate::feed::records::{
    RouteRecord, ShapePointRecord, StopRecord, StopTimeRecord, TripRecord, read_table, strip_bom,
};
use crate::model::Stop;
use crate::summary::OperatorSummary;

/// One operator's feed, parsed. BTreeMaps keep iteration deterministic.
#[derive(Debug, Default)]
pub struct Feed {
    pub stops: BTreeMap<String, Stop>,
    pub routes: BTreeMap<String, RouteRecord>,
    pub trips: Vec<TripRecord>,
    /// Shape id -> coordinates ordered by shape_pt_sequence.
    pub shapes: BTreeMap<String, Vec<Coord<f64>>>,
    /// Trip id -> (stop_sequence, stop_id), ordered by stop_sequence.
    /// Empty when the feed has no stop_times.txt.
    pub stop_times: BTreeMap<String, Vec<(u32, String)>>,
}

/// Loads a feed from a directory or zip archive at `path`.
///
/// stops.txt, routes.txt, trips.txt and shapes.txt are mandatory; their
/// absence fails the whole operator with [`FeedError::MissingFile`].
/// stop_times.txt is optional. Skipped-row counts land in `summary`.
pub fn load(path: &Path, summary: &mut OperatorSummary) -> Result<Feed, FeedError> {
    let mut source = open_source(path)?;

    let stops_bytes = read_mandatory(source.as_mut(), "stops.txt", path)?;
    let routes_bytes = read_mandatory(source.as_mut(), "routes.txt", path)?;
    let trips_bytes = read_mandatory(source.as_mut(), "trips.txt", path)?;
    let shapes_bytes = read_mandatory(source.as_mut(), "shapes.txt", path)?;
    let stop_times_bytes = read_optional(source.as_mut(), "stop_times.txt", path)?;

    let mut feed = Feed::default();

    for rec in read_table::<StopRecord, _>(stops_bytes.as_slice(), &mut summary.stops) {
        feed.stops.insert(
            rec.stop_id.clone(),
            Stop {
                id: rec.stop_id,
                name: rec.stop_name.unwrap_or_default(),
                lat: rec.stop_lat,
                lon: rec.stop_lon,
            },
        );
    }
    debug!(
        parsed = summary.stops.parsed,
        skipped = summary.stops.skipped,
        "Parsed stops"
    );

    for rec in read_table::<RouteRecord, _>(routes_bytes.as_slice(), &mut summary.routes) {
        feed.routes.insert(rec.route_id.clone(), rec);
    }
    debug!(
        parsed = summary.routes.parsed,
        skipped = summary.routes.skipped,
        "Parsed routes"
    );

    feed.trips = read_table::<TripRecord, _>(trips_bytes.as_slice(), &mut summary.trips);
    debug!(
        parsed = summary.trips.parsed,
        skipped = summary.trips.skipped,
        "Parsed trips"
    );

    let mut pts_per_shape: BTreeMap<String, Vec<(u32, Coord<f64>)>> = BTreeMap::new();
    for rec in read_table::<ShapePointRecord, _>(shapes_bytes.as_slice(), &mut summary.shape_points)
    {
        pts_per_shape.entry(rec.shape_id).or_default().push((
            rec.shape_pt_sequence,
            Coord {
                x: rec.shape_pt_lon,
                y: rec.shape_pt_lat,
            },
        ));
    }
    for (shape_id, mut pts) in pts_per_shape {
        // Sort by sequence index; the file is not required to be in order.
        pts.sort_by_key(|(seq, _)| *seq);
        feed.shapes
            .insert(shape_id, pts.into_iter().map(|(_, pt)| pt).collect());
    }
    debug!(
        shapes = feed.shapes.len(),
        parsed = summary.shape_points.parsed,
        skipped = summary.shape_points.skipped,
        "Parsed shape points"
    );

    if let Some(bytes) = stop_times_bytes {
        for rec in read_table::<StopTimeRecord, _>(bytes.as_slice(), &mut summary.stop_times) {
            feed.stop_times
                .entry(rec.trip_id)
                .or_default()
                .push((rec.stop_sequence, rec.stop_id));
        }
        for times in feed.stop_times.values_mut() {
            times.sort_by_key(|(seq, _)| *seq);
        }
        debug!(
            trips_with_stop_times = feed.stop_times.len(),
            parsed = summary.stop_times.parsed,
            skipped = summary.stop_times.skipped,
            "Parsed stop times"
        );
    } else {
        debug!("Feed has no stop_times.txt; patterns will carry no stop lists");
    }

    Ok(feed)
}

fn read_mandatory(
    source: &mut dyn TableSource,
    table: &'static str,
    feed_path: &Path,
) -> Result<Vec<u8>, FeedError> {
    read_optional(source, table, feed_path)?.ok_or_else(|| FeedError::MissingFile {
        table,
        path: feed_path.to_path_buf(),
    })
}

fn read_optional(
    source: &mut dyn TableSource,
    table: &'static str,
    feed_path: &Path,
) -> Result<Option<Vec<u8>>, FeedError> {
    match source.open(table)? {
        Some(mut reader) => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).map_err(|e| FeedError::Io {
                path: feed_path.to_path_buf(),
                source: e,
            })?;
            strip_bom(&mut bytes);
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}
