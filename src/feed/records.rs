//! Raw csv row types and the row-tolerant table reader.
//!
//! A row that fails to deserialize or fails validation is dropped and
//! counted, never fatal. Real feeds contain bad rows; partial-feed tolerance
//! is mandatory.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::summary::TableCounts;

fn coord_in_bounds(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// A deserializable feed row with validation beyond what serde enforces.
pub trait FeedRecord: DeserializeOwned {
    fn valid(&self) -> bool {
        true
    }
}

#[derive(Debug, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

impl FeedRecord for StopRecord {
    fn valid(&self) -> bool {
        !self.stop_id.is_empty() && coord_in_bounds(self.stop_lat, self.stop_lon)
    }
}

#[derive(Debug, Deserialize)]
pub struct RouteRecord {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    /// Absent in some feeds; treated as 3 (bus) at resolve time.
    #[serde(default)]
    pub route_type: Option<i32>,
}

impl FeedRecord for RouteRecord {
    fn valid(&self) -> bool {
        !self.route_id.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct TripRecord {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub shape_id: Option<String>,
}

impl FeedRecord for TripRecord {
    fn valid(&self) -> bool {
        !self.trip_id.is_empty() && !self.route_id.is_empty()
    }
}

#[derive(Debug, Deserialize)]
pub struct ShapePointRecord {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
}

impl FeedRecord for ShapePointRecord {
    fn valid(&self) -> bool {
        !self.shape_id.is_empty() && coord_in_bounds(self.shape_pt_lat, self.shape_pt_lon)
    }
}

#[derive(Debug, Deserialize)]
pub struct StopTimeRecord {
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: u32,
}

impl FeedRecord for StopTimeRecord {
    fn valid(&self) -> bool {
        !self.trip_id.is_empty() && !self.stop_id.is_empty()
    }
}

/// Reads every row of one table, dropping and counting rows that fail to
/// deserialize or validate.
pub fn read_table<T: FeedRecord, R: Read>(reader: R, counts: &mut TableCounts) -> Vec<T> {
    let mut rows = Vec::new();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    for result in rdr.deserialize::<T>() {
        match result {
            Ok(row) if row.valid() => {
                counts.parsed += 1;
                rows.push(row);
            }
            _ => counts.skipped += 1,
        }
    }
    rows
}

/// Strips a UTF-8 byte order mark; some publishers export tables with one,
/// which would otherwise corrupt the first header name.
pub fn strip_bom(bytes: &mut Vec<u8>) {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes.drain(..3);
    }
}
