//! Dataset Emitter: serializes the merged dataset into GeoJSON partitions.
//!
//! One FeatureCollection per transport mode at minimum, optionally per
//! (operator, mode) as well, plus a manifest listing every partition. Output
//! is deterministic for a given dataset: explicit sorts on identifiers, no
//! timestamps, and serde_json's ordered object keys. All files are written
//! to temporary names first and renamed into place, so a failed run never
//! leaves a half-written dataset visible to the viewer.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::Serialize;
use tracing::info;

use crate::config::PipelineOptions;
use crate::merge::{Dataset, MergedPattern, MergedRoute, MergedStop};
use crate::model::Mode;

/// One emitted partition, as listed in the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub file: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub routes: usize,
    pub patterns: usize,
    pub stops: usize,
}

/// Partition index written as `manifest.json`, consumed by the viewer so it
/// can discover partitions without a directory listing.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub partitions: Vec<ManifestEntry>,
    pub modes: Vec<String>,
    pub operators: Vec<String>,
}

/// Writes every partition plus the manifest under `out_dir`.
pub fn write_dataset(
    dataset: &Dataset,
    out_dir: &Path,
    options: &PipelineOptions,
) -> Result<Manifest> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let modes: BTreeSet<Mode> = dataset.routes.iter().map(|r| r.mode).collect();
    let operators: BTreeSet<&str> = dataset
        .routes
        .iter()
        .map(|r| r.operator.as_str())
        .collect();

    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let mut entries = Vec::new();

    for &mode in &modes {
        let file = format!("mode={}.geojson", mode.as_str());
        let (content, entry) = render_partition(dataset, mode, None, &file);
        files.push((out_dir.join(&file), content));
        entries.push(entry);

        if options.partition_by_operator {
            for &operator in &operators {
                let file = format!("operator={}.mode={}.geojson", operator, mode.as_str());
                let (content, entry) = render_partition(dataset, mode, Some(operator), &file);
                if entry.patterns == 0 {
                    continue;
                }
                files.push((out_dir.join(&file), content));
                entries.push(entry);
            }
        }
    }

    let manifest = Manifest {
        partitions: entries,
        modes: modes.iter().map(|m| m.as_str().to_string()).collect(),
        operators: operators.iter().map(|o| o.to_string()).collect(),
    };
    files.push((
        out_dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).context("serializing manifest")?,
    ));

    write_all_atomically(&files)?;

    info!(
        partitions = manifest.partitions.len(),
        out_dir = %out_dir.display(),
        "Dataset written"
    );
    Ok(manifest)
}

/// Two-phase write: every file lands under a `.tmp` name first, then all are
/// renamed into place. Leftover temporaries are removed on failure.
fn write_all_atomically(files: &[(PathBuf, String)]) -> Result<()> {
    let tmp_paths: Vec<PathBuf> = files.iter().map(|(path, _)| tmp_name(path)).collect();

    let result = (|| -> Result<()> {
        for ((path, content), tmp) in files.iter().zip(&tmp_paths) {
            fs::write(tmp, content)
                .with_context(|| format!("writing temporary file for {}", path.display()))?;
        }
        for ((path, _), tmp) in files.iter().zip(&tmp_paths) {
            fs::rename(tmp, path)
                .with_context(|| format!("moving {} into place", path.display()))?;
        }
        Ok(())
    })();

    if result.is_err() {
        for tmp in &tmp_paths {
            let _ = fs::remove_file(tmp);
        }
    }
    result
}

fn tmp_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn render_partition(
    dataset: &Dataset,
    mode: Mode,
    operator: Option<&str>,
    file: &str,
) -> (String, ManifestEntry) {
    let routes: Vec<&MergedRoute> = dataset
        .routes
        .iter()
        .filter(|r| r.mode == mode && operator.is_none_or(|op| r.operator == op))
        .collect();
    let stops: Vec<&MergedStop> = dataset
        .stops
        .values()
        .filter(|s| s.modes.contains(&mode) && operator.is_none_or(|op| s.operator == op))
        .collect();

    let mut features = Vec::new();
    // Each geometry id is serialized once per partition; later uses carry a
    // null geometry plus a geometry_ref, so the partition stays
    // self-contained while shared corridors aren't duplicated.
    let mut seen_geometries: BTreeSet<&str> = BTreeSet::new();
    let mut pattern_count = 0;

    for route in &routes {
        for (idx, pattern) in route.patterns.iter().enumerate() {
            let own_geometry = seen_geometries.insert(pattern.geometry_id.as_str());
            features.push(pattern_feature(route, idx, pattern, own_geometry));
            pattern_count += 1;
        }
    }
    for stop in &stops {
        features.push(stop_feature(stop));
    }

    let collection = GeoJson::FeatureCollection(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    });

    let entry = ManifestEntry {
        file: file.to_string(),
        mode: mode.as_str().to_string(),
        operator: operator.map(str::to_string),
        routes: routes.len(),
        patterns: pattern_count,
        stops: stops.len(),
    };
    (collection.to_string(), entry)
}

fn pattern_feature(
    route: &MergedRoute,
    idx: usize,
    pattern: &MergedPattern,
    own_geometry: bool,
) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: own_geometry.then(|| geojson::Geometry::from(&pattern.line)),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("feature_type", "pattern");
    feature.set_property("id", format!("{}/p{}", route.id, idx));
    feature.set_property("route_id", route.id.clone());
    feature.set_property("operator", route.operator.clone());
    feature.set_property("mode", route.mode.as_str());
    feature.set_property("name", route.name.clone());
    feature.set_property("stops", pattern.stop_ids.clone());
    feature.set_property("trip_count", pattern.trip_count as u64);
    feature.set_property("geometry_id", pattern.geometry_id.clone());
    if !own_geometry {
        feature.set_property("geometry_ref", pattern.geometry_id.clone());
    }
    feature
}

fn stop_feature(stop: &MergedStop) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
            stop.lon, stop.lat,
        ]))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("feature_type", "stop");
    feature.set_property("id", stop.id.clone());
    feature.set_property("operator", stop.operator.clone());
    feature.set_property("name", stop.name.clone());
    feature.set_property(
        "routes",
        stop.route_ids.iter().cloned().collect::<Vec<String>>(),
    );
    feature.set_property(
        "modes",
        stop.modes
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<&str>>(),
    );
    feature.set_property("is_transfer", stop.route_ids.len() > 1);
    feature
}
