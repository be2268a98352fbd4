#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;
use tradecost_lib::{
    read_features, BorderCosts, CostMode, DataPaths, Feature, ModelConfig, Parameters, Tariffs,
    TransportRates,
};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// Data root of the two-country fixture (roads in AAA/BBB, an isolated CCC).
pub fn two_country_root() -> PathBuf {
    fixtures_dir().join("two_country")
}

/// Copy the two-country fixture into a scratch directory so tests may write.
pub fn scratch_copy() -> (TempDir, DataPaths) {
    let dir = TempDir::new().expect("create temp dir");
    copy_dir(&two_country_root(), dir.path());
    let paths = DataPaths::rooted_at(dir.path());
    (dir, paths)
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read fixture dir") {
        let entry = entry.expect("dir entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("file type").is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }
}

/// Road line feature between two points.
pub fn road(a: [f64; 2], b: [f64; 2], region: &str, quality: i64, length: f64) -> Feature {
    feature(json!({
        "type": "Feature",
        "properties": {"iso3": region, "quality": quality, "length": length},
        "geometry": {"type": "LineString", "coordinates": [a, b]}
    }))
}

/// Sea line feature between two points.
pub fn sea_link(a: [f64; 2], b: [f64; 2], length: f64) -> Feature {
    feature(json!({
        "type": "Feature",
        "properties": {"quality": "sea", "length": length},
        "geometry": {"type": "LineString", "coordinates": [a, b]}
    }))
}

fn feature(value: serde_json::Value) -> Feature {
    let collection = json!({"type": "FeatureCollection", "features": [value]});
    read_features(collection.to_string().as_bytes())
        .expect("valid feature")
        .remove(0)
}

/// Freight configuration: rank 1 costs 1 per km, sea 0.1 per km, shipment
/// value 1 so matrix cells equal raw path costs plus tariffs.
pub fn freight_config(border_costs: BorderCosts, tariffs: Tariffs) -> ModelConfig {
    let rates = TransportRates::from_pairs([("1", 1.0), ("2", 0.5), ("sea", 0.1)]);
    let params = Parameters::from_pairs([("shipment_value", 1.0), ("port_fee", 2.0)]);
    ModelConfig::from_parts(CostMode::Freight, rates, border_costs, tariffs, &params)
        .expect("complete parameters")
}
