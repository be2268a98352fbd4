//! Minimal GeoJSON reader for line-segment and point feature collections.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// A GeoJSON geometry. Only the variants the network model consumes are typed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    MultiLineString { coordinates: Vec<Vec<Vec<f64>>> },
    #[serde(other)]
    Unsupported,
}

/// A single GeoJSON feature.
///
/// A feature whose JSON does not fit this shape is kept with its parse error
/// in `malformed`, so one bad entry never hides its siblings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(skip)]
    pub malformed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Value>,
}

/// Read all features from a GeoJSON `FeatureCollection` file.
pub fn load_features(path: &Path) -> Result<Vec<Feature>> {
    let file = File::open(path)?;
    let features = read_features(BufReader::new(file)).map_err(|err| match err {
        Error::NotFeatureCollection { .. } => Error::NotFeatureCollection {
            path: path.to_path_buf(),
        },
        other => other,
    })?;
    debug!(path = %path.display(), features = features.len(), "read feature collection");
    Ok(features)
}

/// Read features from any reader holding a `FeatureCollection` document.
pub fn read_features<R: Read>(reader: R) -> Result<Vec<Feature>> {
    let collection: FeatureCollection = serde_json::from_reader(reader)?;
    if collection.kind != "FeatureCollection" {
        return Err(Error::NotFeatureCollection {
            path: Default::default(),
        });
    }
    Ok(collection
        .features
        .into_iter()
        .map(Feature::from_value)
        .collect())
}

impl Feature {
    /// Convert one raw feature object, recording rather than propagating
    /// parse failures.
    pub fn from_value(value: Value) -> Self {
        match Feature::deserialize(&value) {
            Ok(feature) => feature,
            Err(err) => Self {
                geometry: None,
                properties: value
                    .get("properties")
                    .and_then(Value::as_object)
                    .cloned(),
                malformed: Some(err.to_string()),
            },
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .as_ref()
            .and_then(|props| props.get(name))
            .filter(|value| !value.is_null())
    }

    /// String property; numbers are rendered as text.
    pub fn str_property(&self, name: &str) -> Option<String> {
        match self.property(name)? {
            Value::String(raw) => Some(raw.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    /// Numeric property; numeric strings are accepted.
    pub fn f64_property(&self, name: &str) -> Option<f64> {
        match self.property(name)? {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }

    /// Start and end coordinates of a line feature.
    ///
    /// For multi-part lines only the first part is used.
    pub fn line_endpoints(&self, index: usize) -> Result<([f64; 2], [f64; 2])> {
        self.check_parsed(index)?;
        let part: &[Vec<f64>] = match &self.geometry {
            Some(Geometry::LineString { coordinates }) => coordinates,
            Some(Geometry::MultiLineString { coordinates }) => {
                coordinates.first().map(Vec::as_slice).unwrap_or(&[])
            }
            Some(_) => return Err(feature_error(index, "expected a line geometry")),
            None => return Err(feature_error(index, "missing geometry")),
        };

        let (Some(first), Some(last)) = (part.first(), part.last()) else {
            return Err(feature_error(index, "line geometry has no coordinates"));
        };
        if part.len() < 2 {
            return Err(feature_error(index, "line geometry needs two coordinates"));
        }

        Ok((position(index, first)?, position(index, last)?))
    }

    /// Coordinates of a point feature.
    pub fn point(&self, index: usize) -> Result<[f64; 2]> {
        self.check_parsed(index)?;
        match &self.geometry {
            Some(Geometry::Point { coordinates }) => position(index, coordinates),
            Some(_) => Err(feature_error(index, "expected a point geometry")),
            None => Err(feature_error(index, "missing geometry")),
        }
    }

    fn check_parsed(&self, index: usize) -> Result<()> {
        match &self.malformed {
            Some(reason) => Err(feature_error(index, format!("malformed feature: {reason}"))),
            None => Ok(()),
        }
    }
}

fn position(index: usize, raw: &[f64]) -> Result<[f64; 2]> {
    match raw {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok([*x, *y]),
        _ => Err(feature_error(index, "invalid coordinate pair")),
    }
}

pub(crate) fn feature_error(index: usize, message: impl Into<String>) -> Error {
    Error::Feature {
        index,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_lines_and_points() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"quality": 2},
                 "geometry": {"type": "MultiLineString",
                              "coordinates": [[[0, 0], [0.5, 0.5], [1, 0]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [3, 4]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "Polygon", "coordinates": []}}
            ]
        }"#;
        let features = read_features(doc.as_bytes()).expect("parse");
        assert_eq!(features.len(), 3);
        assert_eq!(
            features[0].line_endpoints(0).expect("line"),
            ([0.0, 0.0], [1.0, 0.0])
        );
        assert_eq!(features[1].point(1).expect("point"), [3.0, 4.0]);
        assert!(features[2].line_endpoints(2).is_err());
        assert!(features[2].property("quality").is_none());
    }

    #[test]
    fn malformed_feature_does_not_hide_siblings() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"iso3": "AAA"},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 0]]}},
                {"type": "Feature", "properties": {"iso3": "AAA"},
                 "geometry": {"type": "LineString"}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [null, 1]}},
                {"type": "Feature", "properties": [1, 2],
                 "geometry": {"type": "Point", "coordinates": [1, 1]}}
            ]
        }"#;
        let features = read_features(doc.as_bytes()).expect("parse");
        assert_eq!(features.len(), 4);
        assert!(features[0].malformed.is_none());
        assert!(features[0].line_endpoints(0).is_ok());

        assert!(features[1].malformed.is_some());
        assert_eq!(features[1].str_property("iso3").as_deref(), Some("AAA"));
        assert!(matches!(
            features[1].line_endpoints(1),
            Err(Error::Feature { index: 1, .. })
        ));
        assert!(matches!(
            features[2].point(2),
            Err(Error::Feature { index: 2, .. })
        ));
        assert!(features[3].point(3).is_err());
        assert!(features[3].properties.is_none());
    }

    #[test]
    fn rejects_non_collections() {
        let doc = r#"{"type": "Feature", "properties": {}}"#;
        assert!(matches!(
            read_features(doc.as_bytes()),
            Err(Error::NotFeatureCollection { .. })
        ));
    }
}
