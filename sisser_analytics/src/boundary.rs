//! State boundary polygons stored as GeoJSON.

use crate::error::{PipelineError, Result};
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::path::Path;

/// One state's outline plus the attributes it was published with.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBoundary {
    /// Value of the boundary's own state-code attribute.
    pub code: String,
    pub geometry: MultiPolygon<f64>,
    pub properties: JsonObject,
}

impl GeoBoundary {
    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

/// Polygons become single-member multipolygons; anything else is rejected.
pub fn to_multi_polygon(geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        other => Err(PipelineError::Geometry(format!(
            "expected a polygon or multipolygon, found {}",
            geometry_kind(&other)
        ))),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => "point",
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => "line",
        Geometry::GeometryCollection(_) => "geometry collection",
        _ => "non-areal geometry",
    }
}

pub fn boundary_from_feature(feature: Feature, code_field: &str) -> Result<GeoBoundary> {
    let code = feature
        .property(code_field)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::SchemaMismatch(format!("boundary feature without {code_field}"))
        })?;
    let geometry = feature
        .geometry
        .ok_or_else(|| PipelineError::Geometry(format!("feature {code} has no geometry")))?;
    let geometry = to_multi_polygon(Geometry::<f64>::try_from(geometry.value)?)?;

    Ok(GeoBoundary {
        code,
        geometry,
        properties: feature.properties.unwrap_or_default(),
    })
}

pub fn boundaries_from_collection(
    collection: FeatureCollection,
    code_field: &str,
) -> Result<Vec<GeoBoundary>> {
    collection
        .features
        .into_iter()
        .map(|feature| boundary_from_feature(feature, code_field))
        .collect()
}

pub fn read_boundaries(path: &Path, code_field: &str) -> Result<Vec<GeoBoundary>> {
    let collection: FeatureCollection = std::fs::read_to_string(path)?.parse()?;
    boundaries_from_collection(collection, code_field)
}

pub fn write_feature_collection(path: &Path, features: Vec<Feature>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, GeoJson::from(collection).to_string())?;
    Ok(())
}

pub fn write_boundaries(path: &Path, boundaries: &[GeoBoundary]) -> Result<()> {
    write_feature_collection(path, boundaries.iter().map(GeoBoundary::to_feature).collect())
}
