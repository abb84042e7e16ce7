use anyhow::{bail, Context, Result};
use geo::{Intersects, Line, LineString, MultiPolygon, Polygon, Simplify, SimplifyVwPreserve};
use geojson::{JsonObject, JsonValue};
use log::{debug, info};
use rayon::prelude::*;
use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;
use sisser_analytics::boundary::{read_boundaries, write_boundaries};
use sisser_analytics::columns::BOUNDARY_STATE;
use sisser_analytics::{GeoBoundary, PipelineError};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_INPUT: &str = "datasets/BR_UF_2022.shp";
pub const DEFAULT_OUTPUT: &str = "assets/BR_UF_2022_filtrado.geojson";

#[derive(Debug, Clone)]
pub struct SimplifyConfig {
    /// Maximum deviation in coordinate units (degrees for the IBGE files).
    pub tolerance: f64,
    /// Attribute holding the state code.
    pub code_field: String,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            code_field: BOUNDARY_STATE.to_string(),
        }
    }
}

pub struct BoundarySimplifier {
    config: SimplifyConfig,
}

impl BoundarySimplifier {
    pub fn new(config: SimplifyConfig) -> Result<Self> {
        if !config.tolerance.is_finite() || config.tolerance < 0.0 {
            bail!("simplification tolerance must be a non-negative number, got {}", config.tolerance);
        }
        Ok(Self { config })
    }

    pub fn run(&self, input: &Path, output: &Path) -> Result<Vec<GeoBoundary>> {
        let boundaries = read_source(input, &self.config.code_field)?;
        info!("read {} boundaries from {}", boundaries.len(), input.display());

        let simplified = self.simplify(boundaries);
        write_boundaries(output, &simplified)?;
        info!("wrote simplified boundaries to {}", output.display());
        Ok(simplified)
    }

    /// Simplify every outline within `tolerance`; attributes are kept.
    pub fn simplify(&self, boundaries: Vec<GeoBoundary>) -> Vec<GeoBoundary> {
        let tolerance = self.config.tolerance;
        boundaries
            .into_par_iter()
            .map(|boundary| {
                let geometry = MultiPolygon::new(
                    boundary
                        .geometry
                        .iter()
                        .map(|polygon| simplify_polygon(polygon, tolerance))
                        .collect(),
                );
                debug!("simplified {}", boundary.code);
                GeoBoundary {
                    geometry,
                    ..boundary
                }
            })
            .collect()
    }
}

/// Douglas-Peucker at `tolerance`, so no dropped vertex lies farther than
/// `tolerance` from the kept outline.
///
/// When that leaves a ring with crossing edges or fewer than four points, the
/// polygon is simplified with topology-preserving Visvalingam-Whyatt instead,
/// thresholded on the equivalent triangle area.
fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    let simplified = polygon.simplify(&tolerance);
    if rings_are_simple(&simplified) {
        simplified
    } else {
        debug!("douglas-peucker broke a ring, falling back to visvalingam-whyatt");
        polygon.simplify_vw_preserve(&(tolerance * tolerance))
    }
}

/// Every ring closed with at least four points, and no two non-adjacent
/// edges of the polygon touching.
fn rings_are_simple(polygon: &Polygon<f64>) -> bool {
    let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect();
    if rings.iter().any(|ring| ring.0.len() < 4 || !ring.is_closed()) {
        return false;
    }

    // (ring, index within ring, ring edge count, edge)
    let edges: Vec<(usize, usize, usize, Line<f64>)> = rings
        .iter()
        .copied()
        .enumerate()
        .flat_map(|(r, ring)| {
            let count = ring.0.len() - 1;
            ring.lines().enumerate().map(move |(i, line)| (r, i, count, line))
        })
        .collect();

    for (a, (ring_a, i, count, line_a)) in edges.iter().enumerate() {
        for (ring_b, j, _, line_b) in &edges[a + 1..] {
            let adjacent = ring_a == ring_b && (j - i == 1 || (*i == 0 && *j == count - 1));
            if !adjacent && line_a.intersects(line_b) {
                return false;
            }
        }
    }
    true
}

/// Read a shapefile (`.shp` with its `.dbf`) or a GeoJSON boundary set.
pub fn read_source(path: &Path, code_field: &str) -> Result<Vec<GeoBoundary>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("shp") => read_shapefile(path, code_field),
        Some("geojson") | Some("json") => Ok(read_boundaries(path, code_field)?),
        _ => bail!("unsupported boundary source {}", path.display()),
    }
}

fn read_shapefile(path: &Path, code_field: &str) -> Result<Vec<GeoBoundary>> {
    let shapes = shapefile::read_as::<_, Shape, Record>(path)
        .with_context(|| format!("reading shapefile {}", path.display()))?;

    shapes
        .into_iter()
        .map(|(shape, record)| {
            let properties = record_properties(record);
            let code = properties
                .get(code_field)
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    PipelineError::SchemaMismatch(format!("boundary record without {code_field}"))
                })?;
            let geometry = match shape {
                Shape::Polygon(polygon) => MultiPolygon::<f64>::from(polygon),
                other => {
                    return Err(PipelineError::Geometry(format!(
                        "boundary {code} is a {} shape, expected a polygon",
                        other.shapetype()
                    ))
                    .into())
                }
            };
            Ok(GeoBoundary {
                code,
                geometry,
                properties,
            })
        })
        .collect()
}

fn record_properties(record: Record) -> JsonObject {
    HashMap::<String, FieldValue>::from(record)
        .into_iter()
        .map(|(name, value)| (name, field_to_json(value)))
        .collect()
}

fn field_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(Some(text)) => JsonValue::from(text.trim_end()),
        FieldValue::Numeric(Some(number)) => JsonValue::from(number),
        FieldValue::Logical(Some(flag)) => JsonValue::from(flag),
        FieldValue::Integer(number) => JsonValue::from(number),
        FieldValue::Double(number) => JsonValue::from(number),
        _ => JsonValue::Null,
    }
}
