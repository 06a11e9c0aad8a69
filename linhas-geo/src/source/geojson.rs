//! Lecture GeoJSON (FeatureCollection, Feature ou géométrie seule)

use std::collections::BTreeMap;
use std::path::Path;

use ::geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use geo::Geometry;
use tracing::warn;

use super::layer_name;
use crate::types::{Feature, Layer};
use crate::GeoError;

/// EPSG implicite d'un GeoJSON sans membre `crs`
pub const DEFAULT_EPSG: u32 = 4326;

/// Lit un fichier GeoJSON comme une couche unique
pub fn read_layer(path: &Path) -> Result<Layer, GeoError> {
    let text = std::fs::read_to_string(path)?;
    parse_layer(&layer_name(path), &text)
}

/// Parse un texte GeoJSON en couche
pub fn parse_layer(name: &str, text: &str) -> Result<Layer, GeoError> {
    let geojson: GeoJson = text.parse()?;

    let (epsg, raw_features) = match geojson {
        GeoJson::FeatureCollection(fc) => (
            fc.foreign_members.as_ref().and_then(crs_epsg),
            fc.features,
        ),
        GeoJson::Feature(f) => (None, vec![f]),
        GeoJson::Geometry(g) => (
            None,
            vec![::geojson::Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        ),
    };

    let mut features = Vec::with_capacity(raw_features.len());
    let mut skipped = 0usize;

    for (index, raw) in raw_features.into_iter().enumerate() {
        let id = match &raw.id {
            Some(Id::String(s)) => s.clone(),
            Some(Id::Number(n)) => n.to_string(),
            None => (index + 1).to_string(),
        };

        let Some(geometry) = raw.geometry else {
            skipped += 1;
            continue;
        };
        let geometry = match Geometry::<f64>::try_from(geometry) {
            Ok(g) => g,
            Err(e) => {
                warn!(layer = %name, id = %id, error = %e, "Unsupported GeoJSON geometry");
                skipped += 1;
                continue;
            }
        };

        let properties = raw
            .properties
            .map(|props| {
                props
                    .into_iter()
                    .filter_map(|(k, v)| json_to_string(v).map(|v| (k, v)))
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        features.push(Feature {
            id,
            geometry,
            properties,
        });
    }

    if skipped > 0 {
        warn!(layer = %name, skipped, "Features without geometry were skipped");
    }

    Ok(Layer::new(name, Some(epsg.unwrap_or(DEFAULT_EPSG)), features))
}

/// Lit le membre `crs` historique : `urn:ogc:def:crs:EPSG::31982` ou `EPSG:31982`
fn crs_epsg(members: &JsonObject) -> Option<u32> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;

    if name.contains("CRS84") {
        return Some(4326);
    }

    name.rsplit(':')
        .find(|part| !part.is_empty())
        .and_then(|code| code.parse().ok())
}

fn json_to_string(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
