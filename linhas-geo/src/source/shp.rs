//! Lecture ESRI Shapefile (+ détection EPSG depuis le `.prj`)

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use geo::Geometry;
use regex::Regex;
use shapefile::dbase::FieldValue;
use tracing::{debug, warn};

use super::layer_name;
use crate::types::{Feature, Layer};
use crate::GeoError;

/// Lit un shapefile comme une couche unique
pub fn read_layer(path: &Path) -> Result<Layer, GeoError> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let name = layer_name(path);

    let mut features = Vec::new();
    let mut skipped = 0usize;

    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;
        let id = (index + 1).to_string();

        let geometry = match Geometry::<f64>::try_from(shape) {
            Ok(g) => g,
            Err(e) => {
                debug!(layer = %name, id = %id, error = %e, "Shape without usable geometry");
                skipped += 1;
                continue;
            }
        };

        let properties: BTreeMap<String, String> = HashMap::<String, FieldValue>::from(record)
            .into_iter()
            .filter_map(|(k, v)| field_to_string(v).map(|v| (k, v)))
            .collect();

        features.push(Feature {
            id,
            geometry,
            properties,
        });
    }

    if skipped > 0 {
        warn!(layer = %name, skipped, "Null or unsupported shapes were skipped");
    }

    Ok(Layer::new(name, detect_epsg(path), features))
}

fn field_to_string(value: FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        FieldValue::Numeric(Some(n)) => Some(n.to_string()),
        FieldValue::Float(Some(f)) => Some(f.to_string()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Double(d) => Some(d.to_string()),
        FieldValue::Logical(Some(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Fichier `.prj` compagnon (extension en minuscules ou majuscules)
fn prj_path(shp: &Path) -> Option<PathBuf> {
    ["prj", "PRJ"]
        .iter()
        .map(|ext| shp.with_extension(ext))
        .find(|p| p.exists())
}

/// EPSG d'un shapefile d'après son `.prj`, `None` si absent ou inconnu
pub fn detect_epsg(shp: &Path) -> Option<u32> {
    let wkt = std::fs::read_to_string(prj_path(shp)?).ok()?;
    let epsg = epsg_from_wkt(&wkt);
    if epsg.is_none() {
        debug!(path = %shp.display(), "Unrecognised .prj content");
    }
    epsg
}

fn authority_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
    })
}

fn utm_zone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)UTM[ _]zone[ _](\d{1,2})([NS])").expect("valid regex"))
}

/// Déduit un code EPSG d'un WKT (ESRI ou OGC)
///
/// L'autorité de plus haut niveau (la dernière du texte) prime ; à défaut,
/// les noms usuels du Brésil sont reconnus.
pub fn epsg_from_wkt(wkt: &str) -> Option<u32> {
    if let Some(code) = authority_regex()
        .captures_iter(wkt)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
    {
        return Some(code);
    }

    let upper = wkt.to_uppercase();
    let sirgas = upper.contains("SIRGAS");
    let is_projected = upper.trim_start().starts_with("PROJCS") || upper.contains("PROJCRS");

    if let Some(caps) = utm_zone_regex().captures(wkt) {
        let zone: u32 = caps.get(1)?.as_str().parse().ok()?;
        let south = caps.get(2)?.as_str().eq_ignore_ascii_case("S");
        return Some(match (sirgas, south) {
            (true, true) => 31960 + zone,
            (true, false) => 31954 + zone,
            (false, true) => 32700 + zone,
            (false, false) => 32600 + zone,
        });
    }

    if upper.contains("MERCATOR_AUXILIARY_SPHERE") || upper.contains("PSEUDO-MERCATOR") {
        return Some(3857);
    }

    if !is_projected {
        if sirgas {
            return Some(4674);
        }
        if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84") {
            return Some(4326);
        }
    }

    None
}
