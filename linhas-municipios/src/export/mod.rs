//! Exports : CSV, GeoJSON, Shapefile

pub mod csv;
pub mod geojson;
pub mod shapefile;

use std::collections::HashMap;

use geo::Geometry;
use linhas_geo::Municipality;

/// Valeur d'attribut exportée
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
}

/// Feature prête à l'export, attributs dans l'ordre des colonnes
#[derive(Debug, Clone)]
pub struct ExportFeature {
    pub id: String,
    pub geometry: Geometry,
    pub properties: Vec<(String, PropertyValue)>,
}

/// Communes touchées avec leur nombre de lignes (`N_LINHAS`)
///
/// `counts` associe l'indice de la commune au nombre de lignes ; l'ordre
/// de sortie suit l'ordre des communes.
pub fn affected_features(
    municipalities: &[Municipality],
    counts: &HashMap<usize, usize>,
) -> Vec<ExportFeature> {
    municipalities
        .iter()
        .enumerate()
        .filter_map(|(i, m)| {
            let lines = *counts.get(&i)?;
            Some(ExportFeature {
                id: m.code.clone().unwrap_or_else(|| i.to_string()),
                geometry: m.geometry.clone(),
                properties: vec![
                    ("NM_MUN".to_string(), PropertyValue::Text(m.name.clone())),
                    (
                        "CD_MUN".to_string(),
                        PropertyValue::Text(m.code.clone().unwrap_or_default()),
                    ),
                    (
                        "UF".to_string(),
                        PropertyValue::Text(m.state.clone().unwrap_or_default()),
                    ),
                    ("N_LINHAS".to_string(), PropertyValue::Integer(lines as i64)),
                ],
            })
        })
        .collect()
}
