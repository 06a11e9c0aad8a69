//! Export ESRI Shapefile (polygones + DBF + `.prj` WGS84)

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::Geometry;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};

use super::{ExportFeature, PropertyValue};

/// WKT écrit dans le `.prj`
pub const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// Largeur maximale d'un champ caractère DBF
const MAX_CHAR_WIDTH: usize = 254;

#[derive(Debug, Clone, PartialEq)]
enum FieldKind {
    Character(u8),
    Numeric,
}

/// Champs DBF déduits des attributs de la première feature
///
/// Largeur caractère = plus longue valeur (en octets), bornée à 254.
fn field_layout(features: &[ExportFeature]) -> Vec<(String, FieldKind)> {
    let Some(first) = features.first() else {
        return Vec::new();
    };

    first
        .properties
        .iter()
        .map(|(name, value)| {
            let kind = match value {
                PropertyValue::Integer(_) => FieldKind::Numeric,
                PropertyValue::Text(_) => {
                    let width = features
                        .iter()
                        .filter_map(|f| f.properties.iter().find(|(n, _)| n == name))
                        .map(|(_, v)| match v {
                            PropertyValue::Text(s) => s.len(),
                            PropertyValue::Integer(n) => n.to_string().len(),
                        })
                        .max()
                        .unwrap_or(1)
                        .clamp(1, MAX_CHAR_WIDTH);
                    FieldKind::Character(width as u8)
                }
            };
            (name.clone(), kind)
        })
        .collect()
}

fn field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|e| anyhow!("Invalid DBF field name '{}': {:?}", name, e))
}

fn to_shape(geometry: &Geometry) -> Option<shapefile::Polygon> {
    match geometry {
        Geometry::Polygon(p) => Some(shapefile::Polygon::from(p.clone())),
        Geometry::MultiPolygon(mp) => Some(shapefile::Polygon::from(mp.clone())),
        _ => None,
    }
}

/// Écrit les features polygonales dans `output_path` (`.shp`, `.shx`, `.dbf`, `.prj`)
///
/// Les géométries non polygonales sont ignorées. Retourne le nombre de
/// features écrites.
pub fn export_to_shapefile(features: &[ExportFeature], output_path: &Path) -> Result<usize> {
    if features.is_empty() {
        bail!("No feature to write in {}", output_path.display());
    }

    let mut builder = TableWriterBuilder::new();
    let layout = field_layout(features);
    for (name, kind) in &layout {
        builder = match kind {
            FieldKind::Character(width) => builder.add_character_field(field_name(name)?, *width),
            FieldKind::Numeric => builder.add_numeric_field(field_name(name)?, 10, 0),
        };
    }

    let mut writer = shapefile::Writer::from_path(output_path, builder)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    let mut written = 0;
    for feature in features {
        let Some(shape) = to_shape(&feature.geometry) else {
            tracing::warn!(id = %feature.id, "Non-polygon geometry skipped in shapefile export");
            continue;
        };

        let mut record = Record::default();
        for (name, kind) in &layout {
            let value = feature.properties.iter().find(|(n, _)| n == name).map(|(_, v)| v);
            let field = match (kind, value) {
                (FieldKind::Numeric, Some(PropertyValue::Integer(n))) => FieldValue::Numeric(Some(*n as f64)),
                (FieldKind::Numeric, _) => FieldValue::Numeric(None),
                (FieldKind::Character(_), Some(PropertyValue::Text(s))) => FieldValue::Character(Some(s.clone())),
                (FieldKind::Character(_), Some(PropertyValue::Integer(n))) => {
                    FieldValue::Character(Some(n.to_string()))
                }
                (FieldKind::Character(_), None) => FieldValue::Character(None),
            };
            record.insert(name.clone(), field);
        }

        writer
            .write_shape_and_record(&shape, &record)
            .with_context(|| format!("Cannot write feature {}", feature.id))?;
        written += 1;
    }

    let prj = output_path.with_extension("prj");
    std::fs::write(&prj, WGS84_PRJ).with_context(|| format!("Cannot write {}", prj.display()))?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn feature(name: &str, lines: i64) -> ExportFeature {
        ExportFeature {
            id: name.to_string(),
            geometry: Geometry::Polygon(polygon![
                (x: -52.0, y: -30.0), (x: -51.0, y: -30.0), (x: -51.0, y: -29.0), (x: -52.0, y: -29.0)
            ]),
            properties: vec![
                ("NM_MUN".to_string(), PropertyValue::Text(name.to_string())),
                ("N_LINHAS".to_string(), PropertyValue::Integer(lines)),
            ],
        }
    }

    #[test]
    fn test_field_layout_widths() {
        let layout = field_layout(&[feature("Canoas", 1), feature("Santa Vitória do Palmar", 2)]);
        assert_eq!(layout[0], ("NM_MUN".to_string(), FieldKind::Character(24)));
        assert_eq!(layout[1], ("N_LINHAS".to_string(), FieldKind::Numeric));
    }

    #[test]
    fn test_export_writes_sidecar_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipios_afetados.shp");

        let written = export_to_shapefile(&[feature("Canoas", 1), feature("Pelotas", 3)], &path).unwrap();
        assert_eq!(written, 2);
        for ext in ["shp", "shx", "dbf", "prj"] {
            assert!(path.with_extension(ext).exists(), "missing .{}", ext);
        }

        let shapes = shapefile::read_shapes_as::<_, shapefile::Polygon>(&path).unwrap();
        assert_eq!(shapes.len(), 2);
    }

    #[test]
    fn test_export_empty_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(export_to_shapefile(&[], &dir.path().join("vazio.shp")).is_err());
    }
}
