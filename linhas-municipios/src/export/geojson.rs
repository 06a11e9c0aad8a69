//! Export vers GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use super::{ExportFeature, PropertyValue};

/// Exporte des features en GeoJSON
pub fn export_to_geojson(features: &[ExportFeature], epsg: u32, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_collection(&mut writer, features, epsg)?;
    writer.flush()?;
    Ok(())
}

/// Écrit une FeatureCollection complète (membre `crs` inclus)
pub fn write_collection<W: Write>(writer: &mut W, features: &[ExportFeature], epsg: u32) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        epsg
    )?;

    for (i, feature) in features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, feature: &ExportFeature) -> Result<()> {
    write!(
        writer,
        r#"{{"type":"Feature","id":"{}","#,
        escape_json(&feature.id)
    )?;

    write!(writer, r#""geometry":"#)?;
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    feature.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"#)?;
    for (i, (key, value)) in feature.properties.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        match value {
            PropertyValue::Text(s) => write!(writer, r#""{}":"{}""#, escape_json(key), escape_json(s))?,
            PropertyValue::Integer(n) => write!(writer, r#""{}":{}"#, escape_json(key), n)?,
        }
    }
    write!(writer, "}}}}")?;

    Ok(())
}

/// Échappe une chaîne pour JSON
pub(crate) fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use std::io::Cursor;

    fn feature() -> ExportFeature {
        ExportFeature {
            id: "4304606".to_string(),
            geometry: Geometry::Polygon(polygon![
                (x: -51.0, y: -30.0), (x: -50.9, y: -30.0), (x: -50.9, y: -29.9)
            ]),
            properties: vec![
                ("NM_MUN".to_string(), PropertyValue::Text("Canoas \"RS\"".to_string())),
                ("N_LINHAS".to_string(), PropertyValue::Integer(2)),
            ],
        }
    }

    #[test]
    fn test_write_feature_typed_properties() {
        let mut buffer = Cursor::new(Vec::new());
        write_feature(&mut buffer, &feature()).unwrap();

        let json = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(json.contains(r#""id":"4304606""#));
        assert!(json.contains(r#""N_LINHAS":2"#));
        assert!(json.contains(r#""NM_MUN":"Canoas \"RS\"""#));
    }

    #[test]
    fn test_collection_is_valid_json() {
        let mut buffer = Vec::new();
        write_collection(&mut buffer, &[feature(), feature()], 4326).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
        assert_eq!(value["features"].as_array().unwrap().len(), 2);
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("Iguaçu"), "Iguaçu");
        assert_eq!(escape_json("a\"b"), "a\\\"b");
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
    }

    #[test]
    fn test_export_to_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipios.geojson");
        export_to_geojson(&[feature()], 4326, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(r#"{"type":"FeatureCollection""#));
        assert!(content.ends_with("]}"));
    }
}
