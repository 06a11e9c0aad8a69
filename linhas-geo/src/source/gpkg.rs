//! Lecture GeoPackage via SQLite
//!
//! Les couches sont les entrées `features` de `gpkg_contents`. Les blobs
//! géométriques (en-tête GeoPackage + WKB) sont décodés avec geozero.

use std::collections::BTreeMap;
use std::path::Path;

use geozero::wkb::GpkgWkb;
use geozero::ToGeo;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use crate::types::{Feature, Layer, LayerInfo};
use crate::GeoError;

/// Colonne géométrique d'une table de features
#[derive(Debug, Clone)]
struct GeometryColumn {
    table: String,
    column: String,
    geometry_type: String,
    srs_id: i64,
}

fn open(path: &Path) -> Result<Connection, GeoError> {
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// Échappe un identifiant SQL entre guillemets doubles
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn geometry_columns(conn: &Connection) -> Result<Vec<GeometryColumn>, GeoError> {
    let mut stmt = conn.prepare(
        "SELECT c.table_name, g.column_name, g.geometry_type_name, g.srs_id \
         FROM gpkg_contents c \
         JOIN gpkg_geometry_columns g ON g.table_name = c.table_name \
         WHERE lower(c.data_type) = 'features' \
         ORDER BY c.rowid",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(GeometryColumn {
            table: row.get(0)?,
            column: row.get(1)?,
            geometry_type: row.get(2)?,
            srs_id: row.get(3)?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Résout un srs_id GeoPackage en code EPSG
fn resolve_epsg(conn: &Connection, srs_id: i64) -> Option<u32> {
    let row: Option<(String, i64)> = conn
        .query_row(
            "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
            [srs_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .ok()
        .flatten();

    match row {
        Some((org, code)) if org.eq_ignore_ascii_case("EPSG") && code > 0 => u32::try_from(code).ok(),
        Some(_) => None,
        // Table absente ou srs non déclaré : le srs_id est le plus souvent l'EPSG
        None if srs_id > 0 => u32::try_from(srs_id).ok(),
        None => None,
    }
}

/// Liste les couches de features d'un GeoPackage
pub fn list_layers(path: &Path) -> Result<Vec<LayerInfo>, GeoError> {
    let conn = open(path)?;
    let columns = geometry_columns(&conn)?;

    columns
        .into_iter()
        .map(|gc| -> Result<LayerInfo, GeoError> {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&gc.table)),
                [],
                |row| row.get(0),
            )?;
            Ok(LayerInfo {
                epsg: resolve_epsg(&conn, gc.srs_id),
                name: gc.table,
                geometry_type: Some(gc.geometry_type),
                feature_count: usize::try_from(count).ok(),
            })
        })
        .collect()
}

/// Lit une couche (ou la première) d'un GeoPackage
pub fn read_layer(path: &Path, layer: Option<&str>) -> Result<Layer, GeoError> {
    let conn = open(path)?;
    let columns = geometry_columns(&conn)?;

    let gc = match layer {
        Some(name) => columns
            .into_iter()
            .find(|gc| gc.table.eq_ignore_ascii_case(name))
            .ok_or_else(|| GeoError::layer_not_found(path.display().to_string(), name))?,
        None => columns
            .into_iter()
            .next()
            .ok_or_else(|| GeoError::NoMatchingLayer {
                path: path.display().to_string(),
                kind: "features".to_string(),
            })?,
    };

    let epsg = resolve_epsg(&conn, gc.srs_id);
    let pk = primary_key(&conn, &gc.table)?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(&gc.table)))?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let geom_idx = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case(&gc.column))
        .ok_or_else(|| GeoError::invalid_geometry(&gc.table, "geometry column not found"))?;
    let pk_idx = pk
        .as_deref()
        .and_then(|pk| names.iter().position(|n| n.eq_ignore_ascii_case(pk)));

    let mut features = Vec::new();
    let mut skipped = 0usize;
    let mut rows = stmt.query([])?;
    let mut index = 0usize;

    while let Some(row) = rows.next()? {
        index += 1;
        let id = match pk_idx.map(|i| row.get_ref(i)).transpose()? {
            Some(value) => value_to_string(value).unwrap_or_else(|| index.to_string()),
            None => index.to_string(),
        };

        let geometry = match row.get_ref(geom_idx)? {
            ValueRef::Blob(blob) => match GpkgWkb(blob.to_vec()).to_geo() {
                Ok(geometry) => geometry,
                Err(e) => {
                    debug!(layer = %gc.table, id = %id, error = %e, "Undecodable geometry");
                    skipped += 1;
                    continue;
                }
            },
            _ => {
                skipped += 1;
                continue;
            }
        };

        let mut properties = BTreeMap::new();
        for (i, name) in names.iter().enumerate() {
            if i == geom_idx || Some(i) == pk_idx {
                continue;
            }
            if let Some(value) = value_to_string(row.get_ref(i)?) {
                properties.insert(name.clone(), value);
            }
        }

        features.push(Feature {
            id,
            geometry,
            properties,
        });
    }

    if skipped > 0 {
        warn!(layer = %gc.table, skipped, "Features without usable geometry were skipped");
    }

    Ok(Layer::new(gc.table, epsg, features))
}

/// Colonne clé primaire entière (fid) d'une table
fn primary_key(conn: &Connection, table: &str) -> Result<Option<String>, GeoError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| {
        let name: String = row.get(1)?;
        let pk: i64 = row.get(5)?;
        Ok((name, pk))
    })?;

    for row in rows {
        let (name, pk) = row?;
        if pk > 0 {
            return Ok(Some(name));
        }
    }
    Ok(None)
}

/// Convertit une valeur SQLite en texte (NULL et blobs ignorés)
fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("linha_trans_500"), "\"linha_trans_500\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(ValueRef::Integer(500)), Some("500".to_string()));
        assert_eq!(value_to_string(ValueRef::Real(500.0)), Some("500".to_string()));
        assert_eq!(value_to_string(ValueRef::Real(2.5)), Some("2.5".to_string()));
        assert_eq!(
            value_to_string(ValueRef::Text(b"Foz do Igua\xc3\xa7u")),
            Some("Foz do Iguaçu".to_string())
        );
        assert_eq!(value_to_string(ValueRef::Null), None);
    }

    #[test]
    fn test_read_missing_file() {
        assert!(read_layer(Path::new("nope.gpkg"), None).is_err());
    }
}
