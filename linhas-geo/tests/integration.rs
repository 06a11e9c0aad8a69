//! Tests d'intégration sur des fixtures générées (GeoJSON, GeoPackage)

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use linhas_geo::join::{direct_join, indexed_join};
use linhas_geo::schema::{lines_from_layer, municipalities_from_layer};
use linhas_geo::{source, BufferTable, ColumnAliases, GeometryKind, LoadOutcome, VoltageClass};
use rusqlite::{params, Connection};

// Trois communes adjacentes près de Foz do Iguaçu : A | B | C
const SQUARES: [(&str, &str, f64); 3] = [
    ("Alfa", "4100001", -54.6),
    ("Beta", "4100002", -54.5),
    ("Gama", "4100003", -54.4),
];

fn square_ring(x0: f64) -> Vec<(f64, f64)> {
    let (y0, size) = (-25.6, 0.1);
    vec![
        (x0, y0),
        (x0 + size, y0),
        (x0 + size, y0 + size),
        (x0, y0 + size),
        (x0, y0),
    ]
}

fn coords_json(coords: &[(f64, f64)]) -> serde_json::Value {
    serde_json::Value::Array(
        coords
            .iter()
            .map(|(x, y)| serde_json::json!([x, y]))
            .collect(),
    )
}

fn write_municipalities_geojson(dir: &Path) -> PathBuf {
    let features: Vec<serde_json::Value> = SQUARES
        .iter()
        .map(|(name, code, x0)| {
            serde_json::json!({
                "type": "Feature",
                "properties": { "NM_MUN": name, "CD_MUN": code.parse::<u64>().unwrap(), "SIGLA_UF": "PR" },
                "geometry": { "type": "Polygon", "coordinates": [coords_json(&square_ring(*x0))] }
            })
        })
        .collect();

    let path = dir.join("municipios_pr.geojson");
    let fc = serde_json::json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(&path, fc.to_string()).unwrap();
    path
}

fn write_lines_geojson(dir: &Path) -> PathBuf {
    let features = serde_json::json!([
        {
            "type": "Feature",
            "properties": { "Nome": "LT 500 kV Foz - Cascavel", "Tensao": 500.0 },
            "geometry": { "type": "LineString", "coordinates": coords_json(&[(-54.58, -25.55), (-54.45, -25.55)]) }
        },
        {
            "type": "Feature",
            "properties": { "Nome": "LT 230 kV Beta", "Tensao": "230" },
            "geometry": { "type": "LineString", "coordinates": coords_json(&[(-54.48, -25.58), (-54.42, -25.52)]) }
        }
    ]);

    let path = dir.join("linhas.geojson");
    let fc = serde_json::json!({ "type": "FeatureCollection", "features": features });
    std::fs::write(&path, fc.to_string()).unwrap();
    path
}

// En-tête GeoPackage (GP, version 0, little endian, sans enveloppe) + WKB
fn gpkg_blob(srs_id: i32, wkb: &[u8]) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0x01];
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.extend_from_slice(wkb);
    blob
}

fn wkb_points(out: &mut Vec<u8>, coords: &[(f64, f64)]) {
    out.extend_from_slice(&(coords.len() as u32).to_le_bytes());
    for (x, y) in coords {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
}

fn wkb_polygon(ring: &[(f64, f64)]) -> Vec<u8> {
    let mut wkb = vec![1u8];
    wkb.extend_from_slice(&3u32.to_le_bytes());
    wkb.extend_from_slice(&1u32.to_le_bytes());
    wkb_points(&mut wkb, ring);
    wkb
}

fn wkb_linestring(coords: &[(f64, f64)]) -> Vec<u8> {
    let mut wkb = vec![1u8];
    wkb.extend_from_slice(&2u32.to_le_bytes());
    wkb_points(&mut wkb, coords);
    wkb
}

fn write_gpkg(dir: &Path) -> PathBuf {
    let path = dir.join("linhas_recortadas.gpkg");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE gpkg_spatial_ref_sys (
             srs_name TEXT, srs_id INTEGER PRIMARY KEY, organization TEXT,
             organization_coordsys_id INTEGER, definition TEXT);
         CREATE TABLE gpkg_contents (
             table_name TEXT PRIMARY KEY, data_type TEXT, identifier TEXT, srs_id INTEGER);
         CREATE TABLE gpkg_geometry_columns (
             table_name TEXT, column_name TEXT, geometry_type_name TEXT,
             srs_id INTEGER, z INTEGER, m INTEGER);
         INSERT INTO gpkg_spatial_ref_sys VALUES ('SIRGAS 2000', 4674, 'EPSG', 4674, '');
         INSERT INTO gpkg_contents VALUES ('municipios_afetados', 'features', 'municipios_afetados', 4674);
         INSERT INTO gpkg_contents VALUES ('linha_trans_500_PR', 'features', 'linha_trans_500_PR', 4674);
         INSERT INTO gpkg_geometry_columns VALUES ('municipios_afetados', 'geom', 'POLYGON', 4674, 0, 0);
         INSERT INTO gpkg_geometry_columns VALUES ('linha_trans_500_PR', 'geom', 'LINESTRING', 4674, 0, 0);
         CREATE TABLE municipios_afetados (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB, NM_MUN TEXT, UF TEXT);
         CREATE TABLE linha_trans_500_PR (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom BLOB, Nome TEXT);",
    )
    .unwrap();

    for (name, _, x0) in SQUARES {
        conn.execute(
            "INSERT INTO municipios_afetados (geom, NM_MUN, UF) VALUES (?1, ?2, 'PR')",
            params![gpkg_blob(4674, &wkb_polygon(&square_ring(x0))), name],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO linha_trans_500_PR (geom, Nome) VALUES (?1, 'LT 500 kV Foz - Cascavel')",
        params![gpkg_blob(4674, &wkb_linestring(&[(-54.58, -25.55), (-54.45, -25.55)]))],
    )
    .unwrap();
    // Géométrie NULL ignorée à la lecture
    conn.execute("INSERT INTO linha_trans_500_PR (geom, Nome) VALUES (NULL, 'vide')", [])
        .unwrap();

    path
}

fn names(indices: &BTreeSet<usize>, muns: &[linhas_geo::Municipality]) -> Vec<String> {
    indices.iter().map(|&i| muns[i].name.clone()).collect()
}

#[test]
fn test_geojson_scenario_direct_join() {
    let dir = tempfile::tempdir().unwrap();
    let mun_path = write_municipalities_geojson(dir.path());
    let lines_path = write_lines_geojson(dir.path());

    let aliases = ColumnAliases::default();
    let mun_layer = source::find_layer(&mun_path, GeometryKind::Polygon)
        .required("municipalities")
        .unwrap();
    let line_layer = source::find_layer(&lines_path, GeometryKind::Line)
        .required("lines")
        .unwrap();
    assert_eq!(mun_layer.epsg, Some(4326));

    let muns = municipalities_from_layer(&mun_layer, &aliases, None);
    let lines = lines_from_layer(&line_layer, &aliases, None);
    assert_eq!(muns[0].code.as_deref(), Some("4100001"));
    assert_eq!(lines[0].voltage, VoltageClass::Kv(500));
    assert_eq!(lines[1].voltage, VoltageClass::Kv(230));

    let result = direct_join(&lines, &muns);
    let by_line = |line: usize| -> BTreeSet<usize> {
        result
            .intersections
            .iter()
            .filter(|i| i.line == line)
            .map(|i| i.municipality)
            .collect()
    };

    assert_eq!(names(&by_line(0), &muns), vec!["Alfa", "Beta"]);
    assert_eq!(names(&by_line(1), &muns), vec!["Beta"]);
    assert_eq!(names(&result.affected_municipalities(), &muns), vec!["Alfa", "Beta"]);
    assert_eq!(result.lines_per_municipality().get(&1), Some(&2));
}

#[test]
fn test_indexed_join_is_superset() {
    let dir = tempfile::tempdir().unwrap();
    let aliases = ColumnAliases::default();
    let muns = municipalities_from_layer(
        &source::read_layer(&write_municipalities_geojson(dir.path()), None).unwrap(),
        &aliases,
        None,
    );
    let lines = lines_from_layer(
        &source::read_layer(&write_lines_geojson(dir.path()), None).unwrap(),
        &aliases,
        None,
    );

    let direct: BTreeSet<_> = direct_join(&lines, &muns).intersections.into_iter().collect();
    let indexed = indexed_join(&lines, &muns, &BufferTable::default());
    let indexed_set: BTreeSet<_> = indexed.intersections.iter().copied().collect();

    assert!(direct.is_subset(&indexed_set));
    assert!(indexed.degraded_lines.is_empty());
    // Lignes à plusieurs kilomètres de Gama : aucune faixa ne l'atteint
    assert!(indexed_set.iter().all(|i| muns[i.municipality].name != "Gama"));
}

#[test]
fn test_gpkg_layers_and_selection() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_gpkg(dir.path());

    let layers = source::list_layers(&path).unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0].name, "municipios_afetados");
    assert_eq!(layers[0].feature_count, Some(3));
    assert_eq!(layers[1].epsg, Some(4674));

    let lines = match source::find_layer(&path, GeometryKind::Line) {
        LoadOutcome::Loaded(layer) => layer,
        other => panic!("expected a line layer, got {}", other.describe()),
    };
    assert_eq!(lines.name, "linha_trans_500_PR");
    assert_eq!(lines.len(), 1);
    assert_eq!(
        VoltageClass::from_layer_name(&lines.name),
        Some(VoltageClass::Kv(500))
    );

    let muns = source::find_layer(&path, GeometryKind::Polygon)
        .required("municipalities")
        .unwrap();
    let muns = municipalities_from_layer(&muns, &ColumnAliases::default(), None);
    assert_eq!(muns.len(), 3);
    assert_eq!(muns[2].name, "Gama");
    assert_eq!(muns[2].state.as_deref(), Some("PR"));
}

#[test]
fn test_load_normalized_keeps_sirgas_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_gpkg(dir.path());

    let layer = linhas_geo::load_normalized(&path, Some("municipios_afetados"), GeometryKind::Polygon)
        .required("municipalities")
        .unwrap();
    assert_eq!(layer.epsg, Some(4326));

    let muns = municipalities_from_layer(&layer, &ColumnAliases::default(), None);
    let geo::Geometry::Polygon(first) = &muns[0].geometry else {
        panic!("expected a polygon");
    };
    let corner = first.exterior().0[0];
    assert!((corner.x + 54.6).abs() < 1e-9);
    assert!((corner.y + 25.6).abs() < 1e-9);
}

#[test]
fn test_missing_optional_layer_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_gpkg(dir.path());

    let outcome = source::load(&dir.path().join("faixa_servidao.gpkg"), Some("linha_transmissao_500"))
        .or_else(|| source::load(&path, Some("linha_trans_500_PR")));
    assert!(outcome.is_loaded());

    let missing = source::load(&path, Some("linha_trans_765_PR"));
    assert!(matches!(missing, LoadOutcome::Failed(_)));
}
