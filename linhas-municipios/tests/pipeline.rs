//! Tests d'intégration : per_layer/ → consolidation → rapports et cartes

use std::path::{Path, PathBuf};

use linhas_geo::VoltageClass;
use linhas_municipios::aggregate::stats;
use linhas_municipios::export::csv::{read_table, UTF8_BOM};
use linhas_municipios::pipeline::{self, AnalyzeOptions, Workspace};
use linhas_municipios::render::ReportKind;
use linhas_municipios::{Config, ConsolidatedTable, RunReport, Selection};

fn workspace(dir: &Path) -> Workspace {
    Workspace::new(dir, Config::from_preset("default").unwrap())
}

fn write_layer(dir: &Path, stem: &str, names: &[&str]) {
    let per_layer = dir.join("per_layer");
    std::fs::create_dir_all(&per_layer).unwrap();
    let mut content = String::from("NM_MUN,CD_MUN\n");
    for (i, name) in names.iter().enumerate() {
        content.push_str(&format!("{},41000{:02}\n", name, i));
    }
    std::fs::write(per_layer.join(format!("{}.csv", stem)), content).unwrap();
}

/// Trois couches spécifiques et la couche de base
fn fixture(dir: &Path) {
    write_layer(
        dir,
        "municipios_afetados_linha_trans_500_PR",
        &["Foz do Iguaçu", "Cascavel", "Medianeira", "Cascavel"],
    );
    write_layer(dir, "municipios_afetados_linha_trans_600_PR", &["Foz do Iguaçu", "Toledo"]);
    write_layer(dir, "municipios_afetados_linha_trans_525_SC", &["Chapecó"]);
    write_layer(
        dir,
        "municipios_afetados_linhas_de_transmissao_base_PR",
        &["Foz do Iguaçu", "Cascavel", "Guaíra"],
    );
}

fn consolidate(ws: &Workspace) -> ConsolidatedTable {
    let mut report = RunReport::new("consolidate");
    pipeline::consolidate(ws, &mut report).unwrap()
}

#[test]
fn test_consolidate_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let ws = workspace(dir.path());

    let table = consolidate(&ws);
    // 3 + 2 + 1 spécifiques (doublon Cascavel retiré) + 3 base
    assert_eq!(table.len(), 9);
    assert_eq!(table.specific().count(), 6);

    let csv = std::fs::read(ws.consolidated_csv()).unwrap();
    assert!(csv.starts_with(UTF8_BOM));
    let parsed = read_table(&ws.consolidated_csv()).unwrap();
    assert_eq!(parsed.headers[0], "NM_MUN");
    assert!(parsed.column("Voltagem").is_some());
    assert_eq!(parsed.rows.len(), 9);

    let multi = read_table(&ws.multi_line_csv()).unwrap();
    assert_eq!(multi.rows.len(), 1);
    assert_eq!(multi.rows[0][0], "Foz do Iguaçu");

    assert_eq!(ws.chart().extension().unwrap(), "png");
    let png = std::fs::read(ws.chart()).unwrap();
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[test]
fn test_consolidation_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let ws = workspace(dir.path());

    consolidate(&ws);
    let first = (
        std::fs::read(ws.consolidated_csv()).unwrap(),
        std::fs::read(ws.multi_line_csv()).unwrap(),
        std::fs::read(ws.chart()).unwrap(),
    );
    consolidate(&ws);
    let second = (
        std::fs::read(ws.consolidated_csv()).unwrap(),
        std::fs::read(ws.multi_line_csv()).unwrap(),
        std::fs::read(ws.chart()).unwrap(),
    );
    assert_eq!(first, second);
}

#[test]
fn test_reloaded_table_matches_consolidation() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let ws = workspace(dir.path());

    let table = consolidate(&ws);
    let reloaded = ws.load_table().unwrap();
    assert_eq!(reloaded.rows(), table.rows());

    let specific = ConsolidatedTable::from_rows(reloaded.specific().cloned());
    let lines = stats::lines_per_municipality(&specific);
    let foz = lines.iter().find(|(k, _)| k.name == "Foz do Iguaçu").unwrap();
    assert_eq!(foz.1, 2);
}

#[test]
fn test_selection_keeps_base_rows_of_state() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let table = consolidate(&workspace(dir.path()));

    let selection = Selection::all()
        .with_states(["PR"])
        .with_voltages([VoltageClass::Kv(600)]);
    let filtered = table.select(&selection);
    assert!(filtered.rows().iter().all(|r| r.state == "PR"));
    assert_eq!(filtered.specific().count(), 2);
    assert_eq!(filtered.rows().iter().filter(|r| !r.is_specific()).count(), 3);
}

#[test]
fn test_reports_are_written() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let ws = workspace(dir.path());
    let table = consolidate(&ws);

    let mut report = RunReport::new("report");
    for kind in [ReportKind::Dashboard, ReportKind::Technical, ReportKind::Accessible] {
        let path = pipeline::write_report(&ws, kind, &table, "2026-01-01 10:00", &mut report).unwrap();
        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
    }
    let dashboard = std::fs::read_to_string(ws.outputs_dir().join(ReportKind::Dashboard.file_name())).unwrap();
    assert!(dashboard.contains("Medianeira"));

    let complete = read_table(&ws.outputs_dir().join("municipios_afetados_completo.csv")).unwrap();
    assert_eq!(complete.rows.len(), stats::complete_table(&table).len());
    assert_eq!(report.outputs.len(), 4);
}

#[test]
fn test_maps_without_geodata() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let ws = workspace(dir.path());
    let table = consolidate(&ws);

    let mut report = RunReport::new("maps");
    let entries = pipeline::generate_maps(&ws, &table, "2026-01-01 10:00", &mut report).unwrap();
    assert_eq!(entries.len(), table.combinations().len());

    let index = std::fs::read_to_string(ws.maps_dir().join("index.html")).unwrap();
    assert!(index.contains("mapa_500kV_PR.html"));
    assert!(ws.maps_dir().join("mapa_525kV_SC.html").exists());
}

#[test]
fn test_stats_requires_consolidation() {
    let dir = tempfile::tempdir().unwrap();
    assert!(pipeline::stats(&workspace(dir.path())).is_err());
}

// ----------------------------------------------------------------------------
// analyze sur des fixtures GeoJSON
// ----------------------------------------------------------------------------

const SQUARES: [(&str, &str, f64); 3] = [
    ("Alfa", "4100001", -54.6),
    ("Beta", "4100002", -54.5),
    ("Gama", "4100003", -54.4),
];

fn ring(x0: f64) -> serde_json::Value {
    let (y0, size) = (-25.6, 0.1);
    serde_json::json!([[
        [x0, y0],
        [x0 + size, y0],
        [x0 + size, y0 + size],
        [x0, y0 + size],
        [x0, y0]
    ]])
}

fn write_geodata(dir: &Path) -> (PathBuf, PathBuf) {
    let muns: Vec<serde_json::Value> = SQUARES
        .iter()
        .map(|(name, code, x0)| {
            serde_json::json!({
                "type": "Feature",
                "properties": { "NM_MUN": name, "CD_MUN": code, "SIGLA_UF": "PR" },
                "geometry": { "type": "Polygon", "coordinates": ring(*x0) }
            })
        })
        .collect();
    let muns_path = dir.join("municipios_pr.geojson");
    std::fs::write(
        &muns_path,
        serde_json::json!({ "type": "FeatureCollection", "features": muns }).to_string(),
    )
    .unwrap();

    let lines = serde_json::json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "Nome": "LT 500 kV Foz - Cascavel", "Tensao": 500 },
            "geometry": { "type": "LineString", "coordinates": [[-54.58, -25.55], [-54.45, -25.55]] }
        }]
    });
    let lines_path = dir.join("linha_trans_500_PR.geojson");
    std::fs::write(&lines_path, lines.to_string()).unwrap();

    (lines_path, muns_path)
}

#[test]
fn test_analyze_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (lines, municipalities) = write_geodata(dir.path());
    let ws = workspace(dir.path());

    let mut report = RunReport::new("analyze");
    let options = AnalyzeOptions {
        lines: Some(lines),
        municipalities: Some(municipalities),
    };
    let table = pipeline::analyze(&ws, &options, &mut report).unwrap();

    let names: Vec<&str> = table.rows().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Alfa", "Beta"]);
    assert!(table.rows().iter().all(|r| r.voltage == VoltageClass::Kv(500) && r.state == "PR"));
    assert!(ws
        .per_layer_dir()
        .join("municipios_afetados_linha_trans_500_PR.csv")
        .exists());
    assert_eq!(report.by_layer["linha_trans_500_PR"].municipalities, 2);
}

#[test]
fn test_analyze_keeps_voltage_of_each_line() {
    let dir = tempfile::tempdir().unwrap();
    let (_, municipalities) = write_geodata(dir.path());
    let feature = |name: &str, kv: u32, x0: f64, x1: f64| {
        serde_json::json!({
            "type": "Feature",
            "properties": { "Nome": name, "Tensao": kv },
            "geometry": { "type": "LineString", "coordinates": [[x0, -25.55], [x1, -25.55]] }
        })
    };
    let lines = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            feature("LT 500 kV Foz - Cascavel", 500, -54.58, -54.45),
            feature("LT 230 kV Cascavel Oeste", 230, -54.48, -54.42),
        ]
    });
    let lines_path = dir.path().join("linhas_transmissao_PR.geojson");
    std::fs::write(&lines_path, lines.to_string()).unwrap();

    let ws = workspace(dir.path());
    let mut report = RunReport::new("analyze");
    let options = AnalyzeOptions {
        lines: Some(lines_path),
        municipalities: Some(municipalities),
    };
    let table = pipeline::analyze(&ws, &options, &mut report).unwrap();

    let mut rows: Vec<(String, VoltageClass)> = table
        .rows()
        .iter()
        .map(|r| (r.name.clone(), r.voltage.clone()))
        .collect();
    rows.sort();
    assert_eq!(
        rows,
        vec![
            ("Alfa".to_string(), VoltageClass::Kv(500)),
            ("Beta".to_string(), VoltageClass::Kv(230)),
            ("Beta".to_string(), VoltageClass::Kv(500)),
        ]
    );
    assert!(table.rows().iter().all(|r| r.state == "PR"));

    let per_layer = ws.per_layer_dir();
    let kv500 = read_table(&per_layer.join("municipios_afetados_linhas_transmissao_PR_500.csv")).unwrap();
    let kv230 = read_table(&per_layer.join("municipios_afetados_linhas_transmissao_PR_230.csv")).unwrap();
    assert_eq!(kv500.rows.len(), 2);
    assert_eq!(kv230.rows.len(), 1);
    assert_eq!(kv230.rows[0][0], "Beta");
    assert_eq!(report.by_layer["linhas_transmissao_PR"].municipalities, 2);

    let specific = ConsolidatedTable::from_rows(table.specific().cloned());
    let lines = stats::lines_per_municipality(&specific);
    let alfa = lines.iter().find(|(k, _)| k.name == "Alfa").unwrap();
    let beta = lines.iter().find(|(k, _)| k.name == "Beta").unwrap();
    assert_eq!((alfa.1, beta.1), (1, 2));
}

#[test]
fn test_inspect_geojson_layer() {
    let dir = tempfile::tempdir().unwrap();
    let (lines, _) = write_geodata(dir.path());
    let aliases = Config::from_preset("default").unwrap().column_aliases();

    let text = pipeline::inspect(&lines, &aliases).unwrap();
    assert!(text.contains("Camada: linha_trans_500_PR"));
    // une couche GeoJSON n'annonce ni nombre d'entités ni CRS
    assert!(text.contains("  Features: desconhecido"));
    assert!(text.contains("  CRS: desconhecido"));
    assert!(text.contains("500 kV: 1"));
}
