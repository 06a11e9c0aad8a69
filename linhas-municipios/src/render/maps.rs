//! Cartes Leaflet par combinaison (tension, UF) et page d'index
//!
//! Chaque carte embarque ses couches en GeoJSON : communes touchées,
//! communes non touchées de l'UF (masquées), lignes, faixa de servidão et
//! limite de l'État. Les sources manquantes sont remplacées par des
//! solutions de repli ; une couche introuvable est simplement omise.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::{BoundingRect, Geometry, Intersects, Rect};
use linhas_geo::schema::{self, match_key};
use linhas_geo::{corridor, discover, normalize, reproject, GeometryKind, LoadOutcome, VoltageClass};
use rayon::prelude::*;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::escape_html;
use crate::aggregate::ConsolidatedTable;
use crate::config::Config;
use crate::export::geojson::write_collection;
use crate::export::{ExportFeature, PropertyValue};

pub const LEAFLET_JS: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.js";
pub const LEAFLET_CSS: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.9.4/leaflet.css";

/// Couche de communes de base (toutes tensions)
pub const BASE_MUNICIPALITY_LAYER: &str = "municipios_afetados_linhas_de_transmissao_base";

pub fn map_file_name(voltage: &VoltageClass, uf: &str) -> String {
    format!("mapa_{}kV_{}.html", voltage, uf)
}

/// Emplacements des données cartographiques
#[derive(Debug, Clone)]
pub struct MapSources {
    pub base_dir: PathBuf,
    pub municipalities_gpkg: PathBuf,
    pub lines_gpkg: PathBuf,
    pub corridor_gpkg: PathBuf,
    pub states_dir: PathBuf,
}

impl MapSources {
    pub fn from_config(config: &Config, base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            municipalities_gpkg: base_dir.join(&config.paths.municipalities_gpkg),
            lines_gpkg: base_dir.join(&config.paths.lines_gpkg),
            corridor_gpkg: base_dir.join(&config.paths.corridor_gpkg),
            states_dir: base_dir.join(&config.paths.states_dir),
        }
    }
}

/// Une couche de carte prête à sérialiser
#[derive(Debug, Clone)]
pub struct MapLayer {
    pub name: String,
    pub show: bool,
    pub style: Value,
    /// (attribut, libellé) de l'infobulle
    pub tooltip: Option<(String, String)>,
    pub features: Vec<ExportFeature>,
}

/// Contenu d'une carte
#[derive(Debug, Clone)]
pub struct MapData {
    pub voltage: VoltageClass,
    pub state: String,
    /// Communes touchées selon la table consolidée
    pub affected_count: usize,
    pub layers: Vec<MapLayer>,
    pub bounds: Option<Rect>,
}

/// Carte générée (pour l'index)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub voltage: VoltageClass,
    pub state: String,
    pub file_name: String,
    pub affected_count: usize,
}

fn text_feature(id: String, geometry: Geometry, props: &[(&str, &str)]) -> ExportFeature {
    ExportFeature {
        id,
        geometry,
        properties: props
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::Text(v.to_string())))
            .collect(),
    }
}

/// Charge une couche nommée si le conteneur existe
fn load_named(path: &Path, layer: &str, kind: GeometryKind) -> LoadOutcome {
    if !path.exists() {
        return LoadOutcome::Empty {
            source: path.display().to_string(),
        };
    }
    linhas_geo::load_normalized(path, Some(layer), kind)
}

/// Communes d'une UF (celles sans UF connue sont conservées)
fn municipalities_of_state(outcome: LoadOutcome, config: &Config, uf: &str) -> Vec<linhas_geo::Municipality> {
    let Some(layer) = outcome.loaded() else {
        return Vec::new();
    };
    schema::municipalities_from_layer(&layer, &config.column_aliases(), None)
        .into_iter()
        .filter(|m| m.state.as_deref().map_or(true, |s| s.eq_ignore_ascii_case(uf)))
        .collect()
}

/// Géométrie simplifiée ; `None` si elle disparaît
fn simplified(geometry: &Geometry, tolerance_m: f64) -> Option<Geometry> {
    normalize::simplify_metric(geometry, tolerance_m)
}

fn merge_bounds(acc: Option<Rect>, geometry: &Geometry) -> Option<Rect> {
    let Some(rect) = geometry.bounding_rect() else {
        return acc;
    };
    Some(match acc {
        None => rect,
        Some(a) => Rect::new(
            (a.min().x.min(rect.min().x), a.min().y.min(rect.min().y)),
            (a.max().x.max(rect.max().x), a.max().y.max(rect.max().y)),
        ),
    })
}

/// Communes non touchées : noms absents de `affected` (sans casse)
pub fn unaffected(
    all: Vec<linhas_geo::Municipality>,
    affected: &[linhas_geo::Municipality],
) -> Vec<linhas_geo::Municipality> {
    let names: HashSet<String> = affected.iter().map(|m| match_key(&m.name)).collect();
    all.into_iter()
        .filter(|m| !names.contains(&match_key(&m.name)))
        .collect()
}

/// Lignes de repli gardées si elles touchent une commune de l'UF
pub fn lines_touching(
    lines: Vec<linhas_geo::TransmissionLine>,
    municipalities: &[linhas_geo::Municipality],
) -> Vec<linhas_geo::TransmissionLine> {
    if municipalities.is_empty() {
        return lines;
    }
    lines
        .into_iter()
        .filter(|l| municipalities.iter().any(|m| l.geometry.intersects(&m.geometry)))
        .collect()
}

impl MapData {
    /// Rassemble les couches d'une combinaison (tension, UF)
    pub fn collect(
        sources: &MapSources,
        config: &Config,
        voltage: &VoltageClass,
        uf: &str,
        affected_count: usize,
    ) -> Self {
        let tol = &config.simplify_meters;
        let color = config.voltage_color(voltage).to_string();
        let aliases = config.column_aliases();
        let mut layers = Vec::new();

        // Communes touchées : couche de la tension, sinon couche de base
        let affected_layer = format!("municipios_afetados_linha_trans_{}", voltage);
        let affected = municipalities_of_state(
            load_named(&sources.municipalities_gpkg, &affected_layer, GeometryKind::Polygon).or_else(|| {
                load_named(&sources.municipalities_gpkg, BASE_MUNICIPALITY_LAYER, GeometryKind::Polygon)
            }),
            config,
            uf,
        );

        // Fond : toutes les communes de l'UF
        let tokens = config.state_tokens(uf);
        if let Some(path) = discover::find_state_municipalities(&sources.states_dir, &sources.base_dir, &tokens) {
            let all = municipalities_of_state(
                linhas_geo::load_normalized(&path, None, GeometryKind::Polygon),
                config,
                uf,
            );
            let features: Vec<ExportFeature> = unaffected(all, &affected)
                .into_iter()
                .enumerate()
                .filter_map(|(i, m)| {
                    let g = simplified(&m.geometry, tol.unaffected)?;
                    Some(text_feature(i.to_string(), g, &[("NM_MUN", m.name.as_str()), ("UF", uf)]))
                })
                .collect();
            if !features.is_empty() {
                layers.push(MapLayer {
                    name: format!("Municípios não afetados ({})", uf),
                    show: false,
                    style: json!({ "fillColor": "#e2e8f0", "color": "#b8c2cc", "weight": 1, "fillOpacity": 0.35 }),
                    tooltip: None,
                    features,
                });
            }
        }

        let mut bounds = None;
        let affected_features: Vec<ExportFeature> = affected
            .iter()
            .enumerate()
            .filter_map(|(i, m)| {
                let g = simplified(&m.geometry, tol.affected)?;
                Some(text_feature(i.to_string(), g, &[("NM_MUN", m.name.as_str()), ("UF", uf)]))
            })
            .collect();
        let affected_bounds = affected_features
            .iter()
            .fold(None, |acc, f| merge_bounds(acc, &f.geometry));
        if !affected_features.is_empty() {
            layers.push(MapLayer {
                name: format!("Municípios ({} kV - {})", voltage, uf),
                show: true,
                style: json!({ "fillColor": color, "color": "#000000", "weight": 1, "fillOpacity": 0.25 }),
                tooltip: Some(("NM_MUN".to_string(), "Município:".to_string())),
                features: affected_features,
            });
        }

        // Lignes : couche par UF, sinon couche par tension filtrée sur l'UF
        let state_layer = format!("linha_trans_{}_{}", voltage, uf);
        let lines = match load_named(&sources.lines_gpkg, &state_layer, GeometryKind::Line).loaded() {
            Some(layer) => schema::lines_from_layer(&layer, &aliases, Some(voltage)),
            None => {
                let fallback = format!("linha_transmissao_{}", voltage);
                load_named(&sources.corridor_gpkg, &fallback, GeometryKind::Line)
                    .loaded()
                    .map(|layer| lines_touching(schema::lines_from_layer(&layer, &aliases, Some(voltage)), &affected))
                    .unwrap_or_default()
            }
        };

        if !lines.is_empty() {
            let line_features: Vec<ExportFeature> = lines
                .iter()
                .enumerate()
                .filter_map(|(i, l)| {
                    let g = simplified(&l.geometry, tol.lines)?;
                    Some(text_feature(i.to_string(), g, &[("Nome", l.name.as_str())]))
                })
                .collect();
            bounds = line_features.iter().fold(None, |acc, f| merge_bounds(acc, &f.geometry));
            layers.push(MapLayer {
                name: format!("Linha de Transmissão ({} kV)", voltage),
                show: true,
                style: json!({ "color": color, "weight": 3, "opacity": 0.9 }),
                tooltip: Some(("Nome".to_string(), "Linha:".to_string())),
                features: line_features,
            });

            let distance = config.buffer_table().distance_for(voltage);
            let corridor_features: Vec<ExportFeature> = lines
                .iter()
                .enumerate()
                .filter_map(|(i, l)| match corridor::corridor_wgs84(&l.geometry, distance) {
                    Ok(Some(mp)) => {
                        let g = simplified(&Geometry::MultiPolygon(mp), tol.corridor)?;
                        Some(text_feature(i.to_string(), g, &[]))
                    }
                    Ok(None) => None,
                    Err(e) => {
                        debug!(line = %l.name, error = %e, "Corridor skipped");
                        None
                    }
                })
                .collect();
            if !corridor_features.is_empty() {
                layers.push(MapLayer {
                    name: format!("Faixa de Servidão ({} kV)", voltage),
                    show: true,
                    style: json!({ "fillColor": color, "color": color, "weight": 1, "fillOpacity": 0.15, "opacity": 0.4 }),
                    tooltip: None,
                    features: corridor_features,
                });
            }
        }

        // Limite de l'État : shapefile dédié, sinon communes de base de l'UF
        let boundary = discover::find_state_boundary(&sources.states_dir, &sources.base_dir, &tokens)
            .and_then(|path| linhas_geo::load_normalized(&path, None, GeometryKind::Polygon).loaded())
            .map(|layer| layer.features.into_iter().map(|f| f.geometry).collect::<Vec<_>>())
            .filter(|g| !g.is_empty())
            .or_else(|| {
                let base = municipalities_of_state(
                    load_named(&sources.municipalities_gpkg, BASE_MUNICIPALITY_LAYER, GeometryKind::Polygon),
                    config,
                    uf,
                );
                (!base.is_empty()).then(|| base.into_iter().map(|m| m.geometry).collect())
            })
            .unwrap_or_default();
        let boundary_features: Vec<ExportFeature> = boundary
            .iter()
            .enumerate()
            .filter_map(|(i, g)| {
                let g = simplified(g, tol.state)?;
                Some(text_feature(i.to_string(), g, &[("UF", uf)]))
            })
            .collect();
        if !boundary_features.is_empty() {
            layers.push(MapLayer {
                name: format!("Limite Estadual ({})", uf),
                show: true,
                style: json!({ "color": "#222222", "weight": 2, "fillOpacity": 0 }),
                tooltip: Some(("UF".to_string(), "UF:".to_string())),
                features: boundary_features,
            });
        }

        debug!(voltage = %voltage, uf, layers = layers.len(), "Map layers collected");

        Self {
            voltage: voltage.clone(),
            state: uf.to_string(),
            affected_count,
            layers,
            bounds: bounds.or(affected_bounds),
        }
    }
}

/// Page HTML d'une carte
pub fn render_map(data: &MapData, config: &Config) -> Result<String> {
    let mut layers_js = String::from("[");
    for (i, layer) in data.layers.iter().enumerate() {
        if i > 0 {
            layers_js.push(',');
        }
        let mut geojson = Vec::new();
        write_collection(&mut geojson, &layer.features, reproject::EPSG_WGS84)?;
        let geojson = String::from_utf8(geojson).context("GeoJSON is not UTF-8")?;
        let tooltip = match &layer.tooltip {
            Some((field, label)) => json!({ "field": field, "label": label }),
            None => Value::Null,
        };
        layers_js.push_str(&format!(
            "{{\"name\":{},\"show\":{},\"style\":{},\"tooltip\":{},\"data\":{}}}",
            Value::String(layer.name.clone()),
            layer.show,
            layer.style,
            tooltip,
            geojson
        ));
    }
    layers_js.push(']');
    let layers_js = layers_js.replace("</", "<\\/");

    let bounds = match data.bounds {
        Some(r) => format!("[[{}, {}], [{}, {}]]", r.min().y, r.min().x, r.max().y, r.max().x),
        None => "null".to_string(),
    };
    let title = format!("Linha de Transmissão {} kV - {}", data.voltage, data.state);
    let subtitle = format!("{} municípios afetados", data.affected_count);
    let map = &config.map;

    Ok(format!(
        r##"<!DOCTYPE html>
<html lang="pt-br">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <link rel="stylesheet" href="{css}" />
  <script src="{js}"></script>
  <style>
    html, body {{ margin:0; padding:0; height:100%; }}
    #map {{ position:absolute; top:0; bottom:0; left:0; right:0; }}
    .map-title {{ position:fixed; top:10px; left:50px; max-width:500px; background:#ffffff; border:2px solid #0f4c81; border-radius:8px; padding:10px 15px; box-shadow:0 2px 4px rgba(0,0,0,.2); z-index:9999; font-family:Arial, sans-serif; }}
    .map-title h3 {{ margin:0 0 5px 0; color:#0f4c81; font-size:16px; }}
    .map-title p {{ margin:0; color:#666666; font-size:12px; }}
  </style>
</head>
<body>
<div id="map"></div>
<div class="map-title"><h3>{title}</h3><p>{subtitle}</p></div>
<script>
const map = L.map('map', {{ minZoom: {min_zoom}, maxZoom: {max_zoom} }}).setView([{lat}, {lon}], {zoom});
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
L.control.scale({{ imperial: false }}).addTo(map);
const layers = {layers};
const overlays = {{}};
layers.forEach(function(def) {{
  const layer = L.geoJSON(def.data, {{
    style: function() {{ return def.style; }},
    onEachFeature: function(feature, l) {{
      if (def.tooltip && feature.properties[def.tooltip.field] !== undefined) {{
        l.bindTooltip(def.tooltip.label + ' ' + feature.properties[def.tooltip.field]);
      }}
    }}
  }});
  if (def.show) layer.addTo(map);
  overlays[def.name] = layer;
}});
L.control.layers(null, overlays, {{ position: 'topright', collapsed: false }}).addTo(map);
const bounds = {bounds};
if (bounds) map.fitBounds(bounds);
</script>
</body>
</html>
"##,
        title = escape_html(&title),
        subtitle = escape_html(&subtitle),
        css = LEAFLET_CSS,
        js = LEAFLET_JS,
        min_zoom = map.min_zoom,
        max_zoom = map.max_zoom,
        lat = map.center[0],
        lon = map.center[1],
        zoom = map.zoom,
        layers = layers_js,
        bounds = bounds,
    ))
}

/// Index des cartes, groupé par État (ordre de la configuration)
pub fn render_index(entries: &[MapEntry], config: &Config, generated_at: &str) -> String {
    let mut by_state: BTreeMap<(usize, String), Vec<&MapEntry>> = BTreeMap::new();
    for entry in entries {
        by_state
            .entry((config.state_rank(&entry.state), entry.state.clone()))
            .or_default()
            .push(entry);
    }

    let mut body = String::new();
    for ((_, uf), mut maps) in by_state {
        maps.sort_by(|a, b| a.voltage.cmp(&b.voltage));
        let name = config.state(&uf).map_or(uf.as_str(), |s| s.name.as_str());
        body.push_str(&format!(
            "<div class=\"estado-section\"><div class=\"estado-header\"><h2><span class=\"estado-nome\">{}</span> {}</h2></div>\n<div class=\"mapas-grid\">\n",
            escape_html(&uf),
            escape_html(name)
        ));
        for m in maps {
            body.push_str(&format!(
                "<div class=\"mapa-card\"><div class=\"voltagem-badge\" style=\"background:{}\">{} kV</div><p>{} municípios afetados</p><a href=\"{}\">Abrir mapa</a></div>\n",
                config.voltage_color(&m.voltage),
                m.voltage,
                m.affected_count,
                escape_html(&m.file_name)
            ));
        }
        body.push_str("</div></div>\n");
    }
    if entries.is_empty() {
        body.push_str("<p>Nenhum mapa gerado.</p>\n");
    }

    format!(
        r##"<!DOCTYPE html>
<html lang="pt-br">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Mapas - Linhas de Transmissão por Estado</title>
  <style>
    * {{ margin:0; padding:0; box-sizing:border-box; }}
    body {{ font-family:-apple-system, Segoe UI, Roboto, sans-serif; background:linear-gradient(135deg, #667eea 0%, #764ba2 100%); min-height:100vh; padding:20px; }}
    .container {{ max-width:1200px; margin:0 auto; background:#ffffff; border-radius:12px; box-shadow:0 10px 40px rgba(0,0,0,.2); overflow:hidden; }}
    header {{ background:linear-gradient(135deg, #0f4c81 0%, #1a5fa0 100%); color:#ffffff; padding:30px; text-align:center; }}
    header h1 {{ font-size:28px; margin-bottom:8px; }}
    .content {{ padding:30px; }}
    .info-box {{ background:#edf2f7; border-left:4px solid #0f4c81; padding:15px; margin-bottom:20px; border-radius:4px; line-height:1.6; }}
    .estado-section {{ margin-bottom:30px; border:2px solid #e2e8f0; border-radius:8px; overflow:hidden; }}
    .estado-header {{ background:#f7fafc; padding:15px 20px; border-bottom:2px solid #cbd5e0; }}
    .estado-header h2 {{ color:#2d3748; font-size:20px; display:flex; align-items:center; gap:10px; }}
    .estado-nome {{ background:#0f4c81; color:#ffffff; padding:4px 12px; border-radius:6px; font-size:14px; }}
    .mapas-grid {{ display:grid; grid-template-columns:repeat(auto-fill, minmax(250px, 1fr)); gap:15px; padding:20px; }}
    .mapa-card {{ border:2px solid #e2e8f0; border-radius:8px; padding:20px; text-align:center; }}
    .mapa-card:hover {{ border-color:#0f4c81; box-shadow:0 4px 12px rgba(15,76,129,.15); }}
    .voltagem-badge {{ display:inline-block; padding:8px 16px; border-radius:6px; font-size:18px; font-weight:bold; color:#ffffff; margin-bottom:12px; }}
    .mapa-card a {{ display:inline-block; margin-top:8px; padding:8px 20px; background:#0f4c81; color:#ffffff; text-decoration:none; border-radius:6px; font-size:14px; }}
    footer {{ background:#f7fafc; padding:20px; text-align:center; color:#718096; font-size:13px; }}
  </style>
</head>
<body>
<div class="container">
<header><h1>🗺️ Mapas - Linhas de Transmissão</h1><p>Municípios afetados por voltagem e estado</p></header>
<div class="content">
<div class="info-box"><p>Cada mapa mostra os municípios afetados, a linha de transmissão, a faixa de servidão e o limite estadual. Use o controle de camadas para exibir os municípios não afetados.</p></div>
{body}</div>
<footer>Gerado em {generated_at}</footer>
</div>
</body>
</html>
"##,
        body = body,
        generated_at = escape_html(generated_at),
    )
}

/// Génère toutes les cartes de la table et l'index
///
/// Les combinaisons sont traitées en parallèle. Une carte en échec est
/// journalisée et absente de l'index.
pub fn generate_maps(
    table: &ConsolidatedTable,
    config: &Config,
    sources: &MapSources,
    out_dir: &Path,
    generated_at: &str,
) -> Result<Vec<MapEntry>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Cannot create {}", out_dir.display()))?;

    let combinations = table.combinations();
    info!(count = combinations.len(), "Generating maps");

    let entries: Vec<MapEntry> = combinations
        .par_iter()
        .filter_map(|(voltage, uf)| {
            let affected_count = table
                .specific()
                .filter(|r| &r.voltage == voltage && &r.state == uf)
                .map(|r| match_key(&r.name))
                .collect::<HashSet<_>>()
                .len();
            let data = MapData::collect(sources, config, voltage, uf, affected_count);
            let file_name = map_file_name(voltage, uf);
            let written = render_map(&data, config)
                .and_then(|html| std::fs::write(out_dir.join(&file_name), html).map_err(Into::into));
            match written {
                Ok(()) => {
                    println!("    ✓ Salvo: {}", out_dir.join(&file_name).display());
                    Some(MapEntry {
                        voltage: voltage.clone(),
                        state: uf.clone(),
                        file_name,
                        affected_count,
                    })
                }
                Err(e) => {
                    warn!(voltage = %voltage, uf = %uf, error = %e, "Map generation failed");
                    None
                }
            }
        })
        .collect();

    let index = out_dir.join("index.html");
    std::fs::write(&index, render_index(&entries, config, generated_at))
        .with_context(|| format!("Cannot write {}", index.display()))?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Affectation;
    use geo::{line_string, polygon};
    use linhas_geo::{Municipality, TransmissionLine};

    fn square(x: f64, y: f64) -> Geometry {
        Geometry::Polygon(polygon![
            (x: x, y: y), (x: x + 0.1, y: y), (x: x + 0.1, y: y + 0.1), (x: x, y: y + 0.1)
        ])
    }

    fn mun(name: &str, x: f64) -> Municipality {
        Municipality {
            code: None,
            name: name.to_string(),
            state: Some("PR".to_string()),
            geometry: square(x, -25.0),
        }
    }

    #[test]
    fn test_map_file_name() {
        assert_eq!(map_file_name(&VoltageClass::Kv(500), "PR"), "mapa_500kV_PR.html");
    }

    #[test]
    fn test_unaffected_ignores_case() {
        let all = vec![mun("Cascavel", 0.0), mun("Toledo", 1.0)];
        let rest = unaffected(all, &[mun("CASCAVEL", 0.0)]);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "Toledo");
    }

    #[test]
    fn test_lines_touching_state() {
        let lines = vec![
            TransmissionLine {
                name: "A".into(),
                voltage: VoltageClass::Kv(500),
                geometry: Geometry::LineString(line_string![(x: -0.5, y: -24.95), (x: 0.05, y: -24.95)]),
            },
            TransmissionLine {
                name: "B".into(),
                voltage: VoltageClass::Kv(500),
                geometry: Geometry::LineString(line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 6.0)]),
            },
        ];
        let kept = lines_touching(lines, &[mun("Cascavel", 0.0)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "A");
    }

    #[test]
    fn test_render_map_embeds_layers() {
        let config = Config::from_preset("default").unwrap();
        let data = MapData {
            voltage: VoltageClass::Kv(500),
            state: "PR".into(),
            affected_count: 2,
            layers: vec![MapLayer {
                name: "Municípios (500 kV - PR)".into(),
                show: true,
                style: json!({ "fillColor": "#FF0000" }),
                tooltip: Some(("NM_MUN".into(), "Município:".into())),
                features: vec![text_feature("0".into(), square(0.0, 0.0), &[("NM_MUN", "Cascavel</script>")])],
            }],
            bounds: square(0.0, 0.0).bounding_rect(),
        };
        let html = render_map(&data, &config).unwrap();
        assert!(html.contains(LEAFLET_JS));
        assert!(html.contains("Linha de Transmissão 500 kV - PR"));
        assert!(html.contains("2 municípios afetados"));
        assert!(html.contains("\"name\":\"Municípios (500 kV - PR)\""));
        assert!(html.contains("Cascavel<\\/script>"));
        assert!(html.contains("map.fitBounds"));
    }

    #[test]
    fn test_index_groups_by_configured_state_order() {
        let config = Config::from_preset("default").unwrap();
        let entry = |v: u32, uf: &str| MapEntry {
            voltage: VoltageClass::Kv(v),
            state: uf.to_string(),
            file_name: map_file_name(&VoltageClass::Kv(v), uf),
            affected_count: 1,
        };
        let html = render_index(&[entry(500, "RS"), entry(600, "PR"), entry(500, "PR")], &config, "t");
        let pr = html.find("Paraná").unwrap();
        let rs = html.find("Rio Grande do Sul").unwrap();
        assert!(pr < rs);
        let kv500 = html.find("mapa_500kV_PR.html").unwrap();
        let kv600 = html.find("mapa_600kV_PR.html").unwrap();
        assert!(kv500 < kv600);
    }

    #[test]
    fn test_generate_maps_without_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_preset("default").unwrap();
        let table = ConsolidatedTable::from_rows(vec![
            Affectation::new("Cascavel", None, VoltageClass::Kv(500), "PR"),
            Affectation::new("Toledo", None, VoltageClass::Base, "PR"),
        ]);
        let sources = MapSources::from_config(&config, dir.path());
        let out = dir.path().join("mapas");

        let entries = generate_maps(&table, &config, &sources, &out, "t").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].affected_count, 1);
        assert!(out.join("mapa_500kV_PR.html").exists());
        assert!(out.join("index.html").exists());
    }
}
