//! Enchaînement des commandes : jointure, consolidation, rapports, cartes
//!
//! Chaque étape alimente un `RunReport` fourni par l'appelant ; la sortie
//! console (en portugais) est imprimée au fil de l'eau.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use linhas_geo::schema::{self, match_key};
use linhas_geo::{
    discover, join, source, ColumnAliases, GeometryKind, JoinResult, JoinStrategy, Municipality,
    TransmissionLine, VoltageClass,
};
use tracing::{debug, info, warn};

use crate::aggregate::layers::read_per_layer_dir;
use crate::aggregate::{stats, ConsolidatedTable, Summary};
use crate::config::Config;
use crate::console;
use crate::export::csv::{self as csv_export, CsvTable, NOT_DETECTED};
use crate::export::{affected_features, geojson, shapefile, PropertyValue};
use crate::render::html::{self, ReportKind, COMPLETE_CSV};
use crate::render::maps::{self, MapEntry, MapSources};
use crate::render::chart;
use crate::report::{ErrorLevel, LayerStats, RunError, RunReport};

/// Titre du graphique consolidé
pub const CHART_TITLE: &str = "Análise Consolidada - Linhas de Transmissão de Foz do Iguaçu";

/// Répertoire de travail et configuration résolue
#[derive(Debug, Clone)]
pub struct Workspace {
    pub base_dir: PathBuf,
    pub config: Config,
}

impl Workspace {
    pub fn new(base_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            base_dir: base_dir.into(),
            config,
        }
    }

    /// Chemin relatif au répertoire de base (les chemins absolus sont gardés)
    pub fn path(&self, rel: &Path) -> PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.base_dir.join(rel)
        }
    }

    pub fn per_layer_dir(&self) -> PathBuf {
        self.path(&self.config.paths.per_layer_dir)
    }

    pub fn consolidated_csv(&self) -> PathBuf {
        self.path(&self.config.paths.consolidated_csv)
    }

    pub fn multi_line_csv(&self) -> PathBuf {
        self.path(&self.config.paths.multi_line_csv)
    }

    pub fn chart(&self) -> PathBuf {
        self.path(&self.config.paths.chart)
    }

    pub fn chart_font(&self) -> Option<PathBuf> {
        self.config.paths.chart_font.as_ref().map(|p| self.path(p))
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.path(&self.config.paths.outputs_dir)
    }

    pub fn maps_dir(&self) -> PathBuf {
        self.path(&self.config.paths.maps_dir)
    }

    pub fn run_report(&self) -> PathBuf {
        self.path(&self.config.paths.run_report)
    }

    pub fn regional_dir(&self) -> PathBuf {
        self.path(&self.config.regional.dir)
    }

    /// Fichier du jeu régional (relatif au dossier régional)
    pub fn regional_file(&self, name: &Path) -> PathBuf {
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.regional_dir().join(name)
        }
    }

    pub fn map_sources(&self) -> MapSources {
        MapSources::from_config(&self.config, &self.base_dir)
    }

    /// Relit la table consolidée produite par `consolidate`
    pub fn load_table(&self) -> Result<ConsolidatedTable> {
        let path = self.consolidated_csv();
        if !path.exists() {
            bail!(
                "{} not found, run `consolidate` (or `analyze`) first",
                path.display()
            );
        }
        let table = csv_export::read_consolidated(&path)?;
        info!(path = %path.display(), rows = table.len(), "Consolidated table loaded");
        Ok(table)
    }
}

/// Horodatage affiché dans les rapports et les cartes
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    Ok(())
}

// ============================================================================
// consolidate
// ============================================================================

/// Lit `per_layer/`, écrit le graphique, la table consolidée et la liste
/// des communes à lignes multiples
pub fn consolidate(ws: &Workspace, report: &mut RunReport) -> Result<ConsolidatedTable> {
    let dir = ws.per_layer_dir();
    let aliases = ws.config.column_aliases();

    println!("{}", "=".repeat(80));
    println!("CONSOLIDAÇÃO DOS ARQUIVOS POR CAMADA");
    println!("{}", "=".repeat(80));

    let (table, read, failed) = read_per_layer_dir(&dir, &aliases)?;
    if read.is_empty() && failed.is_empty() {
        bail!("No per-layer CSV file found in {}", dir.display());
    }

    for (file, rows) in &read {
        let name = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        report.record_layer(
            &name,
            LayerStats {
                features: *rows,
                municipalities: *rows,
                ..Default::default()
            },
        );
    }
    for (path, error) in &failed {
        report.record_error(RunError::new(
            ErrorLevel::Error,
            Some(&path.display().to_string()),
            format!("{:#}", error),
        ));
    }

    if table.is_empty() {
        bail!("No affected municipality could be read from {}", dir.display());
    }

    write_consolidated_outputs(ws, &table, report)?;
    Ok(table)
}

/// Graphique + CSV consolidés, à partir d'une table déjà construite
pub fn write_consolidated_outputs(
    ws: &Workspace,
    table: &ConsolidatedTable,
    report: &mut RunReport,
) -> Result<Summary> {
    let summary = Summary::compute(table);
    let mut text = String::new();
    console::consolidation_summary(&mut text, &summary, &ws.config)?;
    print!("{}", text);

    let chart_path = ws.chart();
    ensure_parent(&chart_path)?;
    chart::consolidated_chart(&summary, &ws.config, CHART_TITLE, &chart_path, ws.chart_font().as_deref())?;
    report.record_output(&chart_path, 0)?;
    println!("\n✓ Visualização salva em: {}", chart_path.display());

    let consolidated = ws.consolidated_csv();
    ensure_parent(&consolidated)?;
    let n = csv_export::write_consolidated(&consolidated, table)?;
    report.record_output(&consolidated, n)?;
    println!("✓ Dados consolidados salvos em: {}", consolidated.display());

    let multi = ws.multi_line_csv();
    ensure_parent(&multi)?;
    let n = csv_export::write_multi_line(&multi, &summary.multi_line)?;
    report.record_output(&multi, n)?;
    println!("✓ Relatório de múltiplas linhas salvo em: {}", multi.display());

    println!("\n{}", "=".repeat(80));
    println!("✅ ANÁLISE CONCLUÍDA COM SUCESSO!");
    println!("{}", "=".repeat(80));

    info!(
        rows = summary.total_records,
        municipalities = summary.unique_municipalities,
        multi_line = summary.multi_line.len(),
        "Consolidation written"
    );
    Ok(summary)
}

// ============================================================================
// analyze
// ============================================================================

/// Sources de `analyze` (par défaut celles de la configuration)
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub lines: Option<PathBuf>,
    pub municipalities: Option<PathBuf>,
}

/// Communes par UF, chargées une seule fois
struct MunicipalityCache<'a> {
    ws: &'a Workspace,
    aliases: &'a ColumnAliases,
    given: Option<Vec<Municipality>>,
    by_state: HashMap<String, Vec<Municipality>>,
}

impl<'a> MunicipalityCache<'a> {
    fn new(ws: &'a Workspace, aliases: &'a ColumnAliases, given: Option<&Path>) -> Result<Self> {
        let given = match given {
            Some(path) => {
                let layer = linhas_geo::load_normalized(path, None, GeometryKind::Polygon)
                    .required("municipalities")?;
                Some(schema::municipalities_from_layer(&layer, aliases, None))
            }
            None => None,
        };
        Ok(Self {
            ws,
            aliases,
            given,
            by_state: HashMap::new(),
        })
    }

    fn discover(&self, uf: &str) -> Vec<Municipality> {
        let config = &self.ws.config;
        let states_dir = self.ws.path(&config.paths.states_dir);
        let Some(path) =
            discover::find_state_municipalities(&states_dir, &self.ws.base_dir, &config.state_tokens(uf))
        else {
            warn!(uf, "No municipality layer found for state");
            return Vec::new();
        };
        info!(uf, path = %path.display(), "Municipality layer discovered");
        linhas_geo::load_normalized(&path, None, GeometryKind::Polygon)
            .loaded()
            .map(|layer| schema::municipalities_from_layer(&layer, self.aliases, Some(uf)))
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.state.as_deref().map_or(true, |s| s == uf))
            .collect()
    }

    /// Communes de l'UF, ou de tous les États configurés si `uf` est `None`
    fn for_state(&mut self, uf: Option<&str>) -> Vec<Municipality> {
        if let Some(given) = &self.given {
            return match uf {
                Some(uf) => given
                    .iter()
                    .filter(|m| m.state.as_deref().map_or(true, |s| s == uf))
                    .cloned()
                    .collect(),
                None => given.clone(),
            };
        }

        let states: Vec<String> = match uf {
            Some(uf) => vec![uf.to_string()],
            None => self.ws.config.states.iter().map(|s| s.uf.clone()).collect(),
        };
        let mut out = Vec::new();
        for uf in states {
            if !self.by_state.contains_key(&uf) {
                let found = self.discover(&uf);
                self.by_state.insert(uf.clone(), found);
            }
            if let Some(muns) = self.by_state.get(&uf) {
                out.extend(muns.iter().cloned());
            }
        }
        out
    }
}

/// Nom du fichier par couche, relisible par `consolidate`
///
/// Le nom porte toujours la tension et l'État : `_<kV>` quand la tension ne
/// vient pas du nom de la couche, `_base` pour les lignes sans tension, et
/// `_<UF>` en dernier jeton quand la couche ne le garantit pas.
pub fn per_layer_file_name(layer: &str, voltage: &VoltageClass, uf: &str, layer_has_state: bool) -> String {
    let mut stem = format!("municipios_afetados_{}", layer);
    let named = VoltageClass::from_layer_name(layer);
    let mut base_added = false;
    match voltage {
        VoltageClass::Kv(kv) if named.as_ref() != Some(voltage) => {
            stem.push('_');
            stem.push_str(&kv.to_string());
        }
        VoltageClass::Kv(_) => {}
        _ if named != Some(VoltageClass::Base) => {
            stem.push_str("_base");
            base_added = true;
        }
        _ => {}
    }
    // l'État d'un fichier de base est son dernier jeton
    if !layer_has_state || base_added {
        stem.push('_');
        stem.push_str(uf);
    }
    format!("{}.csv", stem)
}

/// Classe d'une ligne dans les fichiers par couche
///
/// Seules les tensions de trois chiffres se relisent depuis un nom de
/// fichier ; les autres valeurs rejoignent la couche de base.
pub fn file_voltage(voltage: &VoltageClass) -> VoltageClass {
    match voltage {
        VoltageClass::Kv(kv) if (100..1000).contains(kv) => voltage.clone(),
        _ => VoltageClass::Base,
    }
}

/// Communes touchées regroupées par (tension, UF), en ordre d'index
///
/// `layer_voltage` (issue du nom de la couche) s'impose à toutes les
/// lignes ; sinon chaque ligne apporte sa propre tension.
fn affected_groups(
    result: &JoinResult,
    lines: &[TransmissionLine],
    municipalities: &[Municipality],
    layer_voltage: Option<&VoltageClass>,
    default_state: Option<&str>,
) -> BTreeMap<(VoltageClass, String), BTreeSet<usize>> {
    let mut groups: BTreeMap<(VoltageClass, String), BTreeSet<usize>> = BTreeMap::new();
    for i in &result.intersections {
        let m = &municipalities[i.municipality];
        let Some(state) = m.state.as_deref().or(default_state) else {
            debug!(municipality = %m.name, "Municipality without state skipped");
            continue;
        };
        let voltage = match layer_voltage {
            Some(v) => v.clone(),
            None => file_voltage(&lines[i.line].voltage),
        };
        groups
            .entry((voltage, state.to_string()))
            .or_default()
            .insert(i.municipality);
    }
    groups
}

/// Jointure de chaque couche de lignes, fichiers `per_layer/`, puis consolidation
pub fn analyze(ws: &Workspace, options: &AnalyzeOptions, report: &mut RunReport) -> Result<ConsolidatedTable> {
    let config = &ws.config;
    let aliases = config.column_aliases();
    let buffers = config.buffer_table();
    let lines_path = options
        .lines
        .clone()
        .unwrap_or_else(|| ws.path(&config.paths.lines_gpkg));

    let layers = source::list_layers(&lines_path)
        .with_context(|| format!("Cannot list layers of {}", lines_path.display()))?;
    if layers.is_empty() {
        bail!("No layer found in {}", lines_path.display());
    }
    info!(path = %lines_path.display(), layers = layers.len(), "Analyzing line layers");

    let mut cache = MunicipalityCache::new(ws, &aliases, options.municipalities.as_deref())?;
    let out_dir = ws.per_layer_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Cannot create {}", out_dir.display()))?;

    println!("{}", "=".repeat(80));
    println!("ANÁLISE DAS CAMADAS DE LINHAS DE TRANSMISSÃO");
    println!("{}", "=".repeat(80));

    for info in &layers {
        let layer = match linhas_geo::load_normalized(&lines_path, Some(&info.name), GeometryKind::Line).loaded() {
            Some(layer) => layer,
            None => {
                report.record_skip(&info.name, "layer empty or unreadable");
                continue;
            }
        };
        if layer.geometry_kind() != Some(GeometryKind::Line) {
            debug!(layer = %info.name, "Not a line layer, skipped");
            report.record_skip(&info.name, "not a line layer");
            continue;
        }

        let layer_voltage = VoltageClass::from_layer_name(&info.name);
        let line_override = layer_voltage.clone().filter(VoltageClass::is_specific);
        let uf = config.state_from_layer_name(&info.name);

        let lines: Vec<TransmissionLine> = schema::lines_from_layer(&layer, &aliases, line_override.as_ref());
        let municipalities = cache.for_state(uf.as_deref());
        if municipalities.is_empty() {
            report.record_skip(&info.name, "no municipality layer for this state");
            continue;
        }

        let result = join::spatial_join(&lines, &municipalities, JoinStrategy::Indexed, &buffers);
        let groups = affected_groups(&result, &lines, &municipalities, layer_voltage.as_ref(), uf.as_deref());
        let affected = groups.values().flatten().collect::<BTreeSet<_>>().len();

        for ((voltage, state), indices) in &groups {
            let path = out_dir.join(per_layer_file_name(&info.name, voltage, state, uf.is_some()));
            let n = csv_export::write_csv(
                &path,
                &["NM_MUN", "CD_MUN"],
                indices.iter().map(|&j| {
                    let m = &municipalities[j];
                    vec![m.name.clone(), m.code.clone().unwrap_or_default()]
                }),
            )?;
            report.record_output(&path, n)?;
        }

        for &line in &result.degraded_lines {
            report.record_error(RunError::new(
                ErrorLevel::Warning,
                Some(&info.name),
                format!("line '{}' joined without corridor", lines[line].name),
            ));
        }
        report.record_layer(
            &info.name,
            LayerStats {
                features: layer.len(),
                intersections: result.intersections.len(),
                municipalities: affected,
                degraded: result.degraded_lines.len(),
            },
        );
        let labels: BTreeSet<String> = groups.keys().map(|(v, _)| v.line_label()).collect();
        println!(
            "✓ {}: {} municípios afetados ({})",
            info.name,
            affected,
            labels.into_iter().collect::<Vec<_>>().join(", ")
        );
    }
    println!();

    consolidate(ws, report)
}

// ============================================================================
// intersect (jeu régional)
// ============================================================================

/// Options de la jointure régionale
#[derive(Debug, Clone, Default)]
pub struct IntersectOptions {
    /// Utiliser la faixa par tension au lieu de la géométrie nue
    pub buffered: bool,
    /// Écrire aussi la couche des communes touchées (GeoJSON + Shapefile)
    pub export_layer: bool,
    pub lines: Option<PathBuf>,
    pub municipalities: Option<PathBuf>,
}

/// Résultat de la jointure régionale
#[derive(Debug, Clone, Default)]
pub struct IntersectSummary {
    /// Couples (ligne, commune) dans l'ordre de la jointure
    pub pairs: Vec<(String, String)>,
    /// Communes touchées, sans doublon, triées
    pub affected: Vec<String>,
    /// Nombre de couples par commune, décroissant
    pub per_municipality: Vec<(String, usize)>,
}

impl IntersectSummary {
    pub fn from_join(result: &JoinResult, lines: &[TransmissionLine], municipalities: &[Municipality]) -> Self {
        let pairs: Vec<(String, String)> = result
            .intersections
            .iter()
            .map(|i| (lines[i.line].name.clone(), municipalities[i.municipality].name.clone()))
            .collect();

        let affected: Vec<String> = pairs
            .iter()
            .map(|(_, m)| m.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, m) in &pairs {
            let entry = counts.entry(m.as_str()).or_insert(0);
            if *entry == 0 {
                order.push(m.clone());
            }
            *entry += 1;
        }
        let mut per_municipality: Vec<(String, usize)> = order
            .into_iter()
            .map(|m| {
                let n = counts.get(m.as_str()).copied().unwrap_or(0);
                (m, n)
            })
            .collect();
        per_municipality.sort_by(|a, b| b.1.cmp(&a.1));

        Self {
            pairs,
            affected,
            per_municipality,
        }
    }
}

/// Communes du jeu régional touchées par ses lignes
pub fn intersect(ws: &Workspace, options: &IntersectOptions, report: &mut RunReport) -> Result<IntersectSummary> {
    let config = &ws.config;
    let regional = &config.regional;
    let aliases = config.column_aliases();
    let lines_path = options
        .lines
        .clone()
        .unwrap_or_else(|| ws.regional_file(&regional.lines));
    let muns_path = options
        .municipalities
        .clone()
        .unwrap_or_else(|| ws.regional_file(&regional.municipalities));

    println!("Carregando camadas...");
    let lines_layer = linhas_geo::load_normalized(&lines_path, None, GeometryKind::Line)
        .required("transmission lines")
        .with_context(|| format!("Cannot load lines from {}", lines_path.display()))?;
    let muns_layer = linhas_geo::load_normalized(&muns_path, None, GeometryKind::Polygon)
        .required("municipalities")
        .with_context(|| format!("Cannot load municipalities from {}", muns_path.display()))?;

    let lines = schema::lines_from_layer(&lines_layer, &aliases, None);
    let municipalities = schema::municipalities_from_layer(&muns_layer, &aliases, Some(&regional.uf));
    println!("Linhas de transmissão: {} features", lines.len());
    println!("Municípios: {} features", municipalities.len());

    let strategy = if options.buffered {
        JoinStrategy::Indexed
    } else {
        JoinStrategy::Direct
    };
    println!("\nRealizando interseção espacial...");
    let result = join::spatial_join(&lines, &municipalities, strategy, &config.buffer_table());
    let summary = IntersectSummary::from_join(&result, &lines, &municipalities);

    report.record_layer(
        &lines_layer.name,
        LayerStats {
            features: lines.len(),
            intersections: result.intersections.len(),
            municipalities: summary.affected.len(),
            degraded: result.degraded_lines.len(),
        },
    );

    println!("\n{}", "=".repeat(70));
    println!("ANÁLISE DE MUNICÍPIOS AFETADOS PELAS LINHAS DE TRANSMISSÃO");
    println!("{}", "=".repeat(70));
    println!("\nTotal de municípios afetados: {}", summary.affected.len());
    println!("\nLista de municípios afetados:");
    println!("{}", "-".repeat(70));
    for name in &summary.affected {
        println!("  • {}", name);
    }

    let out_dir = ws.regional_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Cannot create {}", out_dir.display()))?;

    let list = out_dir.join("municipios_afetados.txt");
    csv_export::write_affected_list(
        &list,
        &format!("MUNICÍPIOS DO {} AFETADOS POR LINHAS DE TRANSMISSÃO", regional.uf),
        &summary.affected,
    )?;
    report.record_output(&list, summary.affected.len())?;

    let details = out_dir.join("linhas_por_municipio.csv");
    let n = csv_export::write_line_details(&details, &summary.pairs)?;
    report.record_output(&details, n)?;

    let per_mun = out_dir.join("resumo_por_municipio.csv");
    let n = csv_export::write_municipality_summary(&per_mun, &summary.per_municipality)?;
    report.record_output(&per_mun, n)?;

    let counts = result.lines_per_municipality();
    let affected_csv = ws.regional_file(&regional.affected_csv);
    let mut affected_idx: Vec<usize> = counts.keys().copied().collect();
    affected_idx.sort_unstable();
    let n = csv_export::write_csv(
        &affected_csv,
        &["NM_MUN", "CD_MUN", "UF", "N_LINHAS"],
        affected_idx.iter().map(|&i| {
            let m = &municipalities[i];
            vec![
                m.name.clone(),
                m.code.clone().unwrap_or_default(),
                m.state.clone().unwrap_or_default(),
                counts.get(&i).copied().unwrap_or(0).to_string(),
            ]
        }),
    )?;
    report.record_output(&affected_csv, n)?;

    println!("\n✓ Arquivos salvos:");
    for path in [&list, &details, &per_mun, &affected_csv] {
        println!("  - {}", path.display());
    }

    println!("\nMunicípios com mais linhas de transmissão:");
    println!("{}", "-".repeat(70));
    for (name, n) in summary.per_municipality.iter().take(10) {
        println!("  {}: {} linha(s)", name, n);
    }

    if options.export_layer {
        export_affected_layer(ws, &municipalities, &counts, report)?;
    }

    Ok(summary)
}

/// Couche des communes touchées avec `N_LINHAS` (GeoJSON + Shapefile)
fn export_affected_layer(
    ws: &Workspace,
    municipalities: &[Municipality],
    counts: &HashMap<usize, usize>,
    report: &mut RunReport,
) -> Result<()> {
    let features = affected_features(municipalities, counts);
    if features.is_empty() {
        warn!("No affected municipality, layer not exported");
        return Ok(());
    }
    let stem = ws.regional_dir().join(&ws.config.regional.affected_layer);

    let geojson_path = stem.with_extension("geojson");
    geojson::export_to_geojson(&features, linhas_geo::reproject::EPSG_WGS84, &geojson_path)?;
    report.record_output(&geojson_path, features.len())?;

    let shp_path = stem.with_extension("shp");
    let n = shapefile::export_to_shapefile(&features, &shp_path)?;
    report.record_output(&shp_path, n)?;

    let values: Vec<i64> = features
        .iter()
        .filter_map(|f| {
            f.properties.iter().find_map(|(k, v)| match v {
                PropertyValue::Integer(n) if k == "N_LINHAS" => Some(*n),
                _ => None,
            })
        })
        .collect();
    let max = values.iter().copied().max().unwrap_or(0);
    let min = values.iter().copied().min().unwrap_or(0);
    let mean = if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    };

    println!("\n✓ Camada criada: {}", ws.config.regional.affected_layer);
    println!("  - {}", geojson_path.display());
    println!("  - {}", shp_path.display());
    println!("\nEstatísticas:");
    println!("  Total de municípios: {}", features.len());
    println!("  Máximo de linhas em um município: {}", max);
    println!("  Mínimo de linhas em um município: {}", min);
    println!("  Média de linhas por município: {:.2}", mean);
    Ok(())
}

// ============================================================================
// voltages
// ============================================================================

/// Fichiers de `voltages` (par défaut ceux du jeu régional)
#[derive(Debug, Clone, Default)]
pub struct VoltageOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub lines: Option<PathBuf>,
    pub municipalities: Option<PathBuf>,
}

/// Tensions détectées par commune (clé `match_key` du nom)
pub fn detect_voltages(
    lines: &[TransmissionLine],
    municipalities: &[Municipality],
    config: &Config,
) -> HashMap<String, BTreeSet<VoltageClass>> {
    let result = join::indexed_join(lines, municipalities, &config.detection_buffers());
    let mut detected: HashMap<String, BTreeSet<VoltageClass>> = HashMap::new();
    for i in &result.intersections {
        detected
            .entry(match_key(&municipalities[i.municipality].name))
            .or_default()
            .insert(lines[i.line].voltage.clone());
    }
    detected
}

/// Une ligne par tension détectée, ou `NÃO_DETECTADA`
///
/// Les colonnes d'entrée sont conservées, `Voltagem` est ajoutée à la fin.
pub fn expand_rows(
    input: &CsvTable,
    name_col: usize,
    detected: &HashMap<String, BTreeSet<VoltageClass>>,
) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    for row in &input.rows {
        let name = input.get(row, name_col);
        let mut base: Vec<String> = (0..input.headers.len())
            .map(|c| input.get(row, c).to_string())
            .collect();
        match detected.get(&match_key(name)).filter(|v| !v.is_empty()) {
            Some(voltages) => {
                for v in voltages {
                    let mut r = base.clone();
                    r.push(v.to_string());
                    out.push(r);
                }
            }
            None => {
                base.push(NOT_DETECTED.to_string());
                out.push(base);
            }
        }
    }
    out
}

/// Ajoute la tension des lignes qui traversent chaque commune du CSV
pub fn expand_voltages(ws: &Workspace, options: &VoltageOptions, report: &mut RunReport) -> Result<usize> {
    let config = &ws.config;
    let regional = &config.regional;
    let aliases = config.column_aliases();

    let input = options
        .input
        .clone()
        .unwrap_or_else(|| ws.regional_file(&regional.affected_csv));
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| ws.regional_file(&regional.voltage_csv));
    let lines_path = options
        .lines
        .clone()
        .unwrap_or_else(|| ws.regional_file(&regional.lines));
    let muns_path = options.municipalities.clone().unwrap_or_else(|| {
        let exported = ws
            .regional_dir()
            .join(&regional.affected_layer)
            .with_extension("shp");
        if exported.exists() {
            exported
        } else {
            ws.regional_file(&regional.municipalities)
        }
    });

    println!("Carregando dados...");
    let table = csv_export::read_table(&input)?;
    let name_col = table
        .column_any(&aliases.municipality_name)
        .with_context(|| format!("{}: no municipality name column", input.display()))?;

    let lines_layer = linhas_geo::load_normalized(&lines_path, None, GeometryKind::Line)
        .required("transmission lines")?;
    let muns_layer = linhas_geo::load_normalized(&muns_path, None, GeometryKind::Polygon)
        .required("municipalities")?;
    let lines = schema::lines_from_layer(&lines_layer, &aliases, None);
    let municipalities = schema::municipalities_from_layer(&muns_layer, &aliases, Some(&regional.uf));
    info!(
        lines = lines.len(),
        municipalities = municipalities.len(),
        rows = table.rows.len(),
        "Detecting voltages"
    );

    println!("Identificando voltagens por município...");
    let detected = detect_voltages(&lines, &municipalities, config);
    let rows = expand_rows(&table, name_col, &detected);

    let mut headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    headers.push("Voltagem");
    let n = csv_export::write_csv(&output, &headers, rows.iter().cloned())?;
    report.record_output(&output, n)?;
    report.record_layer(
        &lines_layer.name,
        LayerStats {
            features: lines.len(),
            municipalities: detected.len(),
            ..Default::default()
        },
    );

    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    for r in &rows {
        if let Some(v) = r.last() {
            *distribution.entry(v.clone()).or_insert(0) += 1;
        }
    }

    println!("\n✓ Arquivo criado: {}", output.display());
    println!("  Registros originais: {}", table.rows.len());
    println!("  Registros expandidos: {}", rows.len());
    println!("\nDistribuição por voltagem:");
    for (v, count) in &distribution {
        println!("  {}: {}", v, count);
    }
    Ok(n)
}

// ============================================================================
// stats / report / maps
// ============================================================================

/// Statistiques détaillées de la table consolidée
pub fn stats(ws: &Workspace) -> Result<String> {
    let table = ws.load_table()?;
    let mut out = String::new();
    console::detailed_stats(&mut out, &table, &ws.config)?;
    Ok(out)
}

/// Écrit un rapport HTML ; le tableau de bord s'accompagne du CSV complet
pub fn write_report(
    ws: &Workspace,
    kind: ReportKind,
    table: &ConsolidatedTable,
    generated_at: &str,
    report: &mut RunReport,
) -> Result<PathBuf> {
    let out_dir = ws.outputs_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Cannot create {}", out_dir.display()))?;

    let path = out_dir.join(kind.file_name());
    std::fs::write(&path, html::render(kind, table, &ws.config, generated_at))
        .with_context(|| format!("Cannot write {}", path.display()))?;
    report.record_output(&path, table.len())?;
    println!("✓ Relatório salvo em: {}", path.display());

    if kind == ReportKind::Dashboard {
        let complete = out_dir.join(COMPLETE_CSV);
        let rows = stats::complete_table(table);
        let n = csv_export::write_complete_table(&complete, &rows)?;
        report.record_output(&complete, n)?;
        println!("✓ Tabela completa salva em: {}", complete.display());
    }
    Ok(path)
}

/// Une carte par combinaison (tension, UF) et l'index
pub fn generate_maps(
    ws: &Workspace,
    table: &ConsolidatedTable,
    generated_at: &str,
    report: &mut RunReport,
) -> Result<Vec<MapEntry>> {
    let out_dir = ws.maps_dir();
    let combinations = table.combinations();
    if combinations.is_empty() {
        bail!("No (voltage, state) combination in the consolidated table");
    }
    println!("Gerando {} mapas em {}", combinations.len(), out_dir.display());

    let entries = maps::generate_maps(table, &ws.config, &ws.map_sources(), &out_dir, generated_at)?;

    for (voltage, uf) in &combinations {
        let done = entries.iter().any(|e| &e.voltage == voltage && &e.state == uf);
        let name = maps::map_file_name(voltage, uf);
        if done {
            report.record_output(&out_dir.join(&name), 0)?;
        } else {
            report.record_error(RunError::new(ErrorLevel::Error, Some(&name), "map generation failed"));
        }
    }
    let index = out_dir.join("index.html");
    report.record_output(&index, entries.len())?;
    println!("\n✓ {} mapas gerados, índice: {}", entries.len(), index.display());
    Ok(entries)
}

// ============================================================================
// inspect
// ============================================================================

fn inspect_csv(path: &Path) -> Result<String> {
    let table = csv_export::read_table(path)?;
    let mut out = String::new();
    writeln!(out, "Arquivo: {}", path.display())?;
    writeln!(out, "Registros: {}", table.rows.len())?;
    writeln!(out, "Colunas: {}", table.headers.join(", "))?;

    for column in ["Estado", "Voltagem", "Tipo"] {
        let Some(col) = table.column(column) else {
            continue;
        };
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for row in &table.rows {
            *counts.entry(table.get(row, col)).or_insert(0) += 1;
        }
        writeln!(out, "\n{}:", column)?;
        for (value, n) in counts {
            writeln!(out, "  {}: {}", value, n)?;
        }
    }
    Ok(out)
}

fn inspect_layers(path: &Path, aliases: &ColumnAliases) -> Result<String> {
    let layers = source::list_layers(path)
        .with_context(|| format!("Cannot list layers of {}", path.display()))?;
    let mut out = String::new();
    writeln!(out, "Arquivo: {}", path.display())?;
    writeln!(out, "Camadas: {}", layers.len())?;

    for info in &layers {
        writeln!(out, "\n{}", "=".repeat(60))?;
        writeln!(out, "Camada: {}", info.name)?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(
            out,
            "  Geometria: {}",
            info.geometry_type.as_deref().unwrap_or("desconhecida")
        )?;
        match info.feature_count {
            Some(n) => writeln!(out, "  Features: {}", n)?,
            None => writeln!(out, "  Features: desconhecido")?,
        }
        match info.epsg {
            Some(epsg) => writeln!(out, "  CRS: EPSG:{}", epsg)?,
            None => writeln!(out, "  CRS: desconhecido")?,
        }

        let Some(layer) = source::load(path, Some(&info.name)).loaded() else {
            continue;
        };
        writeln!(out, "  Colunas: {}", layer.columns().join(", "))?;

        if layer.geometry_kind() == Some(GeometryKind::Line) {
            let lines = schema::lines_from_layer(&layer, aliases, None);
            let mut per_voltage: BTreeMap<VoltageClass, usize> = BTreeMap::new();
            for line in &lines {
                *per_voltage.entry(line.voltage.clone()).or_insert(0) += 1;
            }
            writeln!(out, "  Linhas por voltagem:")?;
            for (v, n) in per_voltage {
                writeln!(out, "    {}: {}", v.line_label(), n)?;
            }
            let names: BTreeSet<&str> = lines.iter().map(|l| l.name.as_str()).collect();
            let examples: Vec<&str> = names.into_iter().take(10).collect();
            writeln!(out, "  Exemplos: {}", examples.join(", "))?;
        } else if layer.geometry_kind() == Some(GeometryKind::Polygon) {
            let muns = schema::municipalities_from_layer(&layer, aliases, None);
            let mut per_state: BTreeMap<String, usize> = BTreeMap::new();
            for m in &muns {
                *per_state
                    .entry(m.state.clone().unwrap_or_else(|| "?".to_string()))
                    .or_insert(0) += 1;
            }
            writeln!(out, "  Municípios por estado:")?;
            for (uf, n) in per_state {
                writeln!(out, "    {}: {}", uf, n)?;
            }
        }
    }
    Ok(out)
}

/// Description d'une source : couches, colonnes, CRS et répartitions
pub fn inspect(path: &Path, aliases: &ColumnAliases) -> Result<String> {
    if !path.exists() {
        bail!("{} not found", path.display());
    }
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        inspect_csv(path)
    } else {
        inspect_layers(path, aliases)
    }
}
