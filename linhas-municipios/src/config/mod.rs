//! Configuration du système
//!
//! Les constantes de l'analyse (largeurs de faixa, couleurs, États, chemins)
//! sont regroupées dans un objet `Config` passé à chaque commande.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use linhas_geo::{BufferTable, ColumnAliases, VoltageClass};

/// Presets embarqués
pub const PRESETS: [&str; 2] = ["default", "wide"];

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Largeur de faixa (m) par tension
    pub buffer_meters: BTreeMap<String, f64>,

    /// Largeur pour une tension absente de `buffer_meters`
    pub default_buffer_meters: f64,

    /// Largeur unique pour la détection des tensions par commune
    pub detection_buffer_meters: f64,

    /// Couleur d'affichage par tension (clé "BASE" pour la couche de base)
    pub voltage_colors: BTreeMap<String, String>,

    /// Portée descriptive par tension (rapport technique)
    #[serde(default)]
    pub voltage_reach: BTreeMap<String, String>,

    pub state_colors: BTreeMap<String, String>,

    /// États analysés, dans l'ordre d'affichage
    pub states: Vec<StateConfig>,

    /// Surcharges des listes d'alias de colonnes
    #[serde(default)]
    pub aliases: AliasOverrides,

    pub simplify_meters: SimplifyConfig,

    pub map: MapConfig,

    /// Commune mise en avant dans les statistiques
    pub origin_municipality: String,

    /// Taille des classements (top N)
    pub top_n: usize,

    pub paths: PathsConfig,

    /// Analyse régionale (un seul État, intersection directe)
    pub regional: RegionalConfig,
}

/// Un État (UF) et les jetons qui le désignent dans les noms de fichiers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    pub uf: String,
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Listes d'alias remplaçant celles par défaut quand elles sont fournies
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AliasOverrides {
    pub municipality_name: Option<Vec<String>>,
    pub municipality_code: Option<Vec<String>>,
    pub state: Option<Vec<String>>,
    pub line_name: Option<Vec<String>>,
    pub voltage: Option<Vec<String>>,
}

/// Tolérances de simplification (m) par couche de carte
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimplifyConfig {
    pub unaffected: f64,
    pub affected: f64,
    pub lines: f64,
    pub corridor: f64,
    pub state: f64,
}

/// Vue initiale des cartes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapConfig {
    /// [lat, lon]
    pub center: [f64; 2],
    pub zoom: u8,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Chemins relatifs au répertoire de base
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    pub per_layer_dir: PathBuf,
    pub consolidated_csv: PathBuf,
    pub multi_line_csv: PathBuf,
    pub chart: PathBuf,
    pub outputs_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub states_dir: PathBuf,
    pub municipalities_gpkg: PathBuf,
    pub lines_gpkg: PathBuf,
    pub corridor_gpkg: PathBuf,
    pub run_report: PathBuf,
    /// Police TrueType du graphique PNG ; recherchée dans le système si absente
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_font: Option<PathBuf>,
}

/// Fichiers de l'analyse régionale, relatifs à `dir`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionalConfig {
    pub uf: String,
    pub dir: PathBuf,
    pub lines: PathBuf,
    pub municipalities: PathBuf,
    pub affected_csv: PathBuf,
    pub voltage_csv: PathBuf,
    /// Nom (sans extension) des exports GeoJSON / Shapefile
    pub affected_layer: String,
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "default" => Self::load_embedded(include_str!("presets/default.json")),
            "wide" => Self::load_embedded(include_str!("presets/wide.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    /// Nom de preset ou chemin vers un fichier JSON
    pub fn resolve(name: &str) -> Result<Self> {
        if PRESETS.contains(&name) {
            Self::from_preset(name)
        } else {
            Self::load(Path::new(name))
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Table des largeurs de faixa pour la jointure indexée
    pub fn buffer_table(&self) -> BufferTable {
        self.buffer_meters
            .iter()
            .fold(BufferTable::new(self.default_buffer_meters), |table, (voltage, meters)| {
                table.with(VoltageClass::parse(voltage), *meters)
            })
    }

    /// Largeur unique utilisée pour détecter les tensions d'une commune
    pub fn detection_buffers(&self) -> BufferTable {
        BufferTable::flat(self.detection_buffer_meters)
    }

    pub fn column_aliases(&self) -> ColumnAliases {
        let mut aliases = ColumnAliases::default();
        let o = &self.aliases;
        let apply = |target: &mut Vec<String>, value: &Option<Vec<String>>| {
            if let Some(list) = value.as_ref().filter(|l| !l.is_empty()) {
                *target = list.clone();
            }
        };
        apply(&mut aliases.municipality_name, &o.municipality_name);
        apply(&mut aliases.municipality_code, &o.municipality_code);
        apply(&mut aliases.state, &o.state);
        apply(&mut aliases.line_name, &o.line_name);
        apply(&mut aliases.voltage, &o.voltage);
        aliases
    }

    pub fn voltage_color(&self, voltage: &VoltageClass) -> &str {
        self.voltage_colors
            .get(&voltage.to_string())
            .map(String::as_str)
            .unwrap_or("#808080")
    }

    pub fn state_color(&self, uf: &str) -> &str {
        self.state_colors
            .get(uf)
            .map(String::as_str)
            .unwrap_or("#a0aec0")
    }

    pub fn voltage_reach(&self, voltage: &VoltageClass) -> &str {
        self.voltage_reach
            .get(&voltage.to_string())
            .map(String::as_str)
            .unwrap_or("-")
    }

    pub fn state(&self, uf: &str) -> Option<&StateConfig> {
        self.states.iter().find(|s| s.uf.eq_ignore_ascii_case(uf))
    }

    /// Rang d'affichage d'un État (ordre de `states`, inconnus en dernier)
    pub fn state_rank(&self, uf: &str) -> usize {
        self.states
            .iter()
            .position(|s| s.uf.eq_ignore_ascii_case(uf))
            .unwrap_or(self.states.len())
    }

    /// Jetons de nom de fichier d'un État (l'UF en minuscules est toujours inclus)
    pub fn state_tokens(&self, uf: &str) -> Vec<String> {
        let mut tokens = vec![uf.to_lowercase()];
        if let Some(state) = self.state(uf) {
            for token in &state.tokens {
                if !tokens.contains(token) {
                    tokens.push(token.clone());
                }
            }
        }
        tokens
    }

    /// UF configurée désignée par un nom de couche (dernier jeton `_XX`)
    pub fn state_from_layer_name(&self, name: &str) -> Option<String> {
        name.rsplit(['_', '-', ' ', '.'])
            .filter(|t| t.len() == 2)
            .find_map(|t| self.state(t).map(|s| s.uf.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_parse() {
        for name in PRESETS {
            let config = Config::from_preset(name).unwrap();
            assert_eq!(config.states.len(), 3);
            assert!(!config.voltage_colors.is_empty());
        }
        assert!(Config::from_preset("unknown").is_err());
    }

    #[test]
    fn test_buffer_table_from_config() {
        let config = Config::from_preset("default").unwrap();
        let table = config.buffer_table();
        assert_eq!(table.distance_for(&VoltageClass::Kv(500)), 80.0);
        assert_eq!(table.distance_for(&VoltageClass::Kv(765)), 100.0);
        assert_eq!(table.distance_for(&VoltageClass::Kv(138)), 60.0);
        assert_eq!(
            config.detection_buffers().distance_for(&VoltageClass::Kv(500)),
            100.0
        );
    }

    #[test]
    fn test_colors_and_states() {
        let config = Config::from_preset("default").unwrap();
        assert_eq!(config.voltage_color(&VoltageClass::Kv(230)), "#FFA500");
        assert_eq!(config.voltage_color(&VoltageClass::Base), "#808080");
        assert_eq!(config.state_color("SC"), "#48bb78");
        assert_eq!(config.state_rank("RS"), 2);
        assert_eq!(config.state_rank("SP"), 3);
        assert!(config.state_tokens("PR").contains(&"parana".to_string()));
    }

    #[test]
    fn test_state_from_layer_name() {
        let config = Config::from_preset("default").unwrap();
        assert_eq!(
            config.state_from_layer_name("linha_trans_500_PR"),
            Some("PR".to_string())
        );
        assert_eq!(config.state_from_layer_name("linha_trans_500"), None);
    }

    #[test]
    fn test_alias_overrides() {
        let mut config = Config::from_preset("default").unwrap();
        config.aliases.voltage = Some(vec!["TENSAO_NOM".to_string()]);
        let aliases = config.column_aliases();
        assert_eq!(aliases.voltage, vec!["TENSAO_NOM".to_string()]);
        assert_eq!(aliases.state, ColumnAliases::default().state);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        let mut config = Config::from_preset("default").unwrap();
        config.top_n = 10;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = Config::resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.top_n, 10);
    }
}
