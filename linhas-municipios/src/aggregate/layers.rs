//! Lecture des CSV par couche (`per_layer/`)
//!
//! Le nom du fichier porte la tension et l'État : `..._500_PR.csv` pour une
//! couche spécifique, `..._base_..._PR.csv` pour la couche de base.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use linhas_geo::schema::normalize_code;
use linhas_geo::{ColumnAliases, VoltageClass};
use regex::Regex;
use tracing::{debug, warn};

use super::{Affectation, ConsolidatedTable, LayerKind};
use crate::export::csv::read_table;

/// Un fichier par couche et ce que son nom décrit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFile {
    pub path: PathBuf,
    pub voltage: VoltageClass,
    pub state: String,
    pub kind: LayerKind,
}

fn voltage_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|_)(\d{3})(?:_|$)").expect("valid regex"))
}

/// Analyse un nom de fichier sans extension
///
/// Retourne `None` si aucune tension ni État n'est identifiable.
pub fn parse_layer_file_name(stem: &str) -> Option<(VoltageClass, String, LayerKind)> {
    if stem.to_lowercase().contains("base") {
        let state = stem.rsplit('_').next()?.trim().to_uppercase();
        if state.is_empty() {
            return None;
        }
        return Some((VoltageClass::Base, state, LayerKind::Base));
    }

    let voltage = voltage_token()
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| VoltageClass::parse(m.as_str()))?;
    let state = stem
        .rsplit('_')
        .find(|t| t.len() == 2 && t.chars().all(|c| c.is_ascii_alphabetic()))?
        .to_uppercase();

    Some((voltage, state, LayerKind::Specific))
}

/// Liste les CSV du dossier, triés par nom
pub fn layer_files(dir: &Path) -> Result<Vec<LayerFile>> {
    let pattern = dir.join("*.csv");
    let pattern = pattern.to_string_lossy();
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match parse_layer_file_name(&stem) {
            Some((voltage, state, kind)) => files.push(LayerFile {
                path,
                voltage,
                state,
                kind,
            }),
            None => warn!(file = %path.display(), "Cannot infer voltage/state from file name, skipped"),
        }
    }
    Ok(files)
}

/// Lit un fichier par couche : noms nettoyés, dédoublonnés dans le fichier
pub fn read_layer_file(file: &LayerFile, aliases: &ColumnAliases) -> Result<Vec<Affectation>> {
    let table = read_table(&file.path)?;
    let name_col = table.column_any(&aliases.municipality_name).with_context(|| {
        format!("No municipality name column in {}", file.path.display())
    })?;
    let code_col = table.column_any(&aliases.municipality_code);

    let mut seen = std::collections::HashSet::new();
    let mut rows = Vec::new();
    for record in &table.rows {
        let name = table.get(record, name_col).trim();
        if name.is_empty() || !seen.insert(name.to_string()) {
            continue;
        }
        let code = code_col.and_then(|c| normalize_code(table.get(record, c)));
        let mut row = Affectation::new(name, code, file.voltage.clone(), &file.state);
        row.kind = file.kind;
        rows.push(row);
    }

    debug!(file = %file.path.display(), rows = rows.len(), "Layer file read");
    Ok(rows)
}

/// Consolide tout le dossier `per_layer/`
///
/// Un fichier illisible est signalé et ignoré ; il est renvoyé avec son
/// erreur pour le rapport d'exécution.
pub fn read_per_layer_dir(
    dir: &Path,
    aliases: &ColumnAliases,
) -> Result<(ConsolidatedTable, Vec<(LayerFile, usize)>, Vec<(PathBuf, anyhow::Error)>)> {
    let files = layer_files(dir)?;
    println!("📁 Arquivos encontrados: {}\n", files.len());

    let mut table = ConsolidatedTable::new();
    let mut read = Vec::new();
    let mut failed = Vec::new();

    for file in files {
        match read_layer_file(&file, aliases) {
            Ok(rows) => {
                let stem = file
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("✓ {}", stem);
                println!("  └─ {} kV - {} - {} municípios", file.voltage, file.state, rows.len());
                let count = rows.len();
                table.extend(rows);
                read.push((file, count));
            }
            Err(e) => {
                warn!(file = %file.path.display(), error = %e, "Layer file skipped");
                failed.push((file.path.clone(), e));
            }
        }
    }

    Ok((table, read, failed))
}
