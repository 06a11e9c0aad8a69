//! Recherche heuristique des sources par nom de fichier
//!
//! Les limites d'État et les communes de chaque UF sont trouvées d'après
//! les noms de fichiers : un jeton d'État (`pr`, `parana`, ...) et, pour
//! les communes, un jeton municipal (`munic`, `municipio`, ...). Les
//! archives du dossier des États sont extraites au passage.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::archive;

/// Jetons indiquant une couche de communes
pub const MUNICIPALITY_TOKENS: [&str; 5] = ["munic", "municip", "municipio", "município", "munis"];

/// Extensions de sources vectorielles recherchées
pub const VECTOR_EXTENSIONS: [&str; 3] = ["shp", "gpkg", "geojson"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with('.') || n == "target" || n == "node_modules")
}

/// Fichiers d'un dossier (récursif) ayant une des extensions, triés par chemin
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        })
        .collect();
    found.sort();
    found
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

/// Vrai si le nom contient un des jetons d'État
///
/// Les jetons courts (sigles) doivent correspondre à un mot entier du nom ;
/// les noms longs sont cherchés comme sous-chaînes.
pub fn mentions_state(name: &str, tokens: &[String]) -> bool {
    let name = name.to_lowercase();
    let words: Vec<&str> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    tokens.iter().any(|token| {
        let token = token.to_lowercase();
        if token.chars().count() <= 3 {
            words.iter().any(|w| *w == token)
        } else {
            name.contains(&token)
        }
    })
}

/// Vrai si le nom désigne une couche de communes
pub fn mentions_municipalities(name: &str) -> bool {
    let name = name.to_lowercase();
    MUNICIPALITY_TOKENS.iter().any(|t| name.contains(t))
}

/// Shapefile de limite d'État
///
/// Cherche d'abord dans `states_dir` (archives extraites), en préférant les
/// fichiers qui ne sont pas des couches de communes, puis dans `base_dir`.
pub fn find_state_boundary(states_dir: &Path, base_dir: &Path, tokens: &[String]) -> Option<PathBuf> {
    archive::extract_all(states_dir);

    let in_states = files_with_extensions(states_dir, &["shp"]);
    let matching: Vec<&PathBuf> = in_states
        .iter()
        .filter(|p| mentions_state(&file_name_lower(p), tokens))
        .collect();

    let found = matching
        .iter()
        .find(|p| !mentions_municipalities(&file_name_lower(p)))
        .or_else(|| matching.first())
        .map(|p| p.to_path_buf())
        .or_else(|| {
            files_with_extensions(base_dir, &["shp"])
                .into_iter()
                .find(|p| mentions_state(&file_name_lower(p), tokens))
        });

    debug!(?found, ?tokens, "State boundary lookup");
    found
}

/// Source de toutes les communes d'une UF
///
/// Ordre : shapefiles de `states_dir`, puis shapefiles et GeoPackages de
/// `base_dir`. Le nom doit porter un jeton municipal et un jeton d'État.
pub fn find_state_municipalities(states_dir: &Path, base_dir: &Path, tokens: &[String]) -> Option<PathBuf> {
    archive::extract_all(states_dir);

    let matches = |p: &PathBuf| {
        let name = file_name_lower(p);
        mentions_municipalities(&name) && mentions_state(&name, tokens)
    };

    let found = files_with_extensions(states_dir, &["shp"])
        .into_iter()
        .find(|p| matches(p))
        .or_else(|| {
            files_with_extensions(base_dir, &["shp"])
                .into_iter()
                .find(|p| matches(p))
        })
        .or_else(|| {
            files_with_extensions(base_dir, &["gpkg"])
                .into_iter()
                .find(|p| matches(p))
        });

    debug!(?found, ?tokens, "State municipalities lookup");
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mentions_state() {
        let pr = tokens(&["pr", "parana", "paraná"]);
        assert!(mentions_state("PR_Municipios_2022.shp", &pr));
        assert!(mentions_state("limite_parana.shp", &pr));
        assert!(!mentions_state("projeto_sc.shp", &pr));

        let rs = tokens(&["rs", "rio_grande_do_sul", "rio grande do sul"]);
        assert!(mentions_state("RS_UF_2022.shp", &rs));
        assert!(!mentions_state("cursos_dagua.shp", &rs));
    }

    #[test]
    fn test_mentions_municipalities() {
        assert!(mentions_municipalities("PR_Municipios_2022.shp"));
        assert!(mentions_municipalities("sc_munis.gpkg"));
        assert!(!mentions_municipalities("PR_UF_2022.shp"));
    }

    #[test]
    fn test_find_in_directories() {
        let dir = tempfile::tempdir().unwrap();
        let states = dir.path().join("Shapefile_Estados");
        std::fs::create_dir_all(states.join("PR_UF_2022")).unwrap();
        std::fs::create_dir_all(states.join("PR_Municipios_2022")).unwrap();
        std::fs::write(states.join("PR_UF_2022/PR_UF_2022.shp"), b"").unwrap();
        std::fs::write(states.join("PR_Municipios_2022/PR_Municipios_2022.shp"), b"").unwrap();

        let pr = tokens(&["pr", "parana"]);
        assert_eq!(
            find_state_boundary(&states, dir.path(), &pr),
            Some(states.join("PR_UF_2022/PR_UF_2022.shp"))
        );
        assert_eq!(
            find_state_municipalities(&states, dir.path(), &pr),
            Some(states.join("PR_Municipios_2022/PR_Municipios_2022.shp"))
        );
        assert_eq!(find_state_municipalities(&states, dir.path(), &tokens(&["sc"])), None);
    }
}
