//! Lecture des conteneurs géospatiaux (GeoPackage, GeoJSON, Shapefile, archives)
//!
//! Le format est déterminé par l'extension du fichier. Les archives sont
//! extraites dans un dossier homonyme puis traitées comme un dossier de
//! shapefiles (une couche par `.shp`).

pub mod geojson;
pub mod gpkg;
pub mod shp;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::{self, ArchiveKind};
use crate::types::{GeometryKind, Layer, LayerInfo, LoadOutcome};
use crate::GeoError;

/// Formats de source reconnus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    GeoPackage,
    GeoJson,
    Shapefile,
    Archive(ArchiveKind),
}

impl SourceFormat {
    /// Détecte le format d'après l'extension (insensible à la casse)
    pub fn from_path(path: &Path) -> Result<Self, GeoError> {
        if let Some(kind) = ArchiveKind::from_path(path) {
            return Ok(Self::Archive(kind));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "gpkg" => Ok(Self::GeoPackage),
            "geojson" | "json" => Ok(Self::GeoJson),
            "shp" => Ok(Self::Shapefile),
            _ => Err(GeoError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Liste les couches d'une source
pub fn list_layers(path: &Path) -> Result<Vec<LayerInfo>, GeoError> {
    match SourceFormat::from_path(path)? {
        SourceFormat::GeoPackage => gpkg::list_layers(path),
        SourceFormat::GeoJson => Ok(vec![single_layer_info(path, None)]),
        SourceFormat::Shapefile => Ok(vec![single_layer_info(path, shp::detect_epsg(path))]),
        SourceFormat::Archive(_) => {
            let dir = archive::extract_beside(path)?;
            Ok(shapefiles_in(&dir)
                .iter()
                .map(|shp| single_layer_info(shp, shp::detect_epsg(shp)))
                .collect())
        }
    }
}

/// Lit une couche nommée, ou la première couche si `layer` vaut `None`
pub fn read_layer(path: &Path, layer: Option<&str>) -> Result<Layer, GeoError> {
    match SourceFormat::from_path(path)? {
        SourceFormat::GeoPackage => gpkg::read_layer(path, layer),
        SourceFormat::GeoJson => {
            check_single_layer(path, layer)?;
            geojson::read_layer(path)
        }
        SourceFormat::Shapefile => {
            check_single_layer(path, layer)?;
            shp::read_layer(path)
        }
        SourceFormat::Archive(_) => {
            let dir = archive::extract_beside(path)?;
            let shapefiles = shapefiles_in(&dir);
            let chosen = match layer {
                Some(name) => shapefiles
                    .iter()
                    .find(|p| layer_name(p).eq_ignore_ascii_case(name))
                    .ok_or_else(|| GeoError::layer_not_found(path.display().to_string(), name))?,
                None => shapefiles.first().ok_or_else(|| GeoError::NoMatchingLayer {
                    path: path.display().to_string(),
                    kind: "shapefile".to_string(),
                })?,
            };
            shp::read_layer(chosen)
        }
    }
}

/// Charge une couche sans jamais échouer : fichier absent → `Empty`
pub fn load(path: &Path, layer: Option<&str>) -> LoadOutcome {
    let source = match layer {
        Some(name) => format!("{}:{}", path.display(), name),
        None => path.display().to_string(),
    };
    if !path.exists() {
        return LoadOutcome::Empty { source };
    }
    LoadOutcome::from_result(source, read_layer(path, layer))
}

/// Sélectionne la première couche dont le type géométrique correspond
///
/// Les types déclarés sont testés d'abord ; les couches sans type déclaré
/// (ou déclarées "GEOMETRY") sont lues et leur contenu est testé. À défaut,
/// la première couche est retournée.
pub fn find_layer(path: &Path, kind: GeometryKind) -> LoadOutcome {
    if !path.exists() {
        return LoadOutcome::Empty {
            source: path.display().to_string(),
        };
    }

    let layers = match list_layers(path) {
        Ok(layers) => layers,
        Err(e) => return LoadOutcome::Failed(e),
    };

    if let Some(info) = layers.iter().find(|info| {
        info.geometry_type
            .as_deref()
            .is_some_and(|t| kind.matches(t))
    }) {
        debug!(layer = %info.name, kind = %kind, "Layer selected from declared type");
        return load(path, Some(&info.name));
    }

    for info in &layers {
        if let Ok(layer) = read_layer(path, Some(&info.name)) {
            if layer.geometry_kind() == Some(kind) {
                debug!(layer = %info.name, kind = %kind, "Layer selected from content");
                return LoadOutcome::from_result(info.name.clone(), Ok(layer));
            }
        }
    }

    match layers.first() {
        Some(first) => {
            tracing::warn!(
                path = %path.display(),
                layer = %first.name,
                kind = %kind,
                "No layer of the expected kind, using the first one"
            );
            load(path, Some(&first.name))
        }
        None => LoadOutcome::Empty {
            source: path.display().to_string(),
        },
    }
}

/// Nom de couche d'un fichier simple (stem)
pub fn layer_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("layer")
        .to_string()
}

/// Shapefiles d'un dossier, récursivement, triés par chemin
pub fn shapefiles_in(dir: &Path) -> Vec<PathBuf> {
    crate::discover::files_with_extensions(dir, &["shp"])
}

fn single_layer_info(path: &Path, epsg: Option<u32>) -> LayerInfo {
    LayerInfo {
        name: layer_name(path),
        geometry_type: None,
        feature_count: None,
        epsg,
    }
}

fn check_single_layer(path: &Path, layer: Option<&str>) -> Result<(), GeoError> {
    match layer {
        Some(name) if !layer_name(path).eq_ignore_ascii_case(name) => Err(
            GeoError::layer_not_found(path.display().to_string(), name),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a/linhas.GPKG")).unwrap(),
            SourceFormat::GeoPackage
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("mun.geojson")).unwrap(),
            SourceFormat::GeoJson
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("PR.zip")).unwrap(),
            SourceFormat::Archive(ArchiveKind::Zip)
        );
        assert!(SourceFormat::from_path(Path::new("notes.txt")).is_err());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let outcome = load(Path::new("does/not/exist.gpkg"), None);
        assert!(matches!(outcome, LoadOutcome::Empty { .. }));
        let outcome = find_layer(Path::new("does/not/exist.gpkg"), GeometryKind::Line);
        assert!(matches!(outcome, LoadOutcome::Empty { .. }));
    }

    #[test]
    fn test_check_single_layer() {
        let path = Path::new("dir/municipios.geojson");
        assert!(check_single_layer(path, None).is_ok());
        assert!(check_single_layer(path, Some("MUNICIPIOS")).is_ok());
        assert!(check_single_layer(path, Some("linhas")).is_err());
    }
}
