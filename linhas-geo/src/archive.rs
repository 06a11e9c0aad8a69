//! Extraction des archives (.zip, .tar.bz2) contenant des shapefiles

use bzip2::read::BzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};

use crate::GeoError;

/// Formats d'archive reconnus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarBz2,
}

impl ArchiveKind {
    /// Détecte le format depuis le nom de fichier
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else {
            None
        }
    }
}

/// Nom de base d'une archive (sans .zip, .tar.bz2, .tbz2)
pub fn archive_basename(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");

    let lower = name.to_lowercase();
    let cut = [".tar.bz2", ".tbz2", ".zip"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| name.len() - ext.len())
        .unwrap_or(name.len());

    name[..cut].to_string()
}

/// Extrait une archive dans un dossier homonyme à côté d'elle
///
/// Le dossier existant est réutilisé tel quel : une archive déjà extraite
/// n'est pas réécrite.
///
/// # Returns
///
/// Le chemin du dossier d'extraction
pub fn extract_beside(path: &Path) -> Result<PathBuf, GeoError> {
    let kind = ArchiveKind::from_path(path)
        .ok_or_else(|| GeoError::UnsupportedFormat(path.display().to_string()))?;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let target = parent.join(archive_basename(path));

    if target.is_dir() {
        debug!(archive = %path.display(), "Archive already extracted");
        return Ok(target);
    }

    std::fs::create_dir_all(&target)?;
    let file = File::open(path)?;

    match kind {
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(file)?;
            archive.extract(&target)?;
        }
        ArchiveKind::TarBz2 => {
            let mut archive = Archive::new(BzDecoder::new(file));
            archive.unpack(&target)?;
        }
    }

    info!(archive = %path.display(), target = %target.display(), "Archive extracted");
    Ok(target)
}

/// Extrait toutes les archives d'un dossier (non récursif)
///
/// Les archives illisibles sont ignorées avec un warning.
pub fn extract_all(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut archives: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && ArchiveKind::from_path(p).is_some())
        .collect();
    archives.sort();

    archives
        .iter()
        .filter_map(|archive| match extract_beside(archive) {
            Ok(dir) => Some(dir),
            Err(e) => {
                tracing::warn!(archive = %archive.display(), error = %e, "Could not extract archive");
                None
            }
        })
        .collect()
}
