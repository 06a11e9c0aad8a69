//! Types d'erreurs pour le crate linhas-geo

use thiserror::Error;

/// Erreurs pouvant survenir lors du chargement ou du traitement des couches
#[derive(Debug, Error)]
pub enum GeoError {
    /// Erreur d'I/O lors de la lecture d'un fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur SQLite (GeoPackage)
    #[error("GeoPackage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Erreur du lecteur shapefile
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// GeoJSON illisible
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Archive zip corrompue
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Blob WKB / GeoPackage non décodable
    #[error("Geometry decoding error: {0}")]
    Decode(#[from] geozero::error::GeozeroError),

    /// Extension de fichier non reconnue
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Couche demandée absente du conteneur
    #[error("Layer '{layer}' not found in {path}")]
    LayerNotFound { path: String, layer: String },

    /// Aucune couche du type attendu
    #[error("No {kind} layer in {path}")]
    NoMatchingLayer { path: String, kind: String },

    /// Géométrie invalide
    #[error("Invalid geometry for {entity_id}: {reason}")]
    InvalidGeometry { entity_id: String, reason: String },

    /// Projection non reconnue
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    /// Échec de reprojection
    #[error("Reprojection failed: {0}")]
    Reprojection(String),
}

impl GeoError {
    /// Crée une erreur de couche absente
    pub fn layer_not_found(path: impl Into<String>, layer: impl Into<String>) -> Self {
        Self::LayerNotFound {
            path: path.into(),
            layer: layer.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(entity_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            entity_id: entity_id.into(),
            reason: reason.into(),
        }
    }

    pub fn reprojection(reason: impl Into<String>) -> Self {
        Self::Reprojection(reason.into())
    }
}
