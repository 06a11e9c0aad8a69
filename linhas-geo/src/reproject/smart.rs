//! Reprojection intelligente : reprojection légère en priorité, fallback sur proj
//!
//! Utilise automatiquement la meilleure option disponible.

use super::{is_geographic, ReprojectorLite};
use crate::GeoError;
use geo::Geometry;

/// Reprojection intelligente
///
/// Essaie d'abord la reprojection légère (pure Rust), puis PROJ si le
/// feature `reproject` est activé.
#[derive(Debug)]
pub enum SmartReprojector {
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(super::proj::Reprojector),
    /// Pas de reprojection (source == cible, ou deux systèmes géographiques)
    Identity,
}

impl SmartReprojector {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoError> {
        if source_epsg == target_epsg || (is_geographic(source_epsg) && is_geographic(target_epsg)) {
            return Ok(Self::Identity);
        }

        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return Ok(Self::Lite(ReprojectorLite::new(source_epsg, target_epsg)?));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = super::proj::Reprojector::new(source_epsg, target_epsg)?;
            return Ok(Self::Proj(proj));
        }

        #[cfg(not(feature = "reproject"))]
        return Err(GeoError::UnknownProjection(format!(
            "Reprojection EPSG:{} → EPSG:{} non supportée sans le feature `reproject`",
            source_epsg, target_epsg
        )));
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, GeoError> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Lite(_) => "lite (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}
