//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Sources supportées :
//! - Géographique WGS84 (EPSG:4326) et SIRGAS 2000 (EPSG:4674)
//! - Web Mercator (EPSG:3857)
//! - UTM SIRGAS 2000 (EPSG:31971–31985) et UTM WGS84 (EPSG:326xx / 327xx)
//!
//! Cibles supportées :
//! - WGS84 (EPSG:4326), SIRGAS 2000 (EPSG:4674)
//! - Web Mercator (EPSG:3857)
//!
//! SIRGAS 2000 et WGS84 sont confondus (écart centimétrique).

mod ellipsoid;
mod mercator;
#[cfg(feature = "reproject")]
pub mod proj;
mod smart;
mod utm;

pub use ellipsoid::{Ellipsoid, GRS80, WGS84};
pub use smart::SmartReprojector;
pub use utm::UtmZone;

use geo::{Coord, Geometry, MapCoords};

use crate::GeoError;

/// EPSG WGS84 géographique
pub const EPSG_WGS84: u32 = 4326;

/// EPSG SIRGAS 2000 géographique
pub const EPSG_SIRGAS2000: u32 = 4674;

/// EPSG Web Mercator
pub const EPSG_WEB_MERCATOR: u32 = 3857;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Vrai pour un système géographique traité comme WGS84
pub fn is_geographic(epsg: u32) -> bool {
    matches!(epsg, EPSG_WGS84 | EPSG_SIRGAS2000)
}

/// Reprojection légère pour les systèmes usuels au Brésil
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source_epsg: u32,
    target_epsg: u32,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeoError> {
        if !Self::is_supported_source(source_epsg) {
            return Err(GeoError::UnknownProjection(format!(
                "EPSG:{} non supporté. Sources supportées: 4326, 4674, 3857, 31971-31985, 326xx, 327xx",
                source_epsg
            )));
        }
        if !Self::is_supported_target(target_epsg) {
            return Err(GeoError::UnknownProjection(format!(
                "EPSG:{} non supporté. Cibles supportées: 4326, 4674, 3857",
                target_epsg
            )));
        }

        Ok(Self {
            source_epsg,
            target_epsg,
        })
    }

    /// Vérifie si l'EPSG source est supporté
    pub fn is_supported_source(epsg: u32) -> bool {
        is_geographic(epsg) || epsg == EPSG_WEB_MERCATOR || UtmZone::from_epsg(epsg).is_some()
    }

    /// Vérifie si l'EPSG cible est supporté
    pub fn is_supported_target(epsg: u32) -> bool {
        is_geographic(epsg) || epsg == EPSG_WEB_MERCATOR
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        Self::is_supported_source(source) && Self::is_supported_target(target)
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), GeoError> {
        let geo = self.source_to_geographic(x, y)?;
        let (tx, ty) = self.geographic_to_target(geo)?;

        if !tx.is_finite() || !ty.is_finite() {
            return Err(GeoError::reprojection(format!(
                "non-finite result for ({}, {}) EPSG:{} → EPSG:{}",
                x, y, self.source_epsg, self.target_epsg
            )));
        }
        Ok((tx, ty))
    }

    fn source_to_geographic(&self, x: f64, y: f64) -> Result<Geographic, GeoError> {
        if is_geographic(self.source_epsg) {
            return Ok(Geographic::from_degrees(x, y));
        }
        if self.source_epsg == EPSG_WEB_MERCATOR {
            return Ok(mercator::web_mercator_to_geographic(x, y));
        }
        UtmZone::from_epsg(self.source_epsg)
            .map(|zone| zone.to_geographic(x, y))
            .ok_or_else(|| GeoError::UnknownProjection(format!("EPSG:{}", self.source_epsg)))
    }

    fn geographic_to_target(&self, geo: Geographic) -> Result<(f64, f64), GeoError> {
        match self.target_epsg {
            EPSG_WGS84 | EPSG_SIRGAS2000 => Ok(geo.to_degrees()),
            EPSG_WEB_MERCATOR => Ok(mercator::geographic_to_web_mercator(geo)),
            other => Err(GeoError::UnknownProjection(format!("EPSG:{}", other))),
        }
    }

    /// Transforme une géométrie (tous types)
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, GeoError> {
        geom.try_map_coords(|c: Coord| {
            let (x, y) = self.transform_point(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    #[test]
    fn test_sirgas_utm_to_wgs84() {
        let reproj = ReprojectorLite::new(31982, 4326).unwrap();
        let (lon, lat) = reproj.transform_point(673000.0, 7185000.0).unwrap();

        assert!((lon - (-49.27)).abs() < 0.1, "lon={}", lon);
        assert!((lat - (-25.43)).abs() < 0.1, "lat={}", lat);
    }

    #[test]
    fn test_web_mercator_roundtrip_geometry() {
        let to_metric = ReprojectorLite::new(4326, 3857).unwrap();
        let to_degrees = ReprojectorLite::new(3857, 4326).unwrap();

        let line: Geometry = line_string![(x: -54.58, y: -25.54), (x: -53.46, y: -24.95)].into();
        let metric = to_metric.transform_geometry(&line).unwrap();
        let back = to_degrees.transform_geometry(&metric).unwrap();

        let Geometry::LineString(ls) = back else {
            panic!("expected a LineString");
        };
        assert!((ls.0[0].x - (-54.58)).abs() < 1e-9);
        assert!((ls.0[1].y - (-24.95)).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_with_hole() {
        let reproj = ReprojectorLite::new(4674, 3857).unwrap();
        let poly: Geometry = polygon!(
            exterior: [(x: -52.0, y: -26.0), (x: -51.0, y: -26.0), (x: -51.0, y: -25.0), (x: -52.0, y: -26.0)],
            interiors: [[(x: -51.8, y: -25.9), (x: -51.5, y: -25.9), (x: -51.5, y: -25.6), (x: -51.8, y: -25.9)]],
        )
        .into();
        let Geometry::Polygon(p) = reproj.transform_geometry(&poly).unwrap() else {
            panic!("expected a Polygon");
        };
        assert_eq!(p.interiors().len(), 1);
        assert!(p.exterior().0[0].x < -5_700_000.0);
    }

    #[test]
    fn test_unsupported_epsg() {
        assert!(ReprojectorLite::new(2154, 4326).is_err());
        assert!(ReprojectorLite::new(4326, 31982).is_err());
        assert!(ReprojectorLite::is_supported(32722, 3857));
    }
}
