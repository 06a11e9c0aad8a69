//! Normalisation des coordonnées avant tout calcul de distance ou d'intersection
//!
//! Toutes les couches sont ramenées en EPSG:4326 pour le stockage et
//! l'affichage ; les opérations métriques (buffer, simplification) passent
//! par EPSG:3857. Un échec de reprojection n'est jamais fatal : la couche
//! garde ses coordonnées d'origine et le résultat est marqué `Degraded`.

use geo::{Area, Geometry, LineString, MultiLineString, MultiPolygon, Polygon, Simplify};
use tracing::{debug, warn};

use crate::reproject::{SmartReprojector, EPSG_WEB_MERCATOR, EPSG_WGS84};
use crate::types::Layer;
use crate::GeoError;

/// Mètres par degré à l'équateur, pour les tolérances de repli
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Issue d'une normalisation de couche
#[derive(Debug, Clone, PartialEq)]
pub enum Normalization {
    /// Déjà dans le système cible
    Unchanged,
    /// Reprojetée avec succès
    Reprojected { from: u32, to: u32 },
    /// Coordonnées d'origine conservées
    Degraded { reason: String },
}

impl Normalization {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Reprojette une couche vers `target`, sans jamais échouer
pub fn normalize(layer: &Layer, target: u32) -> (Layer, Normalization) {
    let Some(source) = layer.epsg else {
        let reason = format!("layer '{}' has no known CRS", layer.name);
        warn!(layer = %layer.name, target, "Unknown CRS, keeping original coordinates");
        return (layer.clone(), Normalization::Degraded { reason });
    };

    match reproject_layer(layer, source, target) {
        Ok(reprojected) if source == target => (reprojected, Normalization::Unchanged),
        Ok(reprojected) => {
            debug!(layer = %layer.name, from = source, to = target, "Layer reprojected");
            (
                reprojected,
                Normalization::Reprojected {
                    from: source,
                    to: target,
                },
            )
        }
        Err(e) => {
            warn!(layer = %layer.name, from = source, to = target, error = %e, "Reprojection failed, keeping original coordinates");
            (
                layer.clone(),
                Normalization::Degraded {
                    reason: e.to_string(),
                },
            )
        }
    }
}

fn reproject_layer(layer: &Layer, source: u32, target: u32) -> Result<Layer, GeoError> {
    let reprojector = SmartReprojector::new(source, target)?;
    let features = layer
        .features
        .iter()
        .map(|f| {
            let mut feature = f.clone();
            feature.geometry = reprojector.transform_geometry(&f.geometry)?;
            Ok(feature)
        })
        .collect::<Result<Vec<_>, GeoError>>()?;

    let mut out = layer.with_features(features);
    out.epsg = Some(target);
    Ok(out)
}

/// Reprojette une géométrie isolée
pub fn project(geometry: &Geometry, source: u32, target: u32) -> Result<Geometry, GeoError> {
    SmartReprojector::new(source, target)?.transform_geometry(geometry)
}

/// Simplifie une géométrie WGS84 avec une tolérance en mètres
///
/// La simplification (Douglas-Peucker) est faite en Web Mercator. Si
/// l'aller-retour échoue, la tolérance est convertie en degrés. Retourne
/// `None` si la géométrie disparaît.
pub fn simplify_metric(geometry: &Geometry, tolerance_m: f64) -> Option<Geometry> {
    if tolerance_m <= 0.0 {
        return Some(geometry.clone());
    }

    let metric = project(geometry, EPSG_WGS84, EPSG_WEB_MERCATOR)
        .map(|g| simplify_geometry(&g, tolerance_m))
        .and_then(|g| g.map(|g| project(&g, EPSG_WEB_MERCATOR, EPSG_WGS84)).transpose());

    match metric {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "Metric simplification failed, using degrees");
            let tolerance_deg = (tolerance_m / METERS_PER_DEGREE).max(1e-6);
            simplify_geometry(geometry, tolerance_deg)
        }
    }
}

fn simplify_geometry(geometry: &Geometry, epsilon: f64) -> Option<Geometry> {
    let simplified = match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(&epsilon)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(&epsilon)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&epsilon)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&epsilon)),
        other => other.clone(),
    };
    drop_degenerate(simplified, epsilon * epsilon)
}

/// Retire les anneaux et lignes devenus dégénérés
///
/// Douglas-Peucker garde toujours quatre sommets par anneau : un polygone
/// effondré se reconnaît à son aire, inférieure à `min_area`.
fn drop_degenerate(geometry: Geometry, min_area: f64) -> Option<Geometry> {
    fn line_ok(ls: &LineString) -> bool {
        ls.0.len() >= 2
    }
    let ring_ok = |ring: &LineString| {
        ring.0.len() >= 4 && Polygon::new(ring.clone(), vec![]).unsigned_area() > min_area
    };
    let polygon_ok = |p: Polygon| {
        if !ring_ok(p.exterior()) {
            return None;
        }
        let (exterior, interiors) = p.into_inner();
        let interiors = interiors.into_iter().filter(|r| ring_ok(r)).collect();
        Some(Polygon::new(exterior, interiors))
    };

    match geometry {
        Geometry::LineString(ls) => line_ok(&ls).then_some(Geometry::LineString(ls)),
        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString> = mls.0.into_iter().filter(line_ok).collect();
            (!lines.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(lines)))
        }
        Geometry::Polygon(p) => polygon_ok(p).map(Geometry::Polygon),
        Geometry::MultiPolygon(mp) => {
            let polys: Vec<Polygon> = mp.0.into_iter().filter_map(polygon_ok).collect();
            (!polys.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(polys)))
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use geo::{line_string, polygon};
    use std::collections::BTreeMap;

    fn layer(epsg: Option<u32>, geometry: Geometry) -> Layer {
        Layer::new(
            "l",
            epsg,
            vec![Feature {
                id: "1".to_string(),
                geometry,
                properties: BTreeMap::new(),
            }],
        )
    }

    #[test]
    fn test_normalize_unchanged() {
        let l = layer(Some(4326), line_string![(x: -54.0, y: -25.0), (x: -53.0, y: -25.0)].into());
        let (out, n) = normalize(&l, 4326);
        assert_eq!(n, Normalization::Unchanged);
        assert_eq!(out.epsg, Some(4326));
    }

    #[test]
    fn test_normalize_reprojects_utm() {
        let l = layer(Some(31982), line_string![(x: 673000.0, y: 7185000.0), (x: 674000.0, y: 7185000.0)].into());
        let (out, n) = normalize(&l, 4326);
        assert_eq!(n, Normalization::Reprojected { from: 31982, to: 4326 });
        let Geometry::LineString(ls) = &out.features[0].geometry else {
            panic!("expected a LineString");
        };
        assert!((ls.0[0].x - (-49.27)).abs() < 0.1);
    }

    #[test]
    fn test_normalize_unknown_crs_is_degraded() {
        let geometry: Geometry = line_string![(x: 1.0, y: 2.0), (x: 3.0, y: 4.0)].into();
        let (out, n) = normalize(&layer(None, geometry.clone()), 4326);
        assert!(n.is_degraded());
        assert_eq!(out.features[0].geometry, geometry);
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_normalize_unsupported_crs_is_degraded() {
        let geometry: Geometry = line_string![(x: 700000.0, y: 6600000.0), (x: 700100.0, y: 6600000.0)].into();
        let (out, n) = normalize(&layer(Some(2154), geometry.clone()), 4326);
        assert!(n.is_degraded());
        assert_eq!(out.epsg, Some(2154));
        assert_eq!(out.features[0].geometry, geometry);
    }

    #[test]
    fn test_simplify_metric_removes_small_wiggles() {
        // Zigzag de ~10 m autour d'une droite de ~10 km
        let line: Geometry = line_string![
            (x: -51.0, y: -26.0),
            (x: -50.95, y: -26.00005),
            (x: -50.9, y: -26.0),
        ]
        .into();
        let simplified = simplify_metric(&line, 60.0).unwrap();
        let Geometry::LineString(ls) = simplified else {
            panic!("expected a LineString");
        };
        assert_eq!(ls.0.len(), 2);
    }

    #[test]
    fn test_simplify_metric_drops_tiny_polygon() {
        let tiny: Geometry = polygon![
            (x: -51.0, y: -26.0),
            (x: -50.99999, y: -26.0),
            (x: -50.99999, y: -25.99999),
            (x: -51.0, y: -26.0),
        ]
        .into();
        assert!(simplify_metric(&tiny, 100.0).is_none());
    }

    #[test]
    fn test_simplify_metric_keeps_large_parts() {
        let big = polygon![
            (x: -51.0, y: -26.0),
            (x: -50.9, y: -26.0),
            (x: -50.9, y: -25.9),
            (x: -51.0, y: -25.9),
            (x: -51.0, y: -26.0),
        ];
        let tiny = polygon![
            (x: -50.0, y: -26.0),
            (x: -49.99999, y: -26.0),
            (x: -49.99999, y: -25.99999),
            (x: -50.0, y: -26.0),
        ];
        let multi: Geometry = MultiPolygon::new(vec![big, tiny]).into();
        let Some(Geometry::MultiPolygon(mp)) = simplify_metric(&multi, 100.0) else {
            panic!("expected a MultiPolygon");
        };
        assert_eq!(mp.0.len(), 1);
        assert!(mp.0[0].unsigned_area() > 0.005);
    }
}
