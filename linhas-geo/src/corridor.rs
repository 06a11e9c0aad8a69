//! Faixa de servidão : buffer métrique autour des lignes
//!
//! Le buffer est l'union implicite de « capsules » : pour chaque segment,
//! l'enveloppe convexe des cercles centrés sur ses deux extrémités. Les
//! capsules ne sont pas fusionnées, le résultat est un `MultiPolygon`
//! utilisé pour des tests d'intersection.

use std::f64::consts::TAU;

use geo::{ConvexHull, Coord, Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon, Simplify};

use crate::normalize::project;
use crate::reproject::{EPSG_WEB_MERCATOR, EPSG_WGS84};
use crate::GeoError;

/// Segments par quart de cercle
pub const QUAD_SEGMENTS: usize = 8;

/// Cercle approché autour d'un point
fn circle(center: Coord, radius: f64) -> Vec<Point> {
    let steps = QUAD_SEGMENTS * 4;
    (0..steps)
        .map(|i| {
            let angle = TAU * i as f64 / steps as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// Capsule autour d'un segment (ou disque si le segment est un point)
fn capsule(a: Coord, b: Coord, radius: f64) -> Polygon {
    let mut points = circle(a, radius);
    if a != b {
        points.extend(circle(b, radius));
    }
    MultiPoint::new(points).convex_hull()
}

fn line_capsules(line: &LineString, radius: f64, out: &mut Vec<Polygon>) {
    // Les sommets plus proches que radius/4 de la corde n'élargissent
    // la faixa que d'une fraction négligeable
    let line = line.simplify(&(radius / 4.0));
    match line.0.as_slice() {
        [] => {}
        [single] => out.push(capsule(*single, *single, radius)),
        coords => {
            for pair in coords.windows(2) {
                out.push(capsule(pair[0], pair[1], radius));
            }
        }
    }
}

/// Buffer d'une géométrie en coordonnées projetées (mêmes unités que `distance`)
///
/// Retourne `None` pour une distance nulle ou négative, ou une géométrie vide.
pub fn buffer_projected(geometry: &Geometry, distance: f64) -> Option<MultiPolygon> {
    if distance <= 0.0 {
        return None;
    }

    let mut capsules = Vec::new();
    collect_capsules(geometry, distance, &mut capsules);

    (!capsules.is_empty()).then(|| MultiPolygon::new(capsules))
}

fn collect_capsules(geometry: &Geometry, distance: f64, out: &mut Vec<Polygon>) {
    match geometry {
        Geometry::Point(p) => out.push(capsule(p.0, p.0, distance)),
        Geometry::MultiPoint(mp) => {
            out.extend(mp.iter().map(|p| capsule(p.0, p.0, distance)));
        }
        Geometry::Line(l) => out.push(capsule(l.start, l.end, distance)),
        Geometry::LineString(ls) => line_capsules(ls, distance, out),
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                line_capsules(ls, distance, out);
            }
        }
        Geometry::Polygon(p) => {
            out.push(p.clone());
            line_capsules(p.exterior(), distance, out);
        }
        Geometry::MultiPolygon(mp) => {
            for p in mp {
                out.push(p.clone());
                line_capsules(p.exterior(), distance, out);
            }
        }
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                collect_capsules(g, distance, out);
            }
        }
        Geometry::Rect(r) => collect_capsules(&Geometry::Polygon(r.to_polygon()), distance, out),
        Geometry::Triangle(t) => collect_capsules(&Geometry::Polygon(t.to_polygon()), distance, out),
    }
}

/// Faixa de servidão d'une géométrie WGS84, distance en mètres
///
/// Le buffer est calculé en Web Mercator puis ramené en EPSG:4326.
pub fn corridor_wgs84(geometry: &Geometry, distance_m: f64) -> Result<Option<MultiPolygon>, GeoError> {
    let metric = project(geometry, EPSG_WGS84, EPSG_WEB_MERCATOR)?;
    let Some(buffer) = buffer_projected(&metric, distance_m) else {
        return Ok(None);
    };

    match project(&Geometry::MultiPolygon(buffer), EPSG_WEB_MERCATOR, EPSG_WGS84)? {
        Geometry::MultiPolygon(mp) => Ok(Some(mp)),
        other => Err(GeoError::invalid_geometry(
            "corridor",
            format!("unexpected geometry after reprojection: {:?}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, Area, Contains, Intersects};

    #[test]
    fn test_capsule_contains_segment() {
        let cap = capsule(Coord { x: 0.0, y: 0.0 }, Coord { x: 100.0, y: 0.0 }, 10.0);
        assert!(cap.contains(&Point::new(50.0, 9.0)));
        assert!(cap.contains(&Point::new(-9.0, 0.0)));
        assert!(!cap.contains(&Point::new(50.0, 11.0)));
    }

    #[test]
    fn test_buffer_area_close_to_theory() {
        let line: Geometry = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)].into();
        let buffer = buffer_projected(&line, 50.0).unwrap();
        // Rectangle 1000 x 100 + disque de rayon 50
        let expected = 1000.0 * 100.0 + std::f64::consts::PI * 50.0 * 50.0;
        let area = buffer.unsigned_area();
        assert!((area - expected).abs() / expected < 0.01, "area={}", area);
    }

    #[test]
    fn test_buffer_zero_distance() {
        let line: Geometry = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)].into();
        assert!(buffer_projected(&line, 0.0).is_none());
    }

    #[test]
    fn test_corridor_wgs84_reaches_nearby_point() {
        // Ligne est-ouest ; un point à ~50 m au nord est dans une faixa de 60 m
        let line: Geometry = line_string![(x: -51.0, y: -26.0), (x: -50.99, y: -26.0)].into();
        let corridor = corridor_wgs84(&line, 60.0).unwrap().unwrap();
        let north_50m = Point::new(-50.995, -26.0 + 50.0 / 111_320.0);
        let north_200m = Point::new(-50.995, -26.0 + 200.0 / 111_320.0);
        assert!(corridor.intersects(&north_50m));
        assert!(!corridor.intersects(&north_200m));
    }
}
