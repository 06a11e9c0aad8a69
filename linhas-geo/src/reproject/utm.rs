//! Projection UTM (Universal Transverse Mercator), sens inverse
//!
//! Zones utiles au sud du Brésil : 21S (oeste do PR/RS), 22S (PR, SC, RS),
//! 23S. Le datum est SIRGAS 2000 (GRS80) ou WGS84 selon le code EPSG.

use super::ellipsoid::{Ellipsoid, GRS80, WGS84};
use super::Geographic;

/// Paramètres UTM d'un code EPSG
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmZone {
    pub zone: u32,
    pub south: bool,
    pub ellipsoid: Ellipsoid,
}

impl UtmZone {
    /// Décode les codes SIRGAS 2000 (31971–31985) et WGS84 (326xx, 327xx)
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let (zone, south, ellipsoid) = match epsg {
            31971..=31976 => (epsg - 31954, false, GRS80),
            31977..=31985 => (epsg - 31960, true, GRS80),
            32601..=32660 => (epsg - 32600, false, WGS84),
            32701..=32760 => (epsg - 32700, true, WGS84),
            _ => return None,
        };
        Some(Self {
            zone,
            south,
            ellipsoid,
        })
    }

    pub fn to_geographic(&self, x: f64, y: f64) -> Geographic {
        utm_to_geographic(x, y, self.zone, self.south, &self.ellipsoid)
    }
}

/// Convertit UTM vers coordonnées géographiques
pub fn utm_to_geographic(x: f64, y: f64, zone: u32, south: bool, ellipsoid: &Ellipsoid) -> Geographic {
    let a = ellipsoid.a;
    let e2 = ellipsoid.e2();
    let ep2 = ellipsoid.ep2();

    let k0 = 0.9996;
    let x0 = 500000.0;
    let y0 = if south { 10000000.0 } else { 0.0 };

    // Longitude centrale de la zone
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let x = x - x0;
    let y = y - y0;

    // Latitude du pied de la perpendiculaire
    let m = y / k0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * k0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Geographic::new(lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_epsg() {
        let z = UtmZone::from_epsg(31982).unwrap();
        assert_eq!((z.zone, z.south), (22, true));
        assert_eq!(z.ellipsoid, GRS80);

        let z = UtmZone::from_epsg(31976).unwrap();
        assert_eq!((z.zone, z.south), (22, false));

        let z = UtmZone::from_epsg(32721).unwrap();
        assert_eq!((z.zone, z.south), (21, true));
        assert_eq!(z.ellipsoid, WGS84);

        assert!(UtmZone::from_epsg(4326).is_none());
    }

    #[test]
    fn test_curitiba_22s() {
        // Curitiba approximativement : 673000 E, 7185000 N (zone 22S)
        let geo = UtmZone::from_epsg(31982).unwrap().to_geographic(673000.0, 7185000.0);
        let (lon, lat) = geo.to_degrees();

        // Curitiba: -49.27°, -25.43°
        assert!((lon - (-49.27)).abs() < 0.1, "lon={}", lon);
        assert!((lat - (-25.43)).abs() < 0.1, "lat={}", lat);
    }

    #[test]
    fn test_central_meridian() {
        // Sur le méridien central, la longitude vaut exactement lon0
        let geo = utm_to_geographic(500000.0, 7000000.0, 22, true, &GRS80);
        let (lon, _) = geo.to_degrees();
        assert!((lon - (-51.0)).abs() < 1e-9, "lon={}", lon);
    }
}
