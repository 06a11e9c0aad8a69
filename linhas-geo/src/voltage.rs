//! Classe de tension d'une ligne de transmission

use std::cmp::Ordering;
use std::fmt;

/// Libellé des lignes sans attribut de tension
pub const ALL_LABEL: &str = "TODAS";

/// Libellé de la couche de base (toutes tensions confondues)
pub const BASE_LABEL: &str = "BASE";

/// Classe de tension (230, 500, 525, 600, 765 kV, BASE, TODAS)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VoltageClass {
    /// Tension nominale en kV
    Kv(u32),
    /// Couche de base non filtrée
    Base,
    /// Ligne sans attribut de tension
    All,
    /// Valeur non numérique conservée telle quelle
    Other(String),
}

impl VoltageClass {
    /// Normalise une valeur brute : "500", "500.0", " 500 " → `Kv(500)`
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();
        if value.eq_ignore_ascii_case(BASE_LABEL) {
            return Self::Base;
        }
        if value.is_empty() || value.eq_ignore_ascii_case(ALL_LABEL) {
            return Self::All;
        }
        let numeric = value
            .trim_end_matches("kV")
            .trim_end_matches("KV")
            .trim_end_matches("kv")
            .trim();
        match fast_float::parse::<f64, _>(numeric) {
            Ok(kv) if kv.is_finite() && kv >= 0.0 && kv <= u32::MAX as f64 && kv.fract() == 0.0 => {
                Self::Kv(kv as u32)
            }
            _ => Self::Other(value.to_string()),
        }
    }

    /// Tension déduite d'un nom de couche ou de fichier
    ///
    /// `linha_trans_500_PR` → `Kv(500)`, `municipios_base_SC` → `Base`.
    /// Le premier jeton de trois chiffres l'emporte.
    pub fn from_layer_name(name: &str) -> Option<Self> {
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        let tokens: Vec<&str> = stem.split(['_', '-', ' ']).collect();

        if let Some(kv) = tokens
            .iter()
            .map(|t| t.trim_end_matches("kV").trim_end_matches("kv"))
            .find(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_digit()))
            .and_then(|t| t.parse().ok())
        {
            return Some(Self::Kv(kv));
        }

        tokens
            .iter()
            .any(|t| t.eq_ignore_ascii_case("base"))
            .then_some(Self::Base)
    }

    /// Vrai pour une tension propre à une ligne (ni BASE ni TODAS)
    pub fn is_specific(&self) -> bool {
        matches!(self, Self::Kv(_) | Self::Other(_))
    }

    /// Libellé de ligne utilisé dans les tableaux : "500 kV" ou "BASE"
    pub fn line_label(&self) -> String {
        match self {
            Self::Kv(kv) => format!("{} kV", kv),
            Self::Base | Self::All => BASE_LABEL.to_string(),
            Self::Other(v) => format!("{} kV", v),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Kv(_) => 0,
            Self::Other(_) => 1,
            Self::Base => 2,
            Self::All => 3,
        }
    }
}

impl fmt::Display for VoltageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kv(kv) => write!(f, "{}", kv),
            Self::Base => f.write_str(BASE_LABEL),
            Self::All => f.write_str(ALL_LABEL),
            Self::Other(v) => f.write_str(v),
        }
    }
}

impl Ord for VoltageClass {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Kv(a), Self::Kv(b)) => a.cmp(b),
            (Self::Other(a), Self::Other(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for VoltageClass {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_forms() {
        assert_eq!(VoltageClass::parse("500"), VoltageClass::Kv(500));
        assert_eq!(VoltageClass::parse("500.0"), VoltageClass::Kv(500));
        assert_eq!(VoltageClass::parse(" 230 "), VoltageClass::Kv(230));
        assert_eq!(VoltageClass::parse("765 kV"), VoltageClass::Kv(765));
    }

    #[test]
    fn test_parse_out_of_range() {
        assert_eq!(VoltageClass::parse("1e12"), VoltageClass::Other("1e12".to_string()));
        assert_eq!(VoltageClass::parse("-500"), VoltageClass::Other("-500".to_string()));
        assert_eq!(VoltageClass::parse("4294967295"), VoltageClass::Kv(u32::MAX));
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(VoltageClass::parse("BASE"), VoltageClass::Base);
        assert_eq!(VoltageClass::parse("todas"), VoltageClass::All);
        assert_eq!(VoltageClass::parse(""), VoltageClass::All);
        assert_eq!(
            VoltageClass::parse("138/69"),
            VoltageClass::Other("138/69".to_string())
        );
    }

    #[test]
    fn test_from_layer_name() {
        assert_eq!(
            VoltageClass::from_layer_name("linha_trans_500_PR"),
            Some(VoltageClass::Kv(500))
        );
        assert_eq!(
            VoltageClass::from_layer_name("municipios_afetados_linha_trans_230_SC.csv"),
            Some(VoltageClass::Kv(230))
        );
        assert_eq!(
            VoltageClass::from_layer_name("municipios_base_RS.csv"),
            Some(VoltageClass::Base)
        );
        assert_eq!(VoltageClass::from_layer_name("linhas_recortadas"), None);
    }

    #[test]
    fn test_display_and_label() {
        assert_eq!(VoltageClass::Kv(525).to_string(), "525");
        assert_eq!(VoltageClass::Kv(525).line_label(), "525 kV");
        assert_eq!(VoltageClass::Base.line_label(), "BASE");
        assert_eq!(VoltageClass::All.to_string(), "TODAS");
    }

    #[test]
    fn test_ordering() {
        let mut classes = vec![
            VoltageClass::All,
            VoltageClass::Kv(765),
            VoltageClass::Base,
            VoltageClass::Kv(230),
            VoltageClass::Other("x".to_string()),
        ];
        classes.sort();
        assert_eq!(
            classes,
            vec![
                VoltageClass::Kv(230),
                VoltageClass::Kv(765),
                VoltageClass::Other("x".to_string()),
                VoltageClass::Base,
                VoltageClass::All,
            ]
        );
    }
}
