//! Correspondance des colonnes vers un modèle canonique
//!
//! Les sources nomment différemment le nom de commune, le code IBGE, l'UF,
//! le nom de ligne et la tension. La résolution est faite une seule fois au
//! chargement, via des listes d'alias ordonnées ; les traitements en aval ne
//! manipulent plus que `Municipality` et `TransmissionLine`.

use geo::Geometry;
use tracing::debug;

use crate::types::Layer;
use crate::voltage::VoltageClass;

/// Listes d'alias ordonnées pour chaque colonne canonique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    pub municipality_name: Vec<String>,
    pub municipality_code: Vec<String>,
    pub state: Vec<String>,
    pub line_name: Vec<String>,
    pub voltage: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            municipality_name: owned(&[
                "NM_MUN",
                "NM_MUNICIP",
                "NM_MUNICIPIO",
                "NM_MUNIC",
                "NOME_MUNI",
                "MUNIC",
                "NOME",
                "NAME",
                "nome",
                "name",
                "municipio",
                "nm_mun",
                "nm_municip",
                "nm_municipio",
            ]),
            municipality_code: owned(&["CD_MUN", "CD_MUNICIP", "CD_GEOCMU", "GEOCODIGO"]),
            state: owned(&["UF", "SIGLA_UF", "sigla_uf", "Sigla_UF"]),
            line_name: owned(&["linha_transmissao", "Nome", "nome", "name", "NOME"]),
            voltage: owned(&["Tensao", "tensao", "Tensao_kV", "kV", "KV"]),
        }
    }
}

/// Premier alias présent parmi les colonnes
///
/// Correspondance exacte d'abord, puis insensible à la casse.
pub fn resolve_column(aliases: &[String], columns: &[String]) -> Option<String> {
    aliases
        .iter()
        .find_map(|alias| columns.iter().find(|c| *c == alias).cloned())
        .or_else(|| {
            aliases
                .iter()
                .find_map(|alias| columns.iter().find(|c| c.eq_ignore_ascii_case(alias)).cloned())
        })
}

/// Clé de rapprochement des noms entre sources : majuscules, espaces retirés
///
/// Les accents ne sont pas normalisés.
pub fn match_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Code IBGE normalisé (`4108304.0` → `4108304`)
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    let code = code.strip_suffix(".0").unwrap_or(code);
    (!code.is_empty()).then(|| code.to_string())
}

/// Commune (polygone) au format canonique
#[derive(Debug, Clone)]
pub struct Municipality {
    pub code: Option<String>,
    pub name: String,
    pub state: Option<String>,
    pub geometry: Geometry,
}

/// Ligne de transmission au format canonique
#[derive(Debug, Clone)]
pub struct TransmissionLine {
    pub name: String,
    pub voltage: VoltageClass,
    pub geometry: Geometry,
}

/// Colonnes résolues pour une couche de communes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MunicipalitySchema {
    pub name: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
}

impl MunicipalitySchema {
    pub fn resolve(layer: &Layer, aliases: &ColumnAliases) -> Self {
        let columns = layer.columns();
        Self {
            name: resolve_column(&aliases.municipality_name, &columns),
            code: resolve_column(&aliases.municipality_code, &columns),
            state: resolve_column(&aliases.state, &columns),
        }
    }
}

/// Colonnes résolues pour une couche de lignes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSchema {
    pub name: Option<String>,
    pub voltage: Option<String>,
}

impl LineSchema {
    pub fn resolve(layer: &Layer, aliases: &ColumnAliases) -> Self {
        let columns = layer.columns();
        Self {
            name: resolve_column(&aliases.line_name, &columns),
            voltage: resolve_column(&aliases.voltage, &columns),
        }
    }
}

/// Convertit une couche en communes
///
/// Sans colonne de nom, chaque commune reçoit `MUN_<i>`. Sans colonne d'UF,
/// `default_state` est utilisé.
pub fn municipalities_from_layer(
    layer: &Layer,
    aliases: &ColumnAliases,
    default_state: Option<&str>,
) -> Vec<Municipality> {
    let schema = MunicipalitySchema::resolve(layer, aliases);
    debug!(layer = %layer.name, ?schema, "Municipality columns resolved");

    layer
        .features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let get = |col: &Option<String>| {
                col.as_ref()
                    .and_then(|c| f.properties.get(c))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };
            Municipality {
                code: get(&schema.code).and_then(|c| normalize_code(&c)),
                name: get(&schema.name).unwrap_or_else(|| format!("MUN_{}", i)),
                state: get(&schema.state)
                    .map(|s| s.to_uppercase())
                    .or_else(|| default_state.map(|s| s.to_uppercase())),
                geometry: f.geometry.clone(),
            }
        })
        .collect()
}

/// Convertit une couche en lignes de transmission
///
/// Sans colonne de nom, chaque ligne reçoit `Linha <i+1>`. Sans colonne de
/// tension, `default_voltage` est utilisé, puis `TODAS`.
pub fn lines_from_layer(
    layer: &Layer,
    aliases: &ColumnAliases,
    default_voltage: Option<&VoltageClass>,
) -> Vec<TransmissionLine> {
    let schema = LineSchema::resolve(layer, aliases);
    debug!(layer = %layer.name, ?schema, "Line columns resolved");

    layer
        .features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let name = schema
                .name
                .as_ref()
                .and_then(|c| f.properties.get(c))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| format!("Linha {}", i + 1));

            let voltage = schema
                .voltage
                .as_ref()
                .and_then(|c| f.properties.get(c))
                .map(|v| VoltageClass::parse(v))
                .filter(|v| *v != VoltageClass::All)
                .or_else(|| default_voltage.cloned())
                .unwrap_or(VoltageClass::All);

            TransmissionLine {
                name,
                voltage,
                geometry: f.geometry.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use geo::{line_string, polygon};
    use std::collections::BTreeMap;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_column_order_and_case() {
        let aliases = owned(&["NM_MUN", "NOME", "name"]);
        assert_eq!(
            resolve_column(&aliases, &owned(&["name", "NOME"])),
            Some("NOME".to_string())
        );
        assert_eq!(
            resolve_column(&aliases, &owned(&["nm_mun"])),
            Some("nm_mun".to_string())
        );
        assert_eq!(resolve_column(&aliases, &owned(&["CD_MUN"])), None);
    }

    #[test]
    fn test_municipalities_with_synthetic_names() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let layer = Layer::new(
            "mun",
            Some(4326),
            vec![
                Feature {
                    id: "1".into(),
                    geometry: square.clone().into(),
                    properties: props(&[("CD_MUN", "4108304.0"), ("area", "1")]),
                },
                Feature {
                    id: "2".into(),
                    geometry: square.into(),
                    properties: props(&[("area", "2")]),
                },
            ],
        );

        let muns = municipalities_from_layer(&layer, &ColumnAliases::default(), Some("pr"));
        assert_eq!(muns[0].name, "MUN_0");
        assert_eq!(muns[1].name, "MUN_1");
        assert_eq!(muns[0].code.as_deref(), Some("4108304"));
        assert_eq!(muns[1].code, None);
        assert_eq!(muns[0].state.as_deref(), Some("PR"));
    }

    #[test]
    fn test_lines_voltage_fallbacks() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let layer = Layer::new(
            "linhas",
            Some(4326),
            vec![
                Feature {
                    id: "1".into(),
                    geometry: line.clone().into(),
                    properties: props(&[("Nome", "LT 500 kV Foz - Ivaiporã"), ("Tensao", "500.0")]),
                },
                Feature {
                    id: "2".into(),
                    geometry: line.into(),
                    properties: props(&[("Tensao", "")]),
                },
            ],
        );

        let lines = lines_from_layer(&layer, &ColumnAliases::default(), None);
        assert_eq!(lines[0].name, "LT 500 kV Foz - Ivaiporã");
        assert_eq!(lines[0].voltage, VoltageClass::Kv(500));
        assert_eq!(lines[1].name, "Linha 2");
        assert_eq!(lines[1].voltage, VoltageClass::All);

        let no_column = layer.with_features(
            layer
                .features
                .iter()
                .map(|f| Feature {
                    properties: BTreeMap::new(),
                    ..f.clone()
                })
                .collect(),
        );
        let lines = lines_from_layer(&no_column, &ColumnAliases::default(), Some(&VoltageClass::Kv(765)));
        assert!(lines.iter().all(|l| l.voltage == VoltageClass::Kv(765)));
        let lines = lines_from_layer(&no_column, &ColumnAliases::default(), None);
        assert!(lines.iter().all(|l| l.voltage == VoltageClass::All));
    }

    #[test]
    fn test_match_key_and_code() {
        assert_eq!(match_key("  Foz do Iguaçu "), "FOZ DO IGUAÇU");
        assert_eq!(normalize_code(" 4108304 "), Some("4108304".to_string()));
        assert_eq!(normalize_code(""), None);
    }
}
